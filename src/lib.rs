pub mod batch;
pub mod cli;
pub mod client;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod fetcher;
pub mod label;
pub mod logging;
pub mod mode;
pub mod place;
pub mod resolver;
pub mod services;
pub mod util;

#[cfg(test)]
mod testing;
