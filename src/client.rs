use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use serde_with::DurationSeconds;
use std::io::{self, Write};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};
use ureq::{Agent, AgentBuilder, Error};

/// Something that can stream a remote image into a writer.
pub trait ImageSource: Sync {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64, FrameError>;
}

#[serde_with::serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClientOptions {
    pub user_agent: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    pub retry_limit: u64,
    /// Used when a throttled response has no retry-after header
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_delay: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: "TelegramBot (like TwitterBot)".to_string(),
            timeout: Duration::from_secs(30),
            retry_limit: 5,
            retry_delay: Duration::from_secs(7),
        }
    }
}

#[derive(Debug)]
pub struct Client {
    client: Agent,
    retry_limit: u64,
    retry_delay: Duration,
}

impl Client {
    pub fn new(opts: &ClientOptions) -> Client {
        let client = AgentBuilder::new()
            .timeout_connect(opts.timeout)
            .timeout_read(opts.timeout)
            .timeout_write(opts.timeout)
            .user_agent(&opts.user_agent)
            .build();
        Client {
            client,
            retry_limit: opts.retry_limit,
            retry_delay: opts.retry_delay,
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(&ClientOptions::default())
    }
}

impl ImageSource for Client {
    fn download(&self, url: &str, dest: &mut dyn Write) -> Result<u64, FrameError> {
        debug!("Fetching {url}");
        let mut attempts = 0;
        while attempts < self.retry_limit {
            match self.client.get(url).call() {
                Ok(response) => {
                    let mut reader = response.into_reader();
                    return io::copy(&mut reader, dest).map_err(|e| FrameError::download(url, e));
                }
                Err(Error::Status(code, response)) => match code {
                    503 | 429 | 408 => {
                        let retry = response
                            .header("retry-after")
                            .and_then(|h| h.parse().ok())
                            .map(Duration::from_secs)
                            .unwrap_or(self.retry_delay);
                        warn!("{} for {}, retry in {}s", code, url, retry.as_secs());
                        attempts += 1;
                        sleep(retry);
                    }
                    _ => return Err(FrameError::download(url, format!("HTTP {code}"))),
                },
                Err(err) => return Err(FrameError::download(url, err)),
            }
        }
        Err(FrameError::download(url, "retry limit exceeded"))
    }
}
