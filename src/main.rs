use anyhow::Result;
use cloudcast::cli::cli;

fn main() -> Result<()> {
    cli()
}
