use anyhow::Result;
use clap::Parser;
use simplebank::cli::Cli;
use simplebank::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);
    cli.run().await
}
