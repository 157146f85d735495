use aggie::cli::Cli;
use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    aggie::logging::init(cli.verbose);
    cli.run().await
}
