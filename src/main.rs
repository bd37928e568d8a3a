use anyhow::Result;
use clap::Parser;

use ftpmirror::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ftpmirror::init_logging(cli.verbose);

    let mut stdout = std::io::stdout();
    ftpmirror::run(cli, &mut stdout).await
}
