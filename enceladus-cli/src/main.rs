use clap::Parser;
use enceladus_cli::{commands, logging, Cli, ExitStatus};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("enceladus: {}", e);
        return ExitStatus::Logging.into();
    }

    commands::dispatch(cli).await.into()
}
