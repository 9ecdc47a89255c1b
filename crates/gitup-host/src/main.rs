use anyhow::Result;
use clap::Parser;
use gitup_host::{execute_cli_command, Cli};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let output = execute_cli_command(&cli)?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}
