use clap::Parser;
use guardian::{
    cli::{Cli, Commands},
    commands::{deposit_root, verify_cache},
};
use guardian_registry::config::RegistryConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Set the default log level to `info` if not set
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RegistryConfig::from_file(path)?,
        None => RegistryConfig::default(),
    };

    match cli.command {
        Commands::DepositRoot(cmd) => {
            let root = deposit_root::run(&cmd)?;
            info!(?root, "Deposit root computed");
            println!("{root}");
        }
        Commands::VerifyCache(cmd) => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(verify_cache::run(&cmd, &config))?;
        }
    }
    Ok(())
}
