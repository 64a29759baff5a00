#[derive(clap::Parser)]
#[clap(author, version, long_about = None)]
#[clap(about = "Client-side credential broker for agent workload identities")]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Read or write the local config file
    Config(agent_identity::cmd::config::ConfigArgs),
    /// Print the log fingerprint of an STS credential cache key
    CacheKey(agent_identity::cmd::cache_key::CacheKeyArgs),
}

fn main() -> Result<std::process::ExitCode, anyhow::Error> {
    use clap::Parser;
    let cli = Cli::parse();

    enable_tracing();
    let retval = match &cli.command {
        Commands::Config(args) => agent_identity::cmd::config::run(args),
        Commands::CacheKey(args) => agent_identity::cmd::cache_key::run(args),
    };
    match retval {
        Ok(_) => Ok(std::process::ExitCode::SUCCESS),
        Err(e) => match e.downcast_ref::<agent_identity::Error>() {
            Some(agent_identity::Error::FailureButSilentlyExit) => {
                Ok(std::process::ExitCode::FAILURE)
            }
            _ => Err(e),
        },
    }
}

fn enable_tracing() {
    if let Ok(l) = std::env::var("AGENT_IDENTITY_LOG") {
        std::env::set_var("RUST_LOG", l);
    }
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "agent_identity=info");
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
