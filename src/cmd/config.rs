#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,

    /// Local config file to use instead of ~/.config/agent-identity/config.json
    #[arg(long, global = true)]
    file: Option<std::path::PathBuf>,
}

#[derive(clap::Subcommand)]
enum ConfigCommand {
    /// Print a value from the local config file; exits as failure when the key is not set
    Get { key: String },
    /// Store a value in the local config file
    Set { key: String, value: String },
}

#[tokio::main]
pub async fn run(args: &ConfigArgs) -> Result<(), anyhow::Error> {
    let path = match args.file {
        Some(ref p) => p.clone(),
        None => crate::config::local_config_path()?,
    };

    match &args.command {
        ConfigCommand::Get { key } => match crate::config::read_local_config(key, &path).await {
            Some(value) => println!("{value}"),
            None => {
                tracing::debug!(key = %key, path = ?path, "Key not found in local config");
                return Err(crate::Error::FailureButSilentlyExit.into());
            }
        },
        ConfigCommand::Set { key, value } => {
            crate::config::write_local_config(key, value, &path).await?;
            tracing::info!(key = %key, path = ?path, "Saved to local config");
        }
    }
    Ok(())
}
