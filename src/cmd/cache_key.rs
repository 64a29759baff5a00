#[derive(clap::Args)]
pub struct CacheKeyArgs {
    user_id: String,
    id_token: String,
    /// Role session name
    #[arg(default_value = crate::identity::DEFAULT_ROLE_SESSION_NAME)]
    session_name: String,
}

/// Prints the fingerprint of the STS cache key for the given triple, as it appears in logs.
pub fn run(args: &CacheKeyArgs) -> Result<(), anyhow::Error> {
    let key =
        crate::credential_cache::build_cache_key(&args.user_id, &args.id_token, &args.session_name);
    println!("{}", key.fingerprint());
    Ok(())
}
