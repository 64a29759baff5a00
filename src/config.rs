pub const ENV_REGION_ID: &str = "AGENT_IDENTITY_REGION_ID";
pub const ENV_CONTROL_ENDPOINT: &str = "AGENT_IDENTITY_CONTROL_ENDPOINT";
pub const ENV_DATA_ENDPOINT: &str = "AGENT_IDENTITY_DATA_ENDPOINT";
pub const ENV_STS_CACHE_SIZE: &str = "AGENT_IDENTITY_STS_CACHE_SIZE";
pub const ENV_STS_CACHE_TTL: &str = "AGENT_IDENTITY_STS_CACHE_TTL";
pub const ENV_POLL_MAX_RETRIES: &str = "AGENT_IDENTITY_POLL_MAX_RETRIES";
pub const ENV_POLL_INTERVAL: &str = "AGENT_IDENTITY_POLL_INTERVAL";
pub const ENV_WORKLOAD_IDENTITY_NAME: &str = "AGENT_IDENTITY_WORKLOAD_IDENTITY_NAME";

/// Local config key remembering which workload identity this machine uses.
pub const LOCAL_CONFIG_WORKLOAD_IDENTITY_NAME: &str = "workload_identity_name";

pub fn config_dir() -> crate::Result<std::path::PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(d) => std::path::PathBuf::from(d),
        None => match std::env::var_os("HOME") {
            Some(h) => std::path::PathBuf::from(h).join(".config"),
            None => {
                return Err(crate::Error::ConfigError(
                    "No $HOME environment variable present".to_owned(),
                ))
            }
        },
    };
    Ok(base.join(env!("CARGO_PKG_NAME")))
}

pub fn local_config_path() -> crate::Result<std::path::PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Runtime settings. Everything has a default; [`Settings::from_env`] overrides from
/// `AGENT_IDENTITY_*` variables.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub region_id: String,
    pub control_endpoint: Option<url::Url>,
    pub data_endpoint: Option<url::Url>,
    pub sts_cache_size: usize,
    pub sts_cache_ttl_secs: u64,
    pub poll_max_retries: u32,
    pub poll_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region_id: "cn-beijing".to_owned(),
            control_endpoint: None,
            data_endpoint: None,
            sts_cache_size: crate::credential_cache::DEFAULT_MAX_CACHE_SIZE,
            sts_cache_ttl_secs: crate::credential_cache::DEFAULT_TTL.as_secs(),
            poll_max_retries: 60,
            poll_interval_secs: 5,
        }
    }
}

impl Settings {
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Unset and blank variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut s = Self::default();
        if let Some(v) = var(ENV_REGION_ID) {
            s.region_id = v;
        }
        if let Some(v) = var(ENV_CONTROL_ENDPOINT) {
            s.control_endpoint = Some(parse_env(ENV_CONTROL_ENDPOINT, &v)?);
        }
        if let Some(v) = var(ENV_DATA_ENDPOINT) {
            s.data_endpoint = Some(parse_env(ENV_DATA_ENDPOINT, &v)?);
        }
        if let Some(v) = var(ENV_STS_CACHE_SIZE) {
            s.sts_cache_size = parse_env(ENV_STS_CACHE_SIZE, &v)?;
        }
        if let Some(v) = var(ENV_STS_CACHE_TTL) {
            s.sts_cache_ttl_secs = parse_env(ENV_STS_CACHE_TTL, &v)?;
        }
        if let Some(v) = var(ENV_POLL_MAX_RETRIES) {
            s.poll_max_retries = parse_env(ENV_POLL_MAX_RETRIES, &v)?;
        }
        if let Some(v) = var(ENV_POLL_INTERVAL) {
            s.poll_interval_secs = parse_env(ENV_POLL_INTERVAL, &v)?;
        }
        tracing::debug!(settings = ?s, "Loaded settings");
        Ok(s)
    }

    pub fn sts_cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sts_cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

fn parse_env<T>(name: &str, value: &str) -> crate::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| crate::Error::ConfigError(format!("invalid {name}={value:?}: {e}")))
}

/// Missing, empty and malformed files all read as an empty object.
async fn load_local_config(
    path: &std::path::Path,
) -> serde_json::Map<String, serde_json::Value> {
    let data = match tokio::fs::read(path).await {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Default::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = ?e, "Failed to read local config");
            return Default::default();
        }
    };
    if data.iter().all(u8::is_ascii_whitespace) {
        return Default::default();
    }
    match serde_json::from_slice(&data) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = ?e, "Ignoring malformed local config");
            Default::default()
        }
    }
}

pub async fn read_local_config(key: &str, path: impl AsRef<std::path::Path>) -> Option<String> {
    let map = load_local_config(path.as_ref()).await;
    map.get(key).and_then(|v| v.as_str()).map(str::to_owned)
}

/// Sets `key` in the JSON file at `path`, keeping other keys. A malformed file is replaced.
pub async fn write_local_config(
    key: &str,
    value: &str,
    path: impl AsRef<std::path::Path>,
) -> crate::Result<()> {
    let path = path.as_ref();
    let mut map = load_local_config(path).await;
    map.insert(key.to_owned(), serde_json::Value::String(value.to_owned()));

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut json = serde_json::to_vec_pretty(&map)?;
    json.push(b'\n');
    tokio::fs::write(path, json).await?;
    tracing::debug!(path = %path.display(), key = key, "Wrote local config");
    Ok(())
}
