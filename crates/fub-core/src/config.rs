use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

const DEFAULT_MAX_DOWNLOAD_MB: u64 = 20;
const LOCAL_API_MAX_DOWNLOAD_MB: u64 = 2000;

/// A credential that must never show up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Which flavour of the bot is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Bot token only: download through the Bot API, upload, reply.
    Simple,
    /// Bot frontend plus user-session credentials; files are relayed through
    /// the owner's chat before processing.
    Hybrid,
}

impl Variant {
    /// Variables that must be present for this variant.
    pub fn required_vars(self) -> &'static [&'static str] {
        match self {
            Variant::Simple => &["BOT_TOKEN"],
            Variant::Hybrid => &["BOT_TOKEN", "API_ID", "API_HASH", "SESSION_STRING"],
        }
    }

    pub fn optional_vars(self) -> &'static [&'static str] {
        &["OWNER_ID", "LOG_CHANNEL_ID"]
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "simple" => Ok(Variant::Simple),
            "hybrid" => Ok(Variant::Hybrid),
            other => Err(Error::Config(format!(
                "BOT_MODE must be 'simple' or 'hybrid', got '{other}'."
            ))),
        }
    }
}

/// Destination file host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKind {
    Gofile,
    TransferSh,
}

impl HostKind {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "gofile" | "gofile.io" => Ok(HostKind::Gofile),
            "transfer.sh" | "transfersh" | "transfer" => Ok(HostKind::TransferSh),
            other => Err(Error::Config(format!(
                "UPLOAD_HOST must be 'gofile' or 'transfer.sh', got '{other}'."
            ))),
        }
    }
}

/// User-session credentials carried by the hybrid variant.
#[derive(Clone, Debug)]
pub struct UserSessionCredentials {
    pub api_id: i64,
    pub api_hash: Secret,
    pub session_string: Secret,
}

/// Typed configuration, read once at start-up.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: Secret,
    pub variant: Variant,
    pub user_session: Option<UserSessionCredentials>,
    pub owner_id: Option<i64>,
    pub log_channel_id: Option<i64>,

    // Hosts
    pub upload_host: HostKind,
    pub gofile_api_url: String,
    pub gofile_upload_url: String,
    pub gofile_fallback_server: String,
    pub transfer_sh_url: String,

    // Telegram
    pub telegram_api_url: Option<String>,
    pub max_download_bytes: u64,
    pub poll_timeout: Duration,

    // Pipeline
    pub upload_timeout: Duration,
    pub server_lookup_timeout: Duration,
    pub temp_dir: PathBuf,
    pub max_concurrent_uploads: usize,

    // Access control
    pub allowed_users: Vec<i64>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    /// Load from the process environment (plus `.env` if present) and make
    /// sure the staging directory exists.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        fs::create_dir_all(&cfg.temp_dir)?;
        Ok(cfg)
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let bot_token = get("BOT_TOKEN").ok_or_else(|| {
            Error::Config("BOT_TOKEN is not set in the environment.".to_string())
        })?;

        let variant = match get("BOT_MODE") {
            Some(raw) => Variant::parse(&raw)?,
            None if ["API_ID", "API_HASH", "SESSION_STRING"]
                .iter()
                .any(|k| get(*k).is_some()) =>
            {
                Variant::Hybrid
            }
            None => Variant::Simple,
        };

        let user_session = match variant {
            Variant::Simple => None,
            Variant::Hybrid => Some(load_user_session(&get)?),
        };

        let owner_id = parse_optional_id(&get, "OWNER_ID");
        let log_channel_id = parse_optional_id(&get, "LOG_CHANNEL_ID");

        let upload_host = match get("UPLOAD_HOST") {
            Some(raw) => HostKind::parse(&raw)?,
            None => match variant {
                Variant::Hybrid => HostKind::Gofile,
                Variant::Simple => HostKind::TransferSh,
            },
        };

        let telegram_api_url = get("TELEGRAM_API_URL");
        let default_cap_mb = if telegram_api_url.is_some() {
            LOCAL_API_MAX_DOWNLOAD_MB
        } else {
            DEFAULT_MAX_DOWNLOAD_MB
        };
        let max_download_bytes = parse_u64(&get, "MAX_DOWNLOAD_MB")
            .unwrap_or(default_cap_mb)
            .checked_mul(1024 * 1024)
            .ok_or_else(|| Error::Config("MAX_DOWNLOAD_MB is too large.".to_string()))?;

        let allowed_users = parse_csv_i64(get("ALLOWED_USERS"));

        Ok(Self {
            bot_token: Secret::new(bot_token),
            variant,
            user_session,
            owner_id,
            log_channel_id,
            upload_host,
            gofile_api_url: get("GOFILE_API_URL")
                .unwrap_or_else(|| "https://api.gofile.io".to_string()),
            gofile_upload_url: get("GOFILE_UPLOAD_URL")
                .unwrap_or_else(|| "https://{server}.gofile.io/uploadFile".to_string()),
            gofile_fallback_server: get("GOFILE_FALLBACK_SERVER")
                .unwrap_or_else(|| "store1".to_string()),
            transfer_sh_url: get("TRANSFER_SH_URL")
                .unwrap_or_else(|| "https://transfer.sh".to_string()),
            telegram_api_url,
            max_download_bytes,
            poll_timeout: Duration::from_secs(parse_u64(&get, "POLL_TIMEOUT_SECS").unwrap_or(20)),
            upload_timeout: Duration::from_secs(
                parse_u64(&get, "UPLOAD_TIMEOUT_SECS").unwrap_or(1800),
            ),
            server_lookup_timeout: Duration::from_secs(
                parse_u64(&get, "SERVER_LOOKUP_TIMEOUT_SECS").unwrap_or(10),
            ),
            temp_dir: get("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/file-upload-bot")),
            max_concurrent_uploads: parse_u64(&get, "MAX_CONCURRENT_UPLOADS")
                .unwrap_or(3)
                .max(1) as usize,
            allowed_users,
            rate_limit_enabled: parse_bool(&get, "RATE_LIMIT_ENABLED").unwrap_or(true),
            rate_limit_requests: parse_u64(&get, "RATE_LIMIT_REQUESTS")
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(10),
            rate_limit_window: Duration::from_secs(
                parse_u64(&get, "RATE_LIMIT_WINDOW").unwrap_or(60),
            ),
            audit_log_path: get("AUDIT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp/file-upload-bot-audit.log")),
            audit_log_json: parse_bool(&get, "AUDIT_LOG_JSON").unwrap_or(false),
        })
    }

    /// True when large files go through a self-hosted Bot API server.
    pub fn uses_local_bot_api(&self) -> bool {
        self.telegram_api_url.is_some()
    }
}

fn load_user_session(get: &dyn Fn(&str) -> Option<String>) -> Result<UserSessionCredentials> {
    let api_id_raw = get("API_ID")
        .ok_or_else(|| Error::Config("API_ID is not set in the environment.".to_string()))?;
    let api_hash = get("API_HASH")
        .ok_or_else(|| Error::Config("API_HASH is not set in the environment.".to_string()))?;
    let session_string = get("SESSION_STRING").ok_or_else(|| {
        Error::Config(
            "SESSION_STRING is not set in the environment. Please generate it first.".to_string(),
        )
    })?;

    let api_id = api_id_raw
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::Config("API_ID must be an integer.".to_string()))?;

    Ok(UserSessionCredentials {
        api_id,
        api_hash: Secret::new(api_hash),
        session_string: Secret::new(session_string),
    })
}

fn parse_optional_id(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<i64> {
    let Some(raw) = get(key) else {
        tracing::info!("{key} is not set in the environment (optional).");
        return None;
    };
    match raw.trim().parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::warn!(
                "{key} is set in the environment but is not a valid integer. It will be ignored."
            );
            None
        }
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    get(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_u64(get: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    get(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
