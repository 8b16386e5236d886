use crate::{models::operation::OperationKind, services::access_gate::AuthRequirements};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STORAGE_DIR: &str = "./data/buckets";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub auth_keys: Vec<String>,
    pub auth_requirements: AuthRequirements,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Minimal bucket object store")]
pub struct Args {
    /// Host to bind to (overrides BUCKETS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKETS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where buckets are stored (overrides BUCKETS_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Comma-separated accepted bearer tokens (overrides BUCKETS_AUTH_KEYS)
    #[arg(long)]
    pub auth_keys: Option<String>,

    /// Comma-separated operation kinds that require a token, e.g.
    /// `ObjectCreate,ObjectDelete` (overrides BUCKETS_REQUIRE_AUTH)
    #[arg(long)]
    pub require_auth: Option<String>,

    /// Largest accepted upload body in bytes (overrides BUCKETS_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge `args` over values from `lookup` over defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match args.port {
            Some(port) => port,
            None => match lookup("BUCKETS_PORT") {
                Some(value) => value
                    .parse::<u16>()
                    .with_context(|| format!("parsing BUCKETS_PORT value `{}`", value))?,
                None => DEFAULT_PORT,
            },
        };

        let max_upload_bytes = match args.max_upload_bytes {
            Some(limit) => limit,
            None => match lookup("BUCKETS_MAX_UPLOAD_BYTES") {
                Some(value) => value.parse::<usize>().with_context(|| {
                    format!("parsing BUCKETS_MAX_UPLOAD_BYTES value `{}`", value)
                })?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
        };

        let auth_keys: Vec<String> = args
            .auth_keys
            .or_else(|| lookup("BUCKETS_AUTH_KEYS"))
            .map(|raw| split_list(&raw).map(str::to_string).collect())
            .unwrap_or_default();

        let auth_requirements = match args.require_auth.or_else(|| lookup("BUCKETS_REQUIRE_AUTH")) {
            Some(raw) => {
                let kinds = split_list(&raw)
                    .map(|name| name.parse::<OperationKind>())
                    .collect::<Result<Vec<_>, _>>()
                    .context("parsing required authentication kinds")?;
                AuthRequirements::requiring(kinds)
            }
            None => AuthRequirements::open(),
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| lookup("BUCKETS_HOST"))
                .unwrap_or_else(|| DEFAULT_HOST.into()),
            port,
            storage_dir: args
                .storage_dir
                .or_else(|| lookup("BUCKETS_STORAGE_DIR"))
                .unwrap_or_else(|| DEFAULT_STORAGE_DIR.into()),
            auth_keys,
            auth_requirements,
            max_upload_bytes,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keys are secrets; only their count is printed.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let required: Vec<_> = self
            .auth_requirements
            .iter()
            .filter(|(_, required)| *required)
            .map(|(kind, _)| kind)
            .collect();
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("auth_keys", &format_args!("<{} redacted>", self.auth_keys.len()))
            .field("auth_required_for", &required)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
