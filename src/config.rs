use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::env;

use crate::services::cloud_storage_service::{
    CredentialSource, DEFAULT_SIGNED_URL_MINUTES, StorageConfig,
};

/// Largest accepted request body, photo included.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 30_000_000;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub bucket: String,
    pub credential_file: String,
    pub environment: String,
    pub signed_url_ttl_minutes: u32,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Animal records with photos in Google Cloud Storage")]
pub struct Args {
    /// Host to bind to (overrides ANIMAL_KINGDOM_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ANIMAL_KINGDOM_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides ANIMAL_KINGDOM_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// GCS bucket holding animal photos (overrides ANIMAL_KINGDOM_GCS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Service account key file (overrides ANIMAL_KINGDOM_GCS_AUTH_FILE)
    #[arg(long)]
    pub credential_file: Option<String>,

    /// Deployment environment, `Development` reads the key file inline
    /// (overrides ANIMAL_KINGDOM_ENVIRONMENT)
    #[arg(long)]
    pub environment: Option<String>,

    /// Validity window of signed photo URLs (overrides ANIMAL_KINGDOM_SIGNED_URL_TTL_MINUTES)
    #[arg(long)]
    pub signed_url_ttl_minutes: Option<u32>,

    /// Request body limit in bytes (overrides ANIMAL_KINGDOM_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("ANIMAL_KINGDOM_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("ANIMAL_KINGDOM_PORT", 3000u16)?;
        let env_db = env::var("ANIMAL_KINGDOM_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/animal_kingdom.db".into());
        let env_environment =
            env::var("ANIMAL_KINGDOM_ENVIRONMENT").unwrap_or_else(|_| "Production".into());
        let env_ttl = parse_env(
            "ANIMAL_KINGDOM_SIGNED_URL_TTL_MINUTES",
            DEFAULT_SIGNED_URL_MINUTES,
        )?;
        let env_max_upload =
            parse_env("ANIMAL_KINGDOM_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let bucket = args
            .bucket
            .or_else(|| env::var("ANIMAL_KINGDOM_GCS_BUCKET").ok())
            .ok_or_else(|| anyhow!("a GCS bucket is required (--bucket or ANIMAL_KINGDOM_GCS_BUCKET)"))?;
        let credential_file = args
            .credential_file
            .or_else(|| env::var("ANIMAL_KINGDOM_GCS_AUTH_FILE").ok())
            .ok_or_else(|| {
                anyhow!(
                    "a credential file is required (--credential-file or ANIMAL_KINGDOM_GCS_AUTH_FILE)"
                )
            })?;

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            bucket,
            credential_file,
            environment: args.environment.unwrap_or(env_environment),
            signed_url_ttl_minutes: args.signed_url_ttl_minutes.unwrap_or(env_ttl),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Storage adapter settings derived from this configuration.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig {
            bucket: self.bucket.clone(),
            credential_file: self.credential_file.clone().into(),
            credential_source: CredentialSource::for_environment(&self.environment),
        }
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
