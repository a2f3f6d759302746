use crate::{
    configuration::{Backend, Configuration},
    sheets_store::{SheetsSettings, DEFAULT_API_URL, DEFAULT_TOKEN_URL},
};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Slot booking service for the ferry")]
pub struct ConfigurationHandler {
    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// Prefix for every route, e.g. /rent-a-ferri
    #[arg(long, env = "BASE_PATH", default_value = "")]
    base_path: String,

    #[arg(long, env = "BOOKING_BACKEND", value_enum, default_value_t = Backend::Remote)]
    backend: Backend,

    /// Directory holding the local booking file
    #[arg(long, env = "BOOKING_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[arg(long, env = "GOOGLE_SHEET_ID")]
    google_sheet_id: Option<String>,

    #[arg(long, env = "GOOGLE_SERVICE_ACCOUNT_EMAIL")]
    google_service_account_email: Option<String>,

    #[arg(long, env = "GOOGLE_PRIVATE_KEY", hide_env_values = true)]
    google_private_key: Option<String>,

    #[arg(long, env = "GOOGLE_SHEETS_API_URL", default_value = DEFAULT_API_URL, hide = true)]
    sheets_api_url: String,

    #[arg(long, env = "GOOGLE_TOKEN_URL", default_value = DEFAULT_TOKEN_URL, hide = true)]
    token_url: String,
}

impl ConfigurationHandler {
    /// Reads `.env.local` and `.env` first so they can fill in the
    /// environment backed arguments.
    pub fn parse_arguments() -> Self {
        for file in [".env.local", ".env"] {
            if let Ok(path) = dotenvy::from_filename(file) {
                debug!(path = %path.display(), "Loaded environment file");
            }
        }
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> String {
        self.port.clone()
    }

    fn base_path(&self) -> String {
        let trimmed = self.base_path.trim().trim_end_matches('/');
        match trimmed {
            "" => String::new(),
            path if path.starts_with('/') => path.to_string(),
            path => format!("/{path}"),
        }
    }

    fn backend(&self) -> Backend {
        self.backend
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn sheets_settings(&self) -> SheetsSettings {
        SheetsSettings {
            sheet_id: self.google_sheet_id.clone(),
            service_account_email: self.google_service_account_email.clone(),
            private_key: self.google_private_key.clone(),
            api_url: self.sheets_api_url.clone(),
            token_url: self.token_url.clone(),
        }
    }
}
