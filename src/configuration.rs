use crate::sheets_store::SheetsSettings;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Shared Google spreadsheet
    Remote,
    /// JSON file in the data directory, single user only
    Local,
}

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn base_path(&self) -> String;
    fn backend(&self) -> Backend;
    fn data_dir(&self) -> PathBuf;
    fn sheets_settings(&self) -> SheetsSettings;
}
