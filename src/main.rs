use crate::{
    configuration::{Backend, Configuration},
    configuration_handler::ConfigurationHandler,
    http::create_app,
    local_store::LocalStore,
    sheets_store::SheetsStore,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod booking_service;
mod configuration;
mod configuration_handler;
mod http;
mod local_store;
mod service_account;
mod sheets_store;
mod store;
#[cfg(test)]
mod testutils;
mod types;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let configuration = ConfigurationHandler::parse_arguments();

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(?err, %address, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    let app = match configuration.backend() {
        Backend::Remote => {
            info!("Storing bookings in Google Sheets");
            create_app(
                SheetsStore::new(configuration.sheets_settings()),
                configuration.clone(),
            )
        }
        Backend::Local => {
            let store = LocalStore::new(configuration.data_dir());
            info!(path = %store.path().display(), "Storing bookings locally");
            create_app(store, configuration.clone())
        }
    };

    info!(
        %address,
        base_path = %configuration.base_path(),
        "Booking service listening"
    );
    if let Err(err) = axum::serve(listener, app).await {
        error!(?err, "Server stopped");
        std::process::exit(1);
    }
}
