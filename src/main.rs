use std::net::TcpListener;

use authcore::configuration::get_configuration;
use authcore::startup::{build_service, run};
use authcore::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Bad signing configuration or an unreachable database is fatal here,
    // never per request
    let service = build_service(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise authentication service: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(listener, service)?;
    tracing::info!("Server started successfully");

    server.await
}
