use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use crate::auth::{
    AuthService, InMemoryRefreshTokenStore, InMemoryUserDirectory, PgRefreshTokenStore,
    PgUserDirectory, RefreshTokenStore, UserDirectory,
};
use crate::configuration::Settings;
use crate::error::{AppError, StorageError};
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{current_user, health_check, login, logout, refresh, signup};

pub fn run(listener: TcpListener, service: AuthService) -> Result<Server, std::io::Error> {
    let codec = service.codec().clone();
    let service = web::Data::new(service);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(service.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/signup", web::post().to(signup))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/logout", web::post().to(logout))
            // Protected routes
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route("/me", web::get().to(current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Build the service over Postgres when a database is configured, otherwise in memory
pub async fn build_service(configuration: &Settings) -> Result<AuthService, AppError> {
    configuration.jwt.validate()?;

    let (users, refresh_tokens): (Arc<dyn UserDirectory>, Arc<dyn RefreshTokenStore>) =
        match &configuration.database {
            Some(database) => {
                tracing::info!("Attempting to connect to database");
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(&database.connection_string())
                    .await
                    .map_err(|e| AppError::Storage(StorageError::from(e)))?;
                tracing::info!("Database connection pool created successfully");

                (
                    Arc::new(PgUserDirectory::new(pool.clone())),
                    Arc::new(PgRefreshTokenStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("No database configured, using in-memory stores");
                (
                    Arc::new(InMemoryUserDirectory::new()),
                    Arc::new(InMemoryRefreshTokenStore::new()),
                )
            }
        };

    Ok(AuthService::new(users, refresh_tokens, &configuration.jwt))
}
