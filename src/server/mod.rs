pub mod config;

use crate::{
    auth::{
        AuthService, AuthSettings, ClientIpPolicy,
        jwt::{JwtService, JwtServiceImpl},
        middleware::jwt_auth_middleware,
    },
    config::Config,
    database::{DatabaseManager, DatabaseManagerImpl},
    error::AppError,
    health::HealthService,
    middleware::{request_id_middleware, request_response_logger},
    routes::{create_auth_routes, create_health_routes, create_protected_auth_routes},
    shutdown::ShutdownCoordinator,
};
use axum::{Router, extract::FromRef, middleware};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub jwt_service: Arc<dyn JwtService>,
    pub auth_service: Arc<AuthService>,
    pub health_service: Arc<HealthService>,
    pub database: Arc<dyn DatabaseManager>,
    pub shutdown_coordinator: Arc<ShutdownCoordinator>,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self, AppError> {
        let jwt_service_impl = Arc::new(JwtServiceImpl::new(&config.jwt)?);
        let jwt_service: Arc<dyn JwtService> = jwt_service_impl.clone();

        let database_impl = Arc::new(
            DatabaseManagerImpl::new_from_config(&config.database)
                .await
                .map_err(AppError::Database)?,
        );
        let database: Arc<dyn DatabaseManager> = database_impl.clone();

        let auth_service = Arc::new(AuthService::new(
            database.clone(),
            jwt_service.clone(),
            AuthSettings::from_config(&config),
        ));

        let health_service = Arc::new(HealthService::new());
        health_service.register(database_impl).await;
        health_service
            .register(jwt_service_impl.health_checker())
            .await;

        Ok(Self {
            config: Arc::new(config),
            jwt_service,
            auth_service,
            health_service,
            database,
            shutdown_coordinator: Arc::new(ShutdownCoordinator::new()),
        })
    }

    pub async fn run(&self) -> Result<(), AppError> {
        if self.config.database.migration_on_startup {
            self.database.migrate().await.map_err(AppError::Database)?;
        }

        let app = self.create_app();

        let host = self.config.server.host.as_str();
        let port = self.config.server.port;
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to {host}:{port}: {e}")))?;

        match listener.local_addr() {
            Ok(addr) => info!("Server listening on http://{}", addr),
            Err(e) => error!("Failed to read listener address: {}", e),
        }

        let signal_coordinator = self.shutdown_coordinator.clone();
        tokio::spawn(async move {
            signal_coordinator.wait_for_shutdown_signal().await;
        });

        let shutdown_coordinator = self.shutdown_coordinator.clone();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_coordinator.wait_for_shutdown().await;
            info!("Graceful shutdown initiated");
        })
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }

    pub fn create_app(&self) -> Router {
        let auth_routes = create_auth_routes().merge(self.protected_auth_routes());

        let mut app = Router::new()
            .nest("/auth", auth_routes)
            .with_state(self.clone())
            .nest(
                "/health",
                create_health_routes().with_state(self.health_service.clone()),
            );

        if self.config.logging.log_request {
            app = app.layer(middleware::from_fn_with_state(
                ClientIpPolicy::from_ref(self),
                request_response_logger,
            ));
        }
        // Outermost, so the logger and handlers both see the request id
        app.layer(middleware::from_fn(request_id_middleware))
    }

    fn protected_auth_routes(&self) -> Router<Server> {
        create_protected_auth_routes().layer(middleware::from_fn_with_state(
            self.clone(),
            jwt_auth_middleware,
        ))
    }
}

impl FromRef<Server> for ClientIpPolicy {
    fn from_ref(server: &Server) -> Self {
        ClientIpPolicy {
            trust_proxy_headers: server.config.server.trust_proxy_headers,
        }
    }
}
