//! HTTP application assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::HubConfig;
use crate::hub::HubHandle;
use crate::ws::handler::ws_handler;

/// Builds the router: REST endpoints, `/ws`, and (with the `swagger-ui`
/// feature) the API explorer.
pub fn build_app(state: AppState) -> Router {
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
    .with_state(state)
}

/// A bound, running hub server.
#[derive(Debug)]
pub struct RunningServer {
    /// Address actually bound (useful when the port was 0).
    pub local_addr: SocketAddr,
    /// Handle for publishers living in the same process.
    pub hub: HubHandle,
    /// Cancel to shut the server, the hub, and every session down.
    pub shutdown: CancellationToken,
    /// Completes when the HTTP server has stopped.
    pub server_task: JoinHandle<std::io::Result<()>>,
    /// Completes when the hub loop has stopped.
    pub hub_task: JoinHandle<()>,
}

impl RunningServer {
    /// Cancels everything and waits for the server and hub tasks, giving
    /// up after `grace`.
    pub async fn stop(self, grace: Duration) {
        let Self {
            shutdown,
            server_task,
            hub_task,
            ..
        } = self;
        shutdown.cancel();
        let _ = tokio::time::timeout(grace, async move {
            let _ = server_task.await;
            let _ = hub_task.await;
        })
        .await;
    }
}

/// Binds `config.listen_addr`, spawns the hub loop and the HTTP server.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot be bound.
pub async fn start(config: HubConfig) -> std::io::Result<RunningServer> {
    let shutdown = CancellationToken::new();
    let (hub, hub_task) = HubHandle::spawn(config.hub_command_capacity, shutdown.child_token());

    let listener = TcpListener::bind(config.listen_addr).await?;
    let local_addr = listener.local_addr()?;

    let state = AppState {
        hub: hub.clone(),
        config: Arc::new(config),
        shutdown: shutdown.clone(),
    };
    let app = build_app(state);

    let graceful = shutdown.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
    });

    tracing::info!(addr = %local_addr, "server listening");
    Ok(RunningServer {
        local_addr,
        hub,
        shutdown,
        server_task,
        hub_task,
    })
}
