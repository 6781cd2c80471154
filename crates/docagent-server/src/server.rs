// Agent server
//
// Wraps a ChatAgent in the HTTP serving protocol. `run` owns a Tokio runtime
// and blocks until shutdown; `run_async` serves inside the caller's runtime.
// Both stop on Ctrl-C or SIGTERM and then release the agent handle and, when
// one was attached, the scoped credential.

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use docagent_core::{
    create_thread_repository, with_scoped_credential, AgentError, ChatAgent, PersistenceMode,
    ThreadRepository, TokenCredential,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::health::{self, HealthState};
use crate::openapi::ApiDoc;
use crate::responses::{self, AppState};
use crate::settings::ServerSettings;

/// HTTP host for one agent
pub struct AgentServer {
    agent: Arc<ChatAgent>,
    threads: Arc<dyn ThreadRepository>,
    // Set once a repository is supplied explicitly; settings no longer replace it
    custom_threads: bool,
    settings: ServerSettings,
    scoped_credential: Option<Arc<dyn TokenCredential>>,
}

impl AgentServer {
    /// Serve `agent` with default settings and provider-managed threads
    pub fn new(agent: ChatAgent) -> Self {
        let settings = ServerSettings::default();
        Self {
            agent: Arc::new(agent),
            threads: create_thread_repository(settings.persistence),
            custom_threads: false,
            settings,
            scoped_credential: None,
        }
    }

    /// Use these settings; the thread strategy follows `settings.persistence`
    /// unless a repository was supplied with `with_thread_repository`
    pub fn with_settings(mut self, settings: ServerSettings) -> Self {
        if !self.custom_threads {
            self.threads = create_thread_repository(settings.persistence);
        }
        self.settings = settings;
        self
    }

    /// Replace the thread persistence strategy
    pub fn with_thread_repository(mut self, threads: Arc<dyn ThreadRepository>) -> Self {
        self.threads = threads;
        self.custom_threads = true;
        self
    }

    /// Shorthand for `with_thread_repository(create_thread_repository(mode))`
    pub fn with_persistence(self, mode: PersistenceMode) -> Self {
        self.with_thread_repository(create_thread_repository(mode))
    }

    /// Close `credential` once serving stops
    pub fn with_scoped_credential(mut self, credential: Arc<dyn TokenCredential>) -> Self {
        self.scoped_credential = Some(credential);
        self
    }

    pub fn agent(&self) -> &Arc<ChatAgent> {
        &self.agent
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Build the application router
    pub fn router(&self) -> Router {
        let api_routes = responses::routes(AppState::new(self.agent.clone(), self.threads.clone()));

        let app = Router::new()
            .merge(health::routes(HealthState {
                agent: self.agent.clone(),
            }))
            .merge(build_router_with_prefix(api_routes, &self.settings.api_prefix))
            .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

        let app = match cors_layer(&self.settings.cors_origins) {
            Some(cors) => app.layer(cors),
            None => app,
        };

        app.layer(TraceLayer::new_for_http())
    }

    /// Serve on a new multi-threaded runtime, blocking until shutdown
    pub fn run(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to build Tokio runtime")?;
        runtime.block_on(self.run_async())
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM
    pub async fn run_async(self) -> Result<()> {
        let addr = self.settings.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    pub async fn serve<F>(mut self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.scoped_credential.take() {
            Some(credential) => with_scoped_credential(credential, |_| async move {
                self.serve_until(listener, shutdown)
                    .await
                    .map_err(AgentError::Internal)
            })
            .await
            .map_err(anyhow::Error::from),
            None => self.serve_until(listener, shutdown).await,
        }
    }

    async fn serve_until<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let local_addr = listener.local_addr().context("Listener has no address")?;
        tracing::info!(
            address = %local_addr,
            agent = %self.agent.name(),
            "Agent server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        self.agent.close().await;
        tracing::info!("Agent server stopped");
        Ok(())
    }
}

/// Build router with optional API prefix
fn build_router_with_prefix<S: Clone + Send + Sync + 'static>(
    api_routes: Router<S>,
    api_prefix: &str,
) -> Router<S> {
    if api_prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(api_prefix, api_routes)
    }
}

/// CORS layer for the configured origins, or None when CORS is off
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        return None;
    }

    tracing::info!(origins = ?origins, "CORS origins configured");
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
    )
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
