//! The HTTP server hosting the API.
//!
//! ```no_run
//! # use kubermatic_dashboard::{context::Context, options::ServerOptions, server::Server, store::InMemoryStore};
//! # async fn run(ctx: Context<InMemoryStore>) -> Result<(), kubermatic_dashboard::server::Error> {
//! let server = Server::new(ctx, ServerOptions::default());
//! server.run().await
//! # }
//! ```
use std::net::SocketAddr;

use axum::{Router, middleware, routing::get};
use snafu::{ResultExt, Snafu};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{
    context::Context, error::log_server_errors, handlers, options::ServerOptions,
    store::ObjectStore,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to bind to {socket_addr}"))]
    Bind {
        source: std::io::Error,
        socket_addr: SocketAddr,
    },

    #[snafu(display("failed to create the {name} listener"))]
    CreateSignalListener {
        source: std::io::Error,
        name: &'static str,
    },

    #[snafu(display("failed to run the server"))]
    Serve { source: std::io::Error },
}

/// The application: all API routes with request tracing and error logging, plus `/health`.
pub fn app<S: ObjectStore>(ctx: Context<S>) -> Router {
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_server_errors));

    handlers::router()
        .with_state(ctx)
        .layer(layers)
        // Below the trace layer, probes are not traced.
        .route("/health", get(|| async { "ok" }))
}

pub struct Server {
    router: Router,
    socket_addr: SocketAddr,
}

impl Server {
    /// Creates the server. The readiness policy of `options` replaces the one of `ctx`.
    pub fn new<S: ObjectStore>(mut ctx: Context<S>, options: ServerOptions) -> Self {
        ctx.readiness = options.readiness;
        Self {
            router: app(ctx),
            socket_addr: options.socket_addr,
        }
    }

    /// Serves requests until SIGINT or SIGTERM is received, then lets running requests finish.
    pub async fn run(self) -> Result<()> {
        let mut sigint = signal(SignalKind::interrupt())
            .context(CreateSignalListenerSnafu { name: "SIGINT" })?;
        let mut sigterm = signal(SignalKind::terminate())
            .context(CreateSignalListenerSnafu { name: "SIGTERM" })?;
        let shutdown = async move {
            tokio::select! {
                _ = sigint.recv() => tracing::info!("received SIGINT"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
            }
        };

        let listener = TcpListener::bind(self.socket_addr)
            .await
            .context(BindSnafu {
                socket_addr: self.socket_addr,
            })?;
        tracing::info!(socket_addr = %self.socket_addr, "serving the API");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context(ServeSnafu)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::cluster::tests::context;

    async fn get_status(uri: &str) -> (StatusCode, String) {
        let response = app(context().await)
            .oneshot(
                Request::get(uri)
                    .body(Body::empty())
                    .expect("request is valid"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn health() {
        assert_eq!(get_status("/health").await, (StatusCode::OK, "ok".to_owned()));
    }

    #[tokio::test]
    async fn unknown_routes() {
        let (status, _) = get_status("/api/v1/nothing-here").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn server_takes_the_readiness_policy_of_the_options() {
        let options = ServerOptions::builder()
            .bind_address([127, 0, 0, 1], 0)
            .build();
        let server = Server::new(context().await, options);
        assert_eq!(server.socket_addr.to_string(), "127.0.0.1:0");
    }
}
