//! Host lifecycle: serve until told to stop, then dispose the root.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::composition::CompositionRoot;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::routes;

/// Binds the configured address and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError`] if binding or serving fails, or if the root's
/// disposables could not all be released.
#[instrument(skip_all, fields(addr = %config.bind_address()))]
pub async fn run<F>(
    config: &ServerConfig,
    root: Arc<CompositionRoot>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_address()).await?;
    serve(listener, root, shutdown).await
}

/// Serves on an already bound listener.
///
/// The root is disposed after the server stops, whether or not serving
/// succeeded.
///
/// # Errors
///
/// See [`run`].
pub async fn serve<F>(
    listener: TcpListener,
    root: Arc<CompositionRoot>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Listening");
    let app = routes::router(root.clone());

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    info!("Server stopped");
    let disposed = root.dispose();
    served?;
    disposed?;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
