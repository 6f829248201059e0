use std::future::Future;
use std::sync::Arc;

use crate::router::{RuntimeState, app_router};

/// Serve the runtime API on `addr` until `shutdown` resolves.
pub async fn serve_http<F>(
    state: Arc<RuntimeState>,
    addr: &str,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Impuls runtime listening on {}", listener.local_addr()?);

    let app = app_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
