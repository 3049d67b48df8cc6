//! Pricegate prediction service.
//!
//! Serves one model artifact, chosen at startup, over HTTP:
//! `POST /predict`, `POST /batch-predict`, `GET /health`, `GET /metrics`.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod state;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

pub use error::ApiError;
pub use handlers::router;
pub use metrics::ServiceMetrics;
pub use state::{load_model, AppState, LoadedModel, ModelSource, LOCAL_VERSION};

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, model_loaded = state.model_loaded(), "Prediction service listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
