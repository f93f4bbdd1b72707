//! HTTP front end for the centile calculator.
//!
//! ```text
//! POST /calculate   RawInput JSON -> {success, results | error}
//! GET  /health      liveness probe
//! ```
//!
//! Calculations make blocking outbound calls, so handlers move them onto the
//! blocking thread pool.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

use std::net::SocketAddr;

pub use router::create_router;
pub use state::AppState;

use crate::error::AppError;

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), AppError> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::new(4, format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::new(4, format!("Server error: {e}")))
}
