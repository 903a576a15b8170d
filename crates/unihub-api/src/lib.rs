pub mod auth;
pub mod communities;
pub mod error;
pub mod follows;
pub mod middleware;
pub mod pins;
pub mod policy;
pub mod posts;
pub mod recommendations;
pub mod users;

#[cfg(test)]
mod test_support;

use tracing::error;

use unihub_db::Database;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};

/// Run a synchronous database operation off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
        })?
}
