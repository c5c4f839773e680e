//! PostgreSQL adapters.
//!
//! Both stores share one `PgPool` created at startup and injected here.

mod subscription_store;
mod usage_store;

pub use subscription_store::PostgresSubscriptionStore;
pub use usage_store::PostgresUsageStore;

use crate::ports::StoreError;

/// Maps sqlx failures onto the store error taxonomy.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => StoreError::corrupt(format!("{}: {}", operation, err)),
        other => {
            tracing::warn!(operation, error = %other, "postgres call failed");
            StoreError::unavailable(format!("{}: {}", operation, other))
        }
    }
}
