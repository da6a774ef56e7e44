use serde::{Deserialize, Serialize};

/// A captured analysis request waiting for network connectivity.
///
/// `id` is assigned by the store and increases monotonically with insertion
/// order; `created_at_ms` is the capture time and never changes. Both are
/// stable for the lifetime of the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: i64,
    pub image_base64: String,
    pub created_at_ms: i64,
}
