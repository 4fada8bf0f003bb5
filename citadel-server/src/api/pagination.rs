//! Offset-based pagination for list endpoints.

use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Pagination metadata echoed back in list responses.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaginationMeta {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

/// Clamp raw query values: out-of-range limits fall back to the default,
/// negative offsets to zero.
pub fn clamp_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let mut limit = limit.unwrap_or(DEFAULT_LIMIT);
    if limit <= 0 || limit > MAX_LIMIT {
        limit = DEFAULT_LIMIT;
    }

    let offset = offset.unwrap_or(0).max(0);

    (limit, offset)
}
