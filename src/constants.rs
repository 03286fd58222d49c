//! Application constants.

/// Maximum upload size for a single image (25 MB).
pub const MAX_IMAGE_UPLOAD_SIZE: usize = 25 * 1024 * 1024;

/// Default page size for paginated list/search endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for paginated list/search endpoints.
pub const MAX_PAGE_SIZE: i64 = 100;
