//! Centralized default constants for HoloDoc.
//!
//! Every crate references these constants instead of defining its own magic
//! numbers. Organized by domain area.

// =============================================================================
// DOCUMENT
// =============================================================================

/// Placeholder label for a freshly captured, unmatched document.
pub const PLACEHOLDER_LABEL: &str = "label";

/// Placeholder author for a freshly captured, unmatched document.
pub const PLACEHOLDER_AUTHOR: &str = "author";

/// Placeholder description for a freshly captured, unmatched document.
pub const PLACEHOLDER_DESCRIPTION: &str = "description";

/// Placeholder date for a freshly captured, unmatched document.
pub const PLACEHOLDER_DATE: &str = "date";

/// Number of linked-document previews shown next to a document.
pub const LINK_PREVIEW_LIMIT: usize = 3;

// =============================================================================
// SERVER
// =============================================================================

/// Default document-matching server host.
pub const SERVER_HOST: &str = "127.0.0.1";

/// Default document-matching server port.
pub const SERVER_PORT: u16 = 8080;

/// Content type marker the matching server expects on every POST.
pub const CONTENT_TYPE: &str = "custom/content-type";

/// Transport timeout for a single request in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Requests slower than this are logged at warn level (milliseconds).
pub const SLOW_REQUEST_MS: u64 = 5000;

// =============================================================================
// CAMERA FRAMES
// =============================================================================

/// JPEG quality used when encoding frames for upload.
pub const JPEG_QUALITY: u8 = 75;

/// Bytes per pixel in a [`CameraFrame`](crate::CameraFrame) buffer (RGBA8).
pub const BYTES_PER_PIXEL: usize = 4;

// =============================================================================
// EVENTS
// =============================================================================

/// Default event bus broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// Env var overriding the server host.
pub const ENV_SERVER_HOST: &str = "HOLODOC_SERVER_HOST";

/// Env var overriding the server port.
pub const ENV_SERVER_PORT: &str = "HOLODOC_SERVER_PORT";

/// Env var overriding the request content type marker.
pub const ENV_CONTENT_TYPE: &str = "HOLODOC_CONTENT_TYPE";

/// Env var overriding the request timeout (seconds).
pub const ENV_TIMEOUT_SECS: &str = "HOLODOC_TIMEOUT_SECS";

/// Env var selecting the reply success policy ("strict" or "body-present").
pub const ENV_SUCCESS_POLICY: &str = "HOLODOC_SUCCESS_POLICY";
