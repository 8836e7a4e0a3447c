//! Centralized default constants for quire.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration structs in the other crates fall back to these.

// =============================================================================
// REMOTE API
// =============================================================================

/// Base URL of the notes server.
pub const API_URL: &str = "http://localhost:3000";

/// Per-request timeout for gateway calls (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Gateway calls slower than this are logged as slow (milliseconds).
pub const SLOW_REQUEST_MS: u64 = 2_000;

// =============================================================================
// AUTOSAVE
// =============================================================================

/// Quiet period after the last content change before a save fires.
pub const AUTOSAVE_DEBOUNCE_MS: u64 = 1_000;

/// How long the "saving" indicator stays up after a save resolves.
pub const SAVING_INDICATOR_MS: u64 = 1_000;

// =============================================================================
// STORE
// =============================================================================

/// Name used when a folder is created without one.
pub const FOLDER_NAME: &str = "New Folder";

/// Broadcast buffer for store events.
pub const EVENT_BUS_CAPACITY: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_is_on_the_order_of_a_second() {
        assert!((500..=2_000).contains(&AUTOSAVE_DEBOUNCE_MS));
    }

    #[test]
    fn test_api_url_is_http() {
        assert!(API_URL.starts_with("http://") || API_URL.starts_with("https://"));
    }
}
