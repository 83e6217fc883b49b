//! Shared test utilities for core module tests
//!
//! Provides common test helpers to avoid duplication across test suites.
//! This module is only compiled in test mode.
//!
//! Engine-spawning tests live in `tests/integration_tests.rs`, which runs in
//! its own process and points `NFTPROBE_NFT_COMMAND` at the mock engine
//! script (`tests/mock_nft.sh`). Unit tests in the library never spawn the
//! engine, so a unit test run can never touch real nftables.

use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// Use this when your test needs to:
/// 1. Temporarily change env vars to different values
/// 2. Restore env vars after the test
/// 3. Test behavior when env vars are absent
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// Session config pointed at the default scratch table with auditing off,
/// so tests stay out of the user's state directory.
pub fn test_config() -> crate::config::AppConfig {
    crate::config::AppConfig {
        table_name: "validator".to_string(),
        audit_enabled: false,
    }
}
