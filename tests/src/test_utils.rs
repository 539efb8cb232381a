//! Logging and timing helpers shared by the scenario tests

use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

/// Result type for integration tests
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for any single wait on the peer or the system under test
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize logging for tests
///
/// Uses RUST_LOG environment variable if set, otherwise defaults to "info".
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}
