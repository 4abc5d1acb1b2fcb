//! Structured logging helpers for tests.
//!
//! Tests log through `tracing` like the rest of the crate. Each test opens
//! with [`test_phase!`], asserts through [`assert_with_log!`] so failures
//! carry the expected and actual values, and closes with [`test_complete!`].

/// Initializes tracing for tests. Safe to call from every test; only the
/// first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Phase tracking macro for structured test logging.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Assertion with logging for better test output.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Marks the successful end of a test, optionally with summary fields.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST COMPLETE ===");
    };
    ($name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        tracing::info!(test = $name, $($key = ?$value),+, "=== TEST COMPLETE ===");
    };
}
