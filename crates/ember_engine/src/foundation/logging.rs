//! Logging setup

pub use log::{debug, error, info, trace, warn};

/// Initialize the logger
///
/// `RUST_LOG` wins over `default_filter` when set. Calling this twice is
/// harmless; the second call only reports that a logger already exists.
pub fn init(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    if env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .is_err()
    {
        log::debug!("Logger already initialized");
    }
}

/// Logger for tests; output is captured per test
pub fn init_for_tests() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_for_tests();
        init_for_tests();
        init("debug");
        log::info!("still logging");
        assert!(log::max_level() >= log::LevelFilter::Error);
    }
}
