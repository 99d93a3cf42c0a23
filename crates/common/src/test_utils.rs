//! Общие helpers для тестов

use std::sync::Once;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

static TEST_LOGGING: Once = Once::new();

/// Подключить tracing к выводу тестов. Повторные вызовы ничего не делают
pub fn init_test_logging() {
    TEST_LOGGING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Замер времени для assert-ов производительности
pub struct TestTimer {
    start: Instant,
    name: String,
}

impl TestTimer {
    pub fn start(name: &str) -> Self {
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn assert_faster_than(&self, max_duration: Duration) {
        let elapsed = self.elapsed();
        assert!(
            elapsed < max_duration,
            "{} took {:?}, expected faster than {:?}",
            self.name,
            elapsed,
            max_duration
        );
    }
}
