use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex, Once};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;

const LOG_LEVEL_ENV: &str = "GEOQUERY_LOG_LEVEL";

/// Resolve the maximum log level from `GEOQUERY_LOG_LEVEL`, falling back to
/// INFO when it is unset or unparsable.
pub fn log_level_from_env() -> Level {
    parse_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref())
}

fn parse_level(value: Option<&str>) -> Level {
    value
        .and_then(|level| Level::from_str(level).ok())
        .unwrap_or(Level::INFO)
}

/// Install the global subscriber. The returned guards flush the non-blocking
/// writer on drop and must be held for the lifetime of the process.
pub fn init_logging() -> Vec<WorkerGuard> {
    let mut guards = vec![];

    let (stdout_write, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = Layer::new()
        .with_writer(stdout_write.with_max_level(log_level_from_env()))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);
    guards.push(stdout_guard);

    #[cfg(not(feature = "console"))]
    {
        let subscriber = Registry::default().with(stdout_layer);
        tracing::subscriber::set_global_default(subscriber)
            .expect("global tracing subscriber already installed");
    }
    #[cfg(feature = "console")]
    {
        let subscriber = Registry::default()
            .with(stdout_layer)
            .with(console_subscriber::spawn());
        tracing::subscriber::set_global_default(subscriber)
            .expect("global tracing subscriber already installed");
    }

    guards
}

static GLOBAL_TEST_LOG_GUARDS: LazyLock<Arc<Mutex<Option<Vec<WorkerGuard>>>>> =
    LazyLock::new(|| Arc::new(Mutex::new(None)));

/// Install logging once per test process; later calls are no-ops.
pub fn init_test_logging() {
    static START: Once = Once::new();

    START.call_once(|| {
        let mut guards = GLOBAL_TEST_LOG_GUARDS
            .as_ref()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        *guards = Some(init_logging());
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(None), Level::INFO);
        assert_eq!(parse_level(Some("debug")), Level::DEBUG);
        assert_eq!(parse_level(Some("TRACE")), Level::TRACE);
        assert_eq!(parse_level(Some("loud")), Level::INFO);
    }

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::info!("logging initialized");
    }
}
