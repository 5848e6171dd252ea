//! Usage: Process-wide tracing subscriber (stderr, non-blocking, `OAUTH2L_LOG` override).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

pub(crate) const ENV_LOG_FILTER: &str = "OAUTH2L_LOG";

const FALLBACK_FILTER: &str = "warn";

fn build_filter(configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_LOG_FILTER) {
        return filter;
    }
    let configured = configured.trim();
    if configured.is_empty() {
        return EnvFilter::new(FALLBACK_FILTER);
    }
    EnvFilter::try_new(configured).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
}

/// Installs the subscriber. The returned guard flushes pending records when dropped,
/// so the caller keeps it alive for the whole process.
pub(crate) fn init(configured_filter: &str) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(build_filter(configured_filter))
        .with(fmt_layer);
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        // `log` records from dependencies (reqwest, hyper).
        let _ = tracing_log::LogTracer::init();
    }
    guard
}
