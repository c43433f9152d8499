use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::CrmConfig;

const DEFAULT_FILTER: &str = "edu_crm=info,tower_http=info";

/// Install the global subscriber: stdout always, plus a daily-rolling file
/// when a log directory is configured. Keep the returned guard alive for
/// the life of the process or buffered file output is lost.
pub fn init_logging(config: &CrmConfig) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let stdout = if config.log_json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "edu_crm.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(stdout.with_filter(filter()))
        .with(file)
        .try_init();
    if let Err(err) = installed {
        eprintln!("logging already initialised: {err}");
    }
    guard
}
