//! Logging setup.

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `RUST_LOG` wins over `level`.
///
/// With a `log_dir`, output goes to a daily rolling file instead of stderr.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logger(level: &str, log_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("retail_crm_lib={level},retail_crm={level}")));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    if let Some(dir) = log_dir {
        if std::fs::create_dir_all(dir).is_ok() {
            let file_appender = tracing_appender::rolling::daily(dir, "retail-crm");
            let _ = subscriber
                .with_ansi(false)
                .with_writer(file_appender)
                .try_init();
            return;
        }
        eprintln!("cannot create log directory {}, logging to stderr", dir.display());
    }

    let _ = subscriber.try_init();
}
