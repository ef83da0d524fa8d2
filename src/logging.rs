use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "escaperoom.log";

/// Install the global subscriber. Logs always go to a daily rolling file under
/// `log_dir`; `console` adds a stderr layer, which must stay off while the TUI
/// owns the terminal.
///
/// The returned guard flushes the file writer on drop and has to be held for
/// the life of the process.
pub fn init(log_dir: &Path, console: bool) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    });

    let _ = fs::create_dir_all(log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(err) = init_result {
        eprintln!("tracing init failed: {err}");
        return None;
    }

    Some(file_guard)
}
