use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber: stderr output filtered by `RUST_LOG` (default `info`),
/// plus a debug-level file layer when `NOTEWINDOW_LOG_FILE` is set.
pub fn init_tracing() {
    let file_logging = std::env::var("NOTEWINDOW_LOG_FILE").ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter),
    );

    let file = file_logging.as_ref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!("Failed to open log file {}: {}", log_path, err);
                None
            }
        }
    });

    if let (Some(file), Some(log_path)) = (file, file_logging.as_ref()) {
        let file_layer = fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        if registry.with(file_layer).try_init().is_ok() {
            eprintln!("File logging enabled: {}", log_path);
        }
    } else {
        let _ = registry.try_init();
    }
}
