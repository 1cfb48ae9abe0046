use std::{fs::OpenOptions, path::Path, sync::Mutex};

use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

pub const DEFAULT_LOG_FILE: &str = "ethflow.log";

/// Installs the global tracing subscriber. `RUST_LOG` directives take
/// precedence over `level`. With `log_file` set, lines are appended to that
/// file instead of stderr.
pub fn init_tracing(level: &str, log_file: Option<&Path>) -> crate::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse::<LevelFilter>()
                .unwrap_or(LevelFilter::INFO)
                .into(),
        )
        .from_env_lossy();

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|e| crate::Error::LogFileOpenFailed(path.to_path_buf(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.try_init(),
    };

    result.map_err(|e| crate::Error::TracingInitFailed(e.to_string()))
}
