use anyhow::{Context, Result};
use melware_config::{LogFormat, LogTarget, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps file writers flushing; hold it for the life of the process
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggingGuard {
    guards: Vec<WorkerGuard>,
}

impl LoggingGuard {
    /// Number of file targets being written
    pub fn file_targets(&self) -> usize {
        self.guards.len()
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    // Use try_init to avoid panic if global subscriber already set
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize logging from configuration.
///
/// Every target gets its own formatter layer in the configured format.
/// File targets are written through a non-blocking appender whose guard is
/// returned to the caller.
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = LoggingGuard::default();

    let targets = if config.targets.is_empty() {
        vec![LogTarget::Console]
    } else {
        config.targets.clone()
    };

    for target in &targets {
        match target {
            LogTarget::Console => layers.push(format_layer(config, std::io::stdout, true)),
            LogTarget::File {
                directory,
                file_name,
            } => {
                std::fs::create_dir_all(directory)
                    .with_context(|| format!("Failed to create log directory {}", directory))?;
                let appender = tracing_appender::rolling::never(directory, file_name);
                let (writer, worker_guard) = tracing_appender::non_blocking(appender);
                guard.guards.push(worker_guard);
                layers.push(format_layer(config, writer, false));
            }
        }
    }

    if tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(&config.level.to_string()))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(guard)
}

fn format_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.include_target)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    match config.format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Text => layer.boxed(),
    }
}
