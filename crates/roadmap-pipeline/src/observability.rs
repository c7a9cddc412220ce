//! Log setup for roadmap runs. Each run logs under a `pipeline_run` span
//! with one child span per fan-out call.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum level captured for this crate. `RUST_LOG` still applies to others.
    pub level: Level,
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

/// Defines the output target for logs.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Log to stdout.
    #[default]
    Console,
    /// Log to a file, truncating it first.
    File(String),
}

/// Initializes the global tracing subscriber.
///
/// Call once at startup. A second call, or a call after another subscriber
/// was installed, returns an error.
pub fn init(config: ObservabilityConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("roadmap_pipeline={}", config.level).parse()?);

    let subscriber = tracing_subscriber::registry().with(filter);

    match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stdout);
            subscriber.with(layer).try_init()?;
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(path)?;
            let layer = fmt::layer().with_ansi(false).with_writer(file);
            subscriber.with(layer).try_init()?;
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;

    #[test]
    fn test_file_target_receives_logs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.log");

        init(ObservabilityConfig {
            level: Level::DEBUG,
            target: LogTarget::File(path.to_string_lossy().into_owned()),
        })
        .unwrap();
        info!(stage = "researching", "Stage started");

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Stage started"));
        assert!(written.contains("stage=\"researching\""));

        assert!(
            init(ObservabilityConfig::default()).is_err(),
            "second init is rejected"
        );
    }
}
