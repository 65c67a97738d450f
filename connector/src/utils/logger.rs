use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::Subscriber;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::utils;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Per-target level overrides, e.g. `{ "crm_connector": "debug", "hyper": "warn" }`.
#[derive(Debug, Default)]
pub struct LoggerTargets {
    directives: Vec<Directive>,
}

impl LoggerTargets {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        utils::serde::load_json_from_file(path)
    }

    pub fn build_filter(&self) -> EnvFilter {
        self.directives
            .iter()
            .cloned()
            .fold(EnvFilter::default(), EnvFilter::add_directive)
    }
}

impl<'de> Deserialize<'de> for LoggerTargets {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let targets = std::collections::BTreeMap::<String, String>::deserialize(deserializer)?;

        let directives = targets
            .into_iter()
            .map(|(target, level)| {
                format!("{target}={level}")
                    .parse::<Directive>()
                    .map_err(serde::de::Error::custom)
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { directives })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub outputs: Vec<LoggerOutput>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            outputs: vec![LoggerOutput::Stderr(LoggerStderrOutput::default())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Auto,
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoggerOutput {
    Stderr(LoggerStderrOutput),
    File(LoggerFileOutput),
}

impl LoggerOutput {
    fn as_layer<S>(&self) -> Result<BoxedLayer<S>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        match self {
            Self::Stderr(stderr) => Ok(stderr.as_layer()),
            Self::File(file) => file.as_layer(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct LoggerStderrOutput {
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggerStderrOutput {
    fn as_layer<S>(&self) -> BoxedLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        match self.format {
            LogFormat::Human => fmt::layer().with_writer(std::io::stderr).boxed(),
            LogFormat::Auto if std::io::stderr().is_terminal() => {
                fmt::layer().with_writer(std::io::stderr).boxed()
            }
            LogFormat::Auto => fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Json => tracing_stackdriver::layer()
                .with_writer(std::io::stderr)
                .boxed(),
        }
    }
}

/// Hourly rotated log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerFileOutput {
    pub dir: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "log_file_prefix")]
    pub file_prefix: String,
    #[serde(default = "max_log_files")]
    pub max_files: NonZeroUsize,
}

impl LoggerFileOutput {
    fn as_layer<S>(&self) -> Result<BoxedLayer<S>>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let writer = tracing_appender::rolling::Builder::new()
            .rotation(Rotation::HOURLY)
            .filename_prefix(&self.file_prefix)
            .max_log_files(self.max_files.get())
            .build(&self.dir)
            .with_context(|| format!("failed to open log dir {}", self.dir.display()))?;

        // Files default to JSON since nobody tails them in a terminal.
        Ok(match self.format {
            LogFormat::Human => fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
            LogFormat::Json | LogFormat::Auto => {
                tracing_stackdriver::layer().with_writer(writer).boxed()
            }
        })
    }
}

fn log_file_prefix() -> String {
    "connector.log".to_owned()
}

fn max_log_files() -> NonZeroUsize {
    NonZeroUsize::MIN.saturating_add(24)
}

/// Installs the global subscriber.
///
/// Without `logger_targets` the filter comes from `RUST_LOG`, defaulting to `info`.
/// Fails if called twice.
pub fn init_logger(config: &LoggerConfig, logger_targets: Option<&Path>) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;

    let filter = match logger_targets {
        None => EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env_lossy(),
        Some(path) => LoggerTargets::load_from(path)
            .context("failed to load logger targets")?
            .build_filter(),
    };

    let outputs = config
        .outputs
        .iter()
        .map(LoggerOutput::as_layer)
        .collect::<Result<Vec<_>>>()?;

    static ONCE: Once = Once::new();

    let mut result = None;
    ONCE.call_once(|| {
        let subscriber = tracing_subscriber::registry().with(filter).with(outputs);
        result = Some(tracing::subscriber::set_global_default(subscriber));
    });

    match result {
        Some(res) => res.map_err(Into::into),
        None => anyhow::bail!("logger was already initialized"),
    }
}

pub fn set_abort_with_tracing() {
    std::panic::set_hook(Box::new(|info| {
        use std::io::Write;

        let backtrace = std::backtrace::Backtrace::force_capture();
        tracing::error!("panic: {info}\n{backtrace}");

        std::io::stderr().flush().ok();
        std::io::stdout().flush().ok();

        #[allow(clippy::exit)]
        std::process::exit(1);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse_into_directives() {
        let targets: LoggerTargets =
            serde_json::from_str(r#"{ "crm_connector": "debug", "hyper": "warn" }"#).unwrap();
        assert_eq!(targets.directives.len(), 2);
    }

    #[test]
    fn bad_level_is_rejected() {
        let res = serde_json::from_str::<LoggerTargets>(r#"{ "crm_connector": "loud" }"#);
        assert!(res.is_err());
    }

    #[test]
    fn outputs_are_tagged() {
        let config: LoggerConfig = serde_json::from_str(
            r#"{ "outputs": [
                { "type": "stderr", "format": "json" },
                { "type": "file", "dir": "/var/log/connector" }
            ] }"#,
        )
        .unwrap();

        assert!(matches!(
            config.outputs[0],
            LoggerOutput::Stderr(LoggerStderrOutput {
                format: LogFormat::Json
            })
        ));
        let LoggerOutput::File(file) = &config.outputs[1] else {
            panic!("expected file output");
        };
        assert_eq!(file.file_prefix, "connector.log");
        assert_eq!(file.max_files.get(), 25);
    }
}
