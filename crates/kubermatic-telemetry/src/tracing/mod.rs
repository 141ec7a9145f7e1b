//! Initialises the tracing subscribers for console and rolling file output.
//!
//! To get started, see [`Tracing`].

use std::path::PathBuf;

use snafu::{ResultExt as _, Snafu};
use tracing::{level_filters::LevelFilter, subscriber::SetGlobalDefaultError};
use tracing_appender::rolling::InitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, filter::Directive, layer::SubscriberExt};

use crate::tracing::settings::*;

pub mod settings;

type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors which can be encountered when initialising [`Tracing`].
#[derive(Debug, Snafu)]
pub enum Error {
    /// Indicates that [`Tracing`] failed to install the rolling file appender.
    #[snafu(display("failed to initialize rolling file appender"))]
    InitRollingFileAppender { source: InitError },

    /// Indicates that [`Tracing`] failed to set the global default subscriber.
    #[snafu(display("unable to set the global default subscriber"))]
    SetGlobalDefaultSubscriber { source: SetGlobalDefaultError },
}

/// A set of pre-configured [`Subscriber`][1] layers.
///
/// The subscribers stay active as long as the value returned by [`Tracing::init`] is alive. Bind
/// it to a named variable (not `let _ =`) in `main`:
///
/// ```
/// # use kubermatic_telemetry::tracing::{Tracing, TelemetryOptions, Error};
/// fn main() -> Result<(), Error> {
///     let _tracing_guard =
///         Tracing::pre_configured("dashboard", TelemetryOptions::default()).init()?;
///
///     tracing::info!("log a message");
///     Ok(())
/// }
/// ```
///
/// ## Environment variables and CLI arguments
///
/// - `CONSOLE_LOG_DISABLED` (`--console-log-disabled`): disables console logs.
/// - `CONSOLE_LOG_LEVEL`: log level filter of the console logs.
/// - `CONSOLE_LOG_FORMAT` (`--console-log-format`): `plain` or `json`.
/// - `FILE_LOG_DIRECTORY` (`--file-log-directory`): enables JSON file logs in this directory.
/// - `FILE_LOG_ROTATION_PERIOD` (`--file-log-rotation-period`): rotation period of log files.
/// - `FILE_LOG_LEVEL`: log level filter of the file logs.
///
/// [1]: tracing::Subscriber
pub struct Tracing {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log: Option<FileLog>,
}

impl Tracing {
    /// The environment variable used to set the console log level filter.
    pub const CONSOLE_LOG_LEVEL: &str = "CONSOLE_LOG_LEVEL";
    /// The environment variable used to set the rolling file log level filter.
    pub const FILE_LOG_LEVEL: &str = "FILE_LOG_LEVEL";

    /// Creates and returns a [`TracingBuilder`].
    pub fn builder(service_name: &'static str) -> TracingBuilder {
        TracingBuilder {
            service_name,
            console_log_settings: ConsoleLogSettings::Disabled,
            file_log: None,
        }
    }

    /// Creates a [`Tracing`] instance from CLI options. Console and file logs default to INFO,
    /// log files are named after `service_name` and not rotated unless a period is given.
    pub fn pre_configured(service_name: &'static str, options: TelemetryOptions) -> Self {
        let TelemetryOptions {
            console_log_disabled,
            console_log_format,
            file_log_directory,
            file_log_rotation_period,
        } = options;

        let console_log_settings = (!console_log_disabled).then(|| {
            Settings::builder()
                .with_environment_variable(Self::CONSOLE_LOG_LEVEL)
                .with_default_level(LevelFilter::INFO)
                .console_log_settings_builder()
                .with_log_format(console_log_format.unwrap_or_default().into())
                .build()
        });

        Self::builder(service_name)
            .with_console_output(console_log_settings)
            .with_file_output(file_log_directory.map(|directory| {
                FileLog::new(directory, service_name)
                    .with_rotation_period(file_log_rotation_period.unwrap_or_default())
            }))
            .build()
    }

    /// Installs the configured subscribers as the global default.
    pub fn init(self) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Sync + Send>> = Vec::new();

        if let ConsoleLogSettings::Enabled {
            common_settings,
            log_format,
        } = &self.console_log_settings
        {
            let env_filter_layer = env_filter_builder(
                common_settings.environment_variable,
                common_settings.default_level,
            );
            let console_output_layer = match log_format {
                Format::Plain => tracing_subscriber::fmt::layer()
                    .with_filter(env_filter_layer)
                    .boxed(),
                Format::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_filter(env_filter_layer)
                    .boxed(),
            };
            layers.push(console_output_layer);
        }

        if let Some(file_log) = &self.file_log {
            let env_filter_layer = env_filter_builder(
                file_log.settings.environment_variable,
                file_log.settings.default_level,
            );
            let file_appender = file_log
                .appender()
                .context(InitRollingFileAppenderSnafu)?;

            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(file_appender)
                    .with_filter(env_filter_layer)
                    .boxed(),
            );
        }

        if !layers.is_empty() {
            tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layers))
                .context(SetGlobalDefaultSubscriberSnafu)?;
        }

        tracing::debug!(
            service.name = self.service_name,
            console.enabled = self.console_log_settings.is_enabled(),
            file.enabled = self.file_log.is_some(),
            "tracing initialised"
        );

        Ok(self)
    }
}

/// Makes it easy to build a valid [`Tracing`] instance.
pub struct TracingBuilder {
    service_name: &'static str,
    console_log_settings: ConsoleLogSettings,
    file_log: Option<FileLog>,
}

impl TracingBuilder {
    /// Enable the console output subscriber, see [`ConsoleLogSettings`] for the accepted inputs.
    pub fn with_console_output(mut self, settings: impl Into<ConsoleLogSettings>) -> Self {
        self.console_log_settings = settings.into();
        self
    }

    /// Enable the rolling JSON file subscriber.
    pub fn with_file_output(mut self, file_log: impl Into<Option<FileLog>>) -> Self {
        self.file_log = file_log.into();
        self
    }

    pub fn build(self) -> Tracing {
        Tracing {
            service_name: self.service_name,
            console_log_settings: self.console_log_settings,
            file_log: self.file_log,
        }
    }
}

/// Create an [`EnvFilter`] configured with the given environment variable and default [`Directive`].
fn env_filter_builder(env_var: &str, default_directive: impl Into<Directive>) -> EnvFilter {
    EnvFilter::builder()
        .with_env_var(env_var)
        .with_default_directive(default_directive.into())
        .from_env_lossy()
}

/// Telemetry options which can be passed to [`Tracing::pre_configured()`].
///
/// With the `clap` feature enabled this can be flattened into CLI arguments.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Disable console logs.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub console_log_disabled: bool,

    /// Output FORMAT of the console logs.
    #[cfg_attr(feature = "clap", arg(long, env, value_name = "FORMAT"))]
    pub console_log_format: Option<ConsoleLogFormat>,

    /// Enable logging to files located in the specified DIRECTORY.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "DIRECTORY", group = "file_log")
    )]
    pub file_log_directory: Option<PathBuf>,

    /// Time PERIOD after which log files are rolled over.
    #[cfg_attr(
        feature = "clap",
        arg(long, env, value_name = "PERIOD", requires = "file_log")
    )]
    pub file_log_rotation_period: Option<RotationPeriod>,
}

/// Console output formats selectable on the command line.
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ConsoleLogFormat {
    #[default]
    Plain,
    Json,
}

impl From<ConsoleLogFormat> for Format {
    fn from(value: ConsoleLogFormat) -> Self {
        match value {
            ConsoleLogFormat::Plain => Self::Plain,
            ConsoleLogFormat::Json => Self::Json,
        }
    }
}
