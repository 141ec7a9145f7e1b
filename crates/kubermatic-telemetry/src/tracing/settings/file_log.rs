//! Rolling JSON log files.

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};

use super::Settings;
use crate::tracing::Tracing;

/// JSON log files of one service, written to `directory`.
///
/// Files are named after the service: `<service>.json`, or `<service>.<date>.json` once a
/// rotation period is set.
#[derive(Debug, PartialEq)]
pub struct FileLog {
    pub settings: Settings,
    pub directory: PathBuf,
    pub service_name: &'static str,
    pub rotation_period: RotationPeriod,
}

impl FileLog {
    pub const FILE_NAME_SUFFIX: &str = "json";

    /// File logs filtered by [`Tracing::FILE_LOG_LEVEL`], INFO by default, that are never
    /// rotated.
    pub fn new(directory: impl Into<PathBuf>, service_name: &'static str) -> Self {
        Self {
            settings: Settings::builder()
                .with_environment_variable(Tracing::FILE_LOG_LEVEL)
                .with_default_level(LevelFilter::INFO)
                .build(),
            directory: directory.into(),
            service_name,
            rotation_period: RotationPeriod::default(),
        }
    }

    pub fn with_rotation_period(mut self, rotation_period: RotationPeriod) -> Self {
        self.rotation_period = rotation_period;
        self
    }

    /// Opens the current log file.
    pub(crate) fn appender(&self) -> Result<RollingFileAppender, InitError> {
        RollingFileAppender::builder()
            .rotation(self.rotation_period.into())
            .filename_prefix(self.service_name)
            .filename_suffix(Self::FILE_NAME_SUFFIX)
            .build(&self.directory)
    }
}

/// Supported periods when the log file is rolled over.
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "PascalCase")]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    Daily,

    #[default]
    Never,
}

impl From<RotationPeriod> for Rotation {
    fn from(value: RotationPeriod) -> Self {
        match value {
            RotationPeriod::Minutely => Self::MINUTELY,
            RotationPeriod::Hourly => Self::HOURLY,
            RotationPeriod::Daily => Self::DAILY,
            RotationPeriod::Never => Self::NEVER,
        }
    }
}
