//! Console Log Subscriber Settings.

use tracing::level_filters::LevelFilter;

use super::{Settings, SettingsBuilder, SettingsToggle};

/// Configure specific settings for the console log subscriber.
#[derive(Debug, Default, PartialEq)]
pub enum ConsoleLogSettings {
    /// Console subscriber disabled.
    #[default]
    Disabled,

    /// Console subscriber enabled.
    Enabled {
        /// Common subscriber settings that apply to the console subscriber.
        common_settings: Settings,

        /// Console subscriber log event output format.
        log_format: Format,
    },
}

/// Console subscriber log event output formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Plain unstructured output. ANSI colors can be disabled by setting `NO_COLOR`.
    #[default]
    Plain,

    /// One JSON object per event.
    Json,
}

impl SettingsToggle for ConsoleLogSettings {
    fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// For building [`ConsoleLogSettings`].
///
/// <div class="warning">
/// Do not use directly, instead use the [`Settings::builder`] associated function.
/// </div>
pub struct ConsoleLogSettingsBuilder {
    pub(crate) common_settings: Settings,
    pub(crate) log_format: Format,
}

impl ConsoleLogSettingsBuilder {
    pub fn with_log_format(mut self, format: Format) -> Self {
        self.log_format = format;
        self
    }

    pub fn build(self) -> ConsoleLogSettings {
        ConsoleLogSettings::Enabled {
            common_settings: self.common_settings,
            log_format: self.log_format,
        }
    }
}

impl From<SettingsBuilder> for ConsoleLogSettingsBuilder {
    fn from(value: SettingsBuilder) -> Self {
        Self {
            common_settings: value.build(),
            log_format: Format::default(),
        }
    }
}

impl From<Settings> for ConsoleLogSettings {
    fn from(common_settings: Settings) -> Self {
        Self::Enabled {
            common_settings,
            log_format: Format::default(),
        }
    }
}

impl<T> From<Option<T>> for ConsoleLogSettings
where
    T: Into<Self>,
{
    fn from(settings: Option<T>) -> Self {
        settings.map_or(Self::Disabled, Into::into)
    }
}

impl From<(&'static str, LevelFilter)> for ConsoleLogSettings {
    fn from((environment_variable, default_level): (&'static str, LevelFilter)) -> Self {
        Settings {
            environment_variable,
            default_level,
        }
        .into()
    }
}

impl From<(&'static str, LevelFilter, bool)> for ConsoleLogSettings {
    fn from((environment_variable, default_level, enabled): (&'static str, LevelFilter, bool)) -> Self {
        if enabled {
            (environment_variable, default_level).into()
        } else {
            Self::Disabled
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[test]
    fn builds_settings() {
        let expected = ConsoleLogSettings::Enabled {
            common_settings: Settings {
                environment_variable: "hello",
                default_level: LevelFilter::DEBUG,
            },
            log_format: Format::Json,
        };
        let result = Settings::builder()
            .with_environment_variable("hello")
            .with_default_level(LevelFilter::DEBUG)
            .console_log_settings_builder()
            .with_log_format(Format::Json)
            .build();

        assert_eq!(expected, result);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn triple_toggles_subscriber(#[case] enabled: bool) {
        let settings = ConsoleLogSettings::from(("CONSOLE", LevelFilter::INFO, enabled));
        assert_eq!(settings.is_enabled(), enabled);
    }
}
