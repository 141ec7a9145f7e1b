use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(display("invalid semantic version {input:?}"))]
pub struct ParseSemverError {
    source: semver::Error,
    input: String,
}

/// A Kubernetes version such as `1.30.2`.
///
/// Serialized as a plain string. A leading `v` and a missing patch component are accepted when
/// parsing, because users commonly write `v1.30` in requests.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Semver(semver::Version);

impl Semver {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn inner(&self) -> &semver::Version {
        &self.0
    }

    /// Returns `major.minor`, the granularity kubelet compatibility is checked at.
    pub fn major_minor(&self) -> String {
        format!("{}.{}", self.0.major, self.0.minor)
    }
}

impl FromStr for Semver {
    type Err = ParseSemverError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim().trim_start_matches('v');
        let normalized = match trimmed.matches('.').count() {
            0 => format!("{trimmed}.0.0"),
            1 => format!("{trimmed}.0"),
            _ => trimmed.to_owned(),
        };

        semver::Version::parse(&normalized)
            .map(Self)
            .context(ParseSemverSnafu { input })
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<semver::Version> for Semver {
    fn from(value: semver::Version) -> Self {
        Self(value)
    }
}

impl Serialize for Semver {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Semver {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("1.30.2", Semver::new(1, 30, 2))]
    #[case("v1.29.0", Semver::new(1, 29, 0))]
    #[case("1.28", Semver::new(1, 28, 0))]
    #[case(" 1 ", Semver::new(1, 0, 0))]
    fn parse_valid(#[case] input: &str, #[case] expected: Semver) {
        assert_eq!(input.parse::<Semver>().expect("valid version"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("latest")]
    #[case("1.x.3")]
    fn parse_invalid(#[case] input: &str) {
        assert!(input.parse::<Semver>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let version = Semver::new(1, 30, 2);
        assert_eq!(
            serde_json::to_value(&version).expect("serializable"),
            serde_json::json!("1.30.2")
        );
        let back: Semver = serde_json::from_str("\"v1.30.2\"").expect("deserializable");
        assert_eq!(back, version);
    }
}
