//! Numeric values of Kubernetes resource quantities such as `250m`, `1.5Gi` or `1200n`.

use std::{num::ParseFloatError, str::FromStr};

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::{ResultExt as _, Snafu, ensure};

#[derive(Debug, PartialEq, Snafu)]
pub enum ParseQuantityError {
    #[snafu(display("input is either empty or contains non-ascii characters"))]
    InvalidFormat,

    #[snafu(display("failed to parse floating point number"))]
    InvalidFloat { source: ParseFloatError },

    #[snafu(display("failed to parse {input:?} as quantity suffix"))]
    InvalidSuffix { input: String },
}

/// A parsed quantity, held as a plain number of base units.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    /// The value in base units, rounded up like the API server does.
    pub fn value(self) -> i64 {
        self.0.ceil() as i64
    }

    /// The value in thousandths of the base unit, rounded up.
    pub fn milli_value(self) -> i64 {
        (self.0 * 1000.0).ceil() as i64
    }
}

fn suffix_factor(suffix: &str) -> Option<f64> {
    let factor = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 2f64.powi(10),
        "Mi" => 2f64.powi(20),
        "Gi" => 2f64.powi(30),
        "Ti" => 2f64.powi(40),
        "Pi" => 2f64.powi(50),
        "Ei" => 2f64.powi(60),
        exponent => {
            let exponent = exponent.strip_prefix(['e', 'E'])?;
            10f64.powf(f64::from_str(exponent).ok()?)
        }
    };
    Some(factor)
}

impl FromStr for Quantity {
    type Err = ParseQuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        ensure!(!input.is_empty() && input.is_ascii(), InvalidFormatSnafu);

        let suffix_index = input
            .char_indices()
            .find(|(index, c)| !(c.is_ascii_digit() || *c == '.' || (*index == 0 && matches!(c, '+' | '-'))))
            .map_or(input.len(), |(index, _)| index);
        let (number, suffix) = input.split_at(suffix_index);

        let value = f64::from_str(number).context(InvalidFloatSnafu)?;
        let factor = suffix_factor(suffix).ok_or_else(|| ParseQuantityError::InvalidSuffix {
            input: suffix.to_owned(),
        })?;
        Ok(Self(value * factor))
    }
}

impl TryFrom<&K8sQuantity> for Quantity {
    type Error = ParseQuantityError;

    fn try_from(value: &K8sQuantity) -> Result<Self, Self::Error> {
        Self::from_str(&value.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("0", 0, 0)]
    #[case("2", 2, 2000)]
    #[case("250m", 1, 250)]
    #[case("1.5", 2, 1500)]
    #[case("123456789n", 1, 124)]
    #[case("1Ki", 1024, 1_024_000)]
    #[case("3Gi", 3_221_225_472, 3_221_225_472_000)]
    #[case("1k", 1000, 1_000_000)]
    #[case("5e3", 5000, 5_000_000)]
    fn values(#[case] input: &str, #[case] value: i64, #[case] milli: i64) {
        let quantity: Quantity = input.parse().expect("valid quantity");
        assert_eq!(quantity.value(), value);
        assert_eq!(quantity.milli_value(), milli);
    }

    #[rstest]
    #[case("", ParseQuantityError::InvalidFormat)]
    #[case("1Qi", ParseQuantityError::InvalidSuffix { input: "Qi".to_owned() })]
    fn invalid(#[case] input: &str, #[case] expected: ParseQuantityError) {
        assert_eq!(input.parse::<Quantity>(), Err(expected));
    }
}
