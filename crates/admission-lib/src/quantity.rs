//! Resource quantities with exact milli-unit arithmetic
//!
//! Quantities follow the Kubernetes grammar (`100m`, `1.5Gi`, `2e3`, ...).
//! Values are held as an `i128` count of milli-units so that scaling a limit
//! by a request ratio never drifts across repeated admissions of the same pod.
//! Precision below one milli-unit is rounded up on parse.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DECIMAL_SUFFIXES: [&str; 7] = ["", "k", "M", "G", "T", "P", "E"];
const BINARY_SUFFIXES: [&str; 7] = ["", "Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];

/// Unit family a quantity was written in; preserved when formatting results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityFormat {
    /// Powers of 1000 (`m`, `k`, `M`, ...), also plain numbers
    DecimalSI,
    /// Powers of 1024 (`Ki`, `Mi`, `Gi`, ...)
    BinarySI,
    /// Scientific notation (`1e3`, `5E-3`)
    DecimalExponent,
}

/// Errors raised while parsing or combining quantities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("unable to parse quantity {input:?}: {reason}")]
    Invalid { input: String, reason: &'static str },
    #[error("quantity {input:?} is out of range")]
    OutOfRange { input: String },
}

/// A parsed quantity: milli-unit magnitude plus its unit family
#[derive(Debug, Clone, Copy)]
pub struct ParsedQuantity {
    milli: i128,
    format: QuantityFormat,
}

impl ParsedQuantity {
    pub fn from_milli(milli: i128, format: QuantityFormat) -> Self {
        Self { milli, format }
    }

    /// Parse a Kubernetes API quantity
    pub fn from_quantity(quantity: &Quantity) -> Result<Self, QuantityError> {
        quantity.0.parse()
    }

    pub fn milli_value(&self) -> i128 {
        self.milli
    }

    /// Whole units, rounded up
    pub fn value(&self) -> i128 {
        div_ceil(self.milli, 1000)
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    pub fn is_zero(&self) -> bool {
        self.milli == 0
    }

    /// `self * numerator / denominator`, rounded up to the next milli-unit.
    ///
    /// Returns `None` when the denominator is zero or the product does not fit.
    pub fn scale(&self, numerator: &ParsedQuantity, denominator: &ParsedQuantity) -> Option<Self> {
        if denominator.milli == 0 {
            return None;
        }
        let product = self.milli.checked_mul(numerator.milli)?;
        Some(Self {
            milli: div_ceil(product, denominator.milli),
            format: self.format,
        })
    }

    pub fn to_quantity(&self) -> Quantity {
        Quantity(self.to_string())
    }
}

impl PartialEq for ParsedQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.milli == other.milli
    }
}

impl Eq for ParsedQuantity {}

impl PartialOrd for ParsedQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ParsedQuantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.milli.cmp(&other.milli)
    }
}

impl FromStr for ParsedQuantity {
    type Err = QuantityError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(QuantityError::Empty);
        }
        let invalid = |reason| QuantityError::Invalid {
            input: input.to_string(),
            reason,
        };
        let out_of_range = || QuantityError::OutOfRange {
            input: input.to_string(),
        };

        let (negative, unsigned) = match input.as_bytes()[0] {
            b'-' => (true, &input[1..]),
            b'+' => (false, &input[1..]),
            _ => (false, input),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);
        if number.is_empty() || number == "." {
            return Err(invalid("missing digits"));
        }

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if fraction.contains('.') {
            return Err(invalid("more than one decimal point"));
        }

        let (format, pow2, pow10) = parse_suffix(suffix).ok_or_else(|| invalid("unknown suffix"))?;

        let mantissa: i128 = format!("{whole}{fraction}")
            .parse()
            .map_err(|_| out_of_range())?;

        let fraction_digits = i32::try_from(fraction.len()).map_err(|_| out_of_range())?;
        let exponent = pow10
            .checked_add(3)
            .and_then(|e| e.checked_sub(fraction_digits))
            .ok_or_else(out_of_range)?;

        let mut milli = mantissa
            .checked_mul(1i128 << pow2)
            .ok_or_else(out_of_range)?;
        if exponent >= 0 {
            milli = 10i128
                .checked_pow(exponent.unsigned_abs())
                .and_then(|factor| milli.checked_mul(factor))
                .ok_or_else(out_of_range)?;
        } else {
            milli = match 10i128.checked_pow(exponent.unsigned_abs()) {
                Some(divisor) => div_ceil(milli, divisor),
                // smaller than any representable milli-unit
                None => i128::from(milli > 0),
            };
        }

        Ok(Self {
            milli: if negative { -milli } else { milli },
            format,
        })
    }
}

impl TryFrom<&Quantity> for ParsedQuantity {
    type Error = QuantityError;

    fn try_from(quantity: &Quantity) -> Result<Self, Self::Error> {
        Self::from_quantity(quantity)
    }
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.milli % 1000 != 0 {
            return write!(f, "{}m", self.milli);
        }
        let units = self.milli / 1000;
        match self.format {
            QuantityFormat::BinarySI if units.abs() >= 1024 => {
                write_scaled(f, units, 1024, &BINARY_SUFFIXES)
            }
            QuantityFormat::DecimalExponent => {
                let (mantissa, step) = strip_factor(units, 1000, usize::MAX);
                if step == 0 {
                    write!(f, "{mantissa}")
                } else {
                    write!(f, "{mantissa}e{}", step * 3)
                }
            }
            _ => write_scaled(f, units, 1000, &DECIMAL_SUFFIXES),
        }
    }
}

fn write_scaled(f: &mut fmt::Formatter<'_>, units: i128, base: i128, suffixes: &[&str]) -> fmt::Result {
    let (mantissa, step) = strip_factor(units, base, suffixes.len() - 1);
    write!(f, "{mantissa}{}", suffixes[step])
}

fn strip_factor(mut value: i128, base: i128, max_steps: usize) -> (i128, usize) {
    let mut steps = 0;
    while value != 0 && value % base == 0 && steps < max_steps {
        value /= base;
        steps += 1;
    }
    (value, steps)
}

/// Maps a suffix to (format, power of two, power of ten)
fn parse_suffix(suffix: &str) -> Option<(QuantityFormat, u32, i32)> {
    let decimal = |pow10| Some((QuantityFormat::DecimalSI, 0, pow10));
    let binary = |pow2| Some((QuantityFormat::BinarySI, pow2, 0));
    match suffix {
        "" => decimal(0),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        "k" => decimal(3),
        "M" => decimal(6),
        "G" => decimal(9),
        "T" => decimal(12),
        "P" => decimal(15),
        "E" => decimal(18),
        "Ki" => binary(10),
        "Mi" => binary(20),
        "Gi" => binary(30),
        "Ti" => binary(40),
        "Pi" => binary(50),
        "Ei" => binary(60),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            exponent
                .parse::<i32>()
                .ok()
                .map(|pow10| (QuantityFormat::DecimalExponent, 0, pow10))
        }
    }
}

fn div_ceil(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder != 0 && ((remainder > 0) == (denominator > 0)) {
        quotient + 1
    } else {
        quotient
    }
}
