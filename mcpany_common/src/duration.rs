//! Duration strings as they appear in transport form ("12.3ms", "1.5s")

use thiserror::Error;

/// Duration parse errors
#[derive(Debug, Error, PartialEq)]
pub enum DurationParseError {
    #[error("Empty duration")]
    Empty,

    #[error("Invalid duration number: {0}")]
    InvalidNumber(String),

    #[error("Unknown duration unit: {0}")]
    UnknownUnit(String),
}

/// Parse a duration string into milliseconds.
///
/// Accepts Go's compound form ("1m30.5s", "1h0m0s"), summing each
/// `<number><unit>` part. A bare number is taken to be milliseconds, but
/// only on its own.
pub fn parse_duration_ms(input: &str) -> Result<f64, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut rest = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let mut total = 0.0;
    let mut parts = 0;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || (parts == 0 && c == '-')))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let value: f64 = number
            .parse()
            .map_err(|_| DurationParseError::InvalidNumber(number.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(DurationParseError::InvalidNumber(number.to_string()));
        }

        let unit = unit.trim();
        if unit.is_empty() && (parts > 0 || !tail.is_empty()) {
            return Err(DurationParseError::UnknownUnit(trimmed.to_string()));
        }
        total += value * unit_ms(unit)?;
        parts += 1;
        rest = tail;
    }

    Ok(total)
}

fn unit_ms(unit: &str) -> Result<f64, DurationParseError> {
    Ok(match unit {
        "" | "ms" => 1.0,
        "ns" => 1.0 / 1_000_000.0,
        "us" | "µs" | "μs" => 1.0 / 1_000.0,
        "s" => 1_000.0,
        "m" | "min" => 60_000.0,
        "h" => 3_600_000.0,
        other => return Err(DurationParseError::UnknownUnit(other.to_string())),
    })
}
