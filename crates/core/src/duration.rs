//! Parsing of task timeouts such as `90s`, `15m` or `1h30m`.

use std::time::Duration;

/// Parse a duration made of `<number><unit>` pairs.
///
/// Units are `ms`, `s`, `m` and `h`; numbers may carry a fraction
/// (`1.5h`). Returns `None` for anything else, including an empty string.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }

    let mut total = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).ok()
}

/// Whole minutes of a duration string, `None` when it does not parse
#[must_use]
pub fn minutes(input: &str) -> Option<u64> {
    parse_duration(input).map(|d| d.as_secs() / 60)
}
