//! ISO-8601 timer values: durations, repeating intervals and dates

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeDelta};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("Repetition spec must start with R")]
    MissingRepetitionPrefix,

    #[error("Expected repeating interval '{0}' to contain '/' between repetitions and interval")]
    MissingIntervalSeparator(String),

    #[error("Expected a number of repetitions but found '{0}'")]
    InvalidRepetitions(String),

    #[error("Invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("Invalid date '{0}': {1}")]
    InvalidDate(String, String),
}

/* ===================== Durations ===================== */

/// Parse `P[nW][nD][T[nH][nM][nS]]` into a time delta
pub fn parse_duration(text: &str) -> Result<TimeDelta, TimerError> {
    let invalid = || TimerError::InvalidDuration(text.to_string());

    let body = text.strip_prefix('P').ok_or_else(invalid)?;
    if body.is_empty() || body == "T" {
        return Err(invalid());
    }

    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return Err(invalid()),
        None => (body, None),
    };

    let mut millis: i64 = 0;

    for (value, unit) in components(date_part).ok_or_else(invalid)? {
        let factor = match unit {
            'W' => 7 * 86_400_000,
            'D' => 86_400_000,
            _ => return Err(invalid()),
        };
        millis = add_scaled(millis, value, factor).ok_or_else(invalid)?;
    }

    if let Some(time_part) = time_part {
        for (value, unit) in components(time_part).ok_or_else(invalid)? {
            let factor = match unit {
                'H' => 3_600_000,
                'M' => 60_000,
                'S' => 1_000,
                _ => return Err(invalid()),
            };
            millis = add_scaled(millis, value, factor).ok_or_else(invalid)?;
        }
    }

    Ok(TimeDelta::milliseconds(millis))
}

/// Split `3D12H` into `[(3.0, 'D'), (12.0, 'H')]`
fn components(text: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();

    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
        } else {
            let value: f64 = number.parse().ok()?;
            out.push((value, c));
            number.clear();
        }
    }

    number.is_empty().then_some(out)
}

fn add_scaled(total: i64, value: f64, factor: i64) -> Option<i64> {
    let scaled = value * factor as f64;
    if !scaled.is_finite() || scaled > i64::MAX as f64 {
        return None;
    }
    total.checked_add(scaled.round() as i64)
}

/* ===================== Repeating Intervals ===================== */

/// `R[n]/<duration>`; no repetition count means repeat forever
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatingInterval {
    pub repetitions: Option<u32>,
    pub interval: TimeDelta,
}

impl FromStr for RepeatingInterval {
    type Err = TimerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let spec = text
            .strip_prefix('R')
            .ok_or(TimerError::MissingRepetitionPrefix)?;

        let (count, interval) = spec
            .split_once('/')
            .ok_or_else(|| TimerError::MissingIntervalSeparator(text.to_string()))?;

        let repetitions = if count.is_empty() {
            None
        } else {
            Some(
                count
                    .parse::<u32>()
                    .map_err(|_| TimerError::InvalidRepetitions(count.to_string()))?,
            )
        };

        Ok(Self {
            repetitions,
            interval: parse_duration(interval)?,
        })
    }
}

impl fmt::Display for RepeatingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repetitions {
            Some(n) => write!(f, "R{}/{}", n, self.interval),
            None => write!(f, "R/{}", self.interval),
        }
    }
}

/* ===================== Dates ===================== */

pub fn parse_date(text: &str) -> Result<DateTime<FixedOffset>, TimerError> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| TimerError::InvalidDate(text.to_string(), e.to_string()))
}
