//! Quiescence interval parsing
//!
//! An interval is written as one or more tokens, each a non-negative decimal
//! integer optionally followed by a single unit letter: `s` (seconds, also the
//! default when no unit is given), `m` (minutes) or `h` (hours). The tokens
//! sum, so `1h 30m` and `90m` name the same interval.

use std::fmt;

/// Interval used when none is given anywhere (1 hour).
pub const DEFAULT_INTERVAL: Interval = Interval(60 * 60);

/// Environment variable carrying an interval in plain seconds.
pub const INTERVAL_ENV: &str = "AUTOHALTD_INTERVAL";

/// Errors produced while parsing interval tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("Interval arguments must be non-negative integers")]
    NotANumber,

    #[error("Invalid interval, units are 's', 'm', and 'h'")]
    BadUnit,

    #[error("Interval is too large")]
    Overflow,

    #[error("The interval cannot be zero")]
    Zero,
}

/// Parse a single interval token into seconds.
pub fn parse_token(token: &str) -> Result<u64, IntervalError> {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    if digits_end == 0 {
        return Err(IntervalError::NotANumber);
    }

    let (digits, unit) = token.split_at(digits_end);
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => return Err(IntervalError::BadUnit),
    };

    // Every character is an ASCII digit, so the only parse failure is overflow.
    let value: u64 = digits.parse().map_err(|_| IntervalError::Overflow)?;
    value
        .checked_mul(multiplier)
        .ok_or(IntervalError::Overflow)
}

/// A validated, non-zero quiescence interval in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval(u64);

impl Interval {
    /// Build an interval from seconds. Zero is not an interval.
    pub fn from_secs(secs: u64) -> Option<Self> {
        (secs > 0).then_some(Self(secs))
    }

    /// Sum a sequence of tokens.
    ///
    /// Returns `Ok(None)` when there are no tokens at all, so the caller can
    /// fall back to another source. Tokens that sum to zero are an error.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Option<Self>, IntervalError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut total: Option<u64> = None;
        for token in tokens {
            let secs = parse_token(token.as_ref())?;
            let sum = total.unwrap_or(0).checked_add(secs);
            total = Some(sum.ok_or(IntervalError::Overflow)?);
        }
        match total {
            None => Ok(None),
            Some(0) => Err(IntervalError::Zero),
            Some(secs) => Ok(Some(Self(secs))),
        }
    }

    /// Parse a whitespace separated token list, e.g. `"1h 30m"`.
    pub fn parse_list(list: &str) -> Result<Option<Self>, IntervalError> {
        Self::from_tokens(list.split_whitespace())
    }

    /// Interpret the value of [`INTERVAL_ENV`].
    ///
    /// Absent, unparsable or zero values fall back to [`DEFAULT_INTERVAL`].
    pub fn from_env_value(value: Option<&str>) -> Self {
        value.and_then(Self::parse_secs).unwrap_or(DEFAULT_INTERVAL)
    }

    /// Read [`INTERVAL_ENV`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(INTERVAL_ENV).ok().as_deref())
    }

    fn parse_secs(value: &str) -> Option<Self> {
        value.trim().parse::<u64>().ok().and_then(Self::from_secs)
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.0 / 3600;
        let minutes = (self.0 % 3600) / 60;
        let seconds = self.0 % 60;

        let mut parts = Vec::with_capacity(3);
        if hours > 0 {
            parts.push(format!("{}h", hours));
        }
        if minutes > 0 {
            parts.push(format!("{}m", minutes));
        }
        if seconds > 0 {
            parts.push(format!("{}s", seconds));
        }
        write!(f, "{}", parts.join(" "))
    }
}
