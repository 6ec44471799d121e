use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, TimerError};

/// Largest accepted start time, 999:59:59
pub const MAX_SECONDS: u32 = 3_599_999;

static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?((\d+\.?\d*|\.\d+)([eE][+-]?\d+)?|Infinity)$").expect("numeric pattern is valid")
});

static COLON_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d*(:\d*)+$").expect("colon time pattern is valid"));

const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A time specification, before validation
///
/// Anything that converts into a `TimeSpec` can be handed to
/// [`Timer::new`](crate::Timer::new) or
/// [`Timer::set_start_time`](crate::Timer::set_start_time).
///
/// ```
/// use tickr::TimeSpec;
///
/// assert_eq!(TimeSpec::from(600), TimeSpec::Seconds(600.0));
/// assert_eq!(TimeSpec::from("10:00"), TimeSpec::Text("10:00".to_string()));
/// assert_eq!(TimeSpec::from(None::<u32>), TimeSpec::Unset);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "toml::Value")]
pub enum TimeSpec {
    /// No time given, which starts a stopwatch at zero
    #[default]
    Unset,
    /// A count of seconds, rounded to the nearest whole second
    Seconds(f64),
    /// `SS`, `MM:SS`, `HH:MM:SS`, a numeric string, or a local date-time
    Text(String),
    /// An absolute point in time to count down to
    Deadline(DateTime<Local>),
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Unset => write!(f, "none"),
            TimeSpec::Seconds(secs) => write!(f, "{}", secs),
            TimeSpec::Text(text) => write!(f, "{}", text),
            TimeSpec::Deadline(deadline) => write!(f, "{}", deadline.to_rfc3339()),
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for TimeSpec {
                fn from(value: $ty) -> Self {
                    TimeSpec::Seconds(value as f64)
                }
            }
        )*
    };
}

impl_from_number!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl From<&str> for TimeSpec {
    fn from(value: &str) -> Self {
        TimeSpec::Text(value.to_string())
    }
}

impl From<String> for TimeSpec {
    fn from(value: String) -> Self {
        TimeSpec::Text(value)
    }
}

impl From<DateTime<Local>> for TimeSpec {
    fn from(value: DateTime<Local>) -> Self {
        TimeSpec::Deadline(value)
    }
}

impl<T: Into<TimeSpec>> From<Option<T>> for TimeSpec {
    fn from(value: Option<T>) -> Self {
        value.map_or(TimeSpec::Unset, Into::into)
    }
}

impl TryFrom<toml::Value> for TimeSpec {
    type Error = TimerError;

    fn try_from(value: toml::Value) -> Result<Self> {
        match value {
            toml::Value::Integer(secs) => Ok(TimeSpec::Seconds(secs as f64)),
            toml::Value::Float(secs) => Ok(TimeSpec::Seconds(secs)),
            toml::Value::String(text) => Ok(TimeSpec::Text(text)),
            toml::Value::Datetime(dt) => Ok(TimeSpec::Text(dt.to_string())),
            other => Err(TimerError::InvalidTimeType(other.type_str().to_string())),
        }
    }
}

/// A validated time specification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedTime {
    /// Whole seconds, never more than [`MAX_SECONDS`]
    pub seconds: u32,
    /// Set when the time was given as an absolute point in time
    pub deadline: Option<DateTime<Local>>,
}

impl ParsedTime {
    fn duration(seconds: u32) -> Self {
        Self {
            seconds,
            deadline: None,
        }
    }
}

/// Validate a time specification and reduce it to whole seconds
///
/// `now` is only consulted for deadlines, which resolve to the number of
/// seconds left until that point, rounded up.
pub fn parse_time(spec: &TimeSpec, now: DateTime<Local>) -> Result<ParsedTime> {
    match spec {
        TimeSpec::Unset => Ok(ParsedTime::duration(0)),
        TimeSpec::Seconds(secs) => {
            if secs.is_nan() {
                return Err(TimerError::InvalidTimeType("NaN".to_string()));
            }

            seconds_from_number(*secs, &spec.to_string()).map(ParsedTime::duration)
        }
        TimeSpec::Text(text) => parse_text(text.trim(), now),
        TimeSpec::Deadline(deadline) => resolve_deadline(*deadline, now),
    }
}

fn parse_text(text: &str, now: DateTime<Local>) -> Result<ParsedTime> {
    if text.is_empty() {
        return Ok(ParsedTime::duration(0));
    }

    if NUMERIC.is_match(text) {
        let secs: f64 = text
            .parse()
            .map_err(|_| TimerError::InvalidTimeFormat(text.to_string()))?;

        return seconds_from_number(secs, text).map(ParsedTime::duration);
    }

    if COLON_TIME.is_match(text) {
        if is_incorrect_format(text) {
            return Err(TimerError::InvalidTimeFormat(text.to_string()));
        }

        let secs = time_to_seconds(text)
            .ok_or_else(|| TimerError::InvalidTimeFormat(text.to_string()))?;

        if secs > MAX_SECONDS {
            return Err(TimerError::TimeExceedsMaximum(text.to_string()));
        }

        return Ok(ParsedTime::duration(secs));
    }

    match parse_datetime(text) {
        Some(deadline) => resolve_deadline(deadline, now),
        None => Err(TimerError::InvalidTimeFormat(text.to_string())),
    }
}

fn seconds_from_number(secs: f64, original: &str) -> Result<u32> {
    if secs < 0.0 {
        return Err(TimerError::NegativeTime(original.to_string()));
    }

    let rounded = secs.round();

    if rounded > MAX_SECONDS as f64 {
        return Err(TimerError::TimeExceedsMaximum(original.to_string()));
    }

    Ok(rounded as u32)
}

fn parse_datetime(text: &str) -> Option<DateTime<Local>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local));
    }

    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

fn resolve_deadline(deadline: DateTime<Local>, now: DateTime<Local>) -> Result<ParsedTime> {
    let remaining = seconds_until(deadline, now);
    let original = deadline.to_rfc3339();

    if remaining < 1 {
        return Err(TimerError::NegativeTime(original));
    }

    if remaining > MAX_SECONDS as i64 {
        return Err(TimerError::TimeExceedsMaximum(original));
    }

    Ok(ParsedTime {
        seconds: remaining as u32,
        deadline: Some(deadline),
    })
}

/// Whole seconds from `now` until `deadline`, rounded up
pub fn seconds_until(deadline: DateTime<Local>, now: DateTime<Local>) -> i64 {
    let millis = (deadline - now).num_milliseconds();

    millis.div_euclid(1000) + i64::from(millis.rem_euclid(1000) > 0)
}

/// Check a colon-separated time (`SS`, `MM:SS` or `HH:MM:SS`) for mistakes
///
/// Hours may go up to 999, minutes and seconds up to 59. Plain numeric
/// strings are handled before this check, so a lone field is also held to 59.
pub fn is_incorrect_format(time: &str) -> bool {
    let fields: Vec<&str> = time.split(':').collect();

    fields.len() > 3
        || fields.iter().enumerate().any(|(i, field)| {
            let limit = if fields.len() == 3 && i == 0 { 999 } else { 59 };

            field.is_empty()
                || !field.bytes().all(|b| b.is_ascii_digit())
                || field.parse::<u32>().map_or(true, |value| value > limit)
        })
}

/// Convert a colon-separated time into seconds
///
/// Returns `None` if any field is not a number.
pub fn time_to_seconds(time: &str) -> Option<u32> {
    let fields = time
        .split(':')
        .map(|field| field.parse::<u32>().ok())
        .collect::<Option<Vec<u32>>>()?;

    let total = match fields.as_slice() {
        [hours, minutes, seconds] => {
            u64::from(*hours) * 3600 + u64::from(*minutes) * 60 + u64::from(*seconds)
        }
        [minutes, seconds] => u64::from(*minutes) * 60 + u64::from(*seconds),
        [seconds] => u64::from(*seconds),
        _ => return None,
    };

    u32::try_from(total).ok()
}
