//! Turn whole seconds into display strings

use std::{fmt, ops::Range, sync::LazyLock};

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{Result, TimerError};

/// The template used when none is configured
///
/// This layout is a minimum: once an hour has passed it grows to `HH:MM:SS`.
pub const DEFAULT_TEMPLATE: &str = "MM:SS";

/// The separator used by the default template
pub const DEFAULT_SEPARATOR: &str = ":";

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+").expect("word pattern is valid"));

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "dd" => Some(TimeUnit::Days),
            "hh" => Some(TimeUnit::Hours),
            "mm" => Some(TimeUnit::Minutes),
            "ss" => Some(TimeUnit::Seconds),
            _ => None,
        }
    }

    fn total(self, seconds: u32) -> u64 {
        let seconds = u64::from(seconds);

        match self {
            TimeUnit::Days => seconds / 86_400,
            TimeUnit::Hours => seconds / 3600,
            TimeUnit::Minutes => seconds / 60,
            TimeUnit::Seconds => seconds,
        }
    }

    fn current(self, seconds: u32) -> u64 {
        let seconds = u64::from(seconds);

        match self {
            TimeUnit::Days => seconds / 86_400,
            TimeUnit::Hours => seconds % 86_400 / 3600,
            TimeUnit::Minutes => seconds % 3600 / 60,
            TimeUnit::Seconds => seconds % 60,
        }
    }
}

/// One number in a [`Raw`] breakdown
///
/// Padded units display and serialize as two-digit strings (`"05"`),
/// unpadded ones as plain numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Unit {
    value: u64,
    padded: bool,
}

impl Unit {
    fn new(value: u64, padded: bool) -> Self {
        Self { value, padded }
    }

    /// The numeric value
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_padded(&self) -> bool {
        self.padded
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.padded {
            write!(f, "{:02}", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

impl Serialize for Unit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.padded {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_u64(self.value)
        }
    }
}

/// Every way of slicing a number of seconds
///
/// The `total_*` fields count whole units in the entire duration
/// (600 seconds is 10 total minutes), while the `current_*` fields are the
/// usual days/hours/minutes/seconds decomposition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Raw {
    pub total_days: Unit,
    pub total_hours: Unit,
    pub total_minutes: Unit,
    pub total_seconds: Unit,
    pub current_days: Unit,
    pub current_hours: Unit,
    pub current_minutes: Unit,
    pub current_seconds: Unit,
}

impl Raw {
    pub fn new(seconds: u32, padded: bool) -> Self {
        let total = |unit: TimeUnit| Unit::new(unit.total(seconds), padded);
        let current = |unit: TimeUnit| Unit::new(unit.current(seconds), padded);

        Self {
            total_days: total(TimeUnit::Days),
            total_hours: total(TimeUnit::Hours),
            total_minutes: total(TimeUnit::Minutes),
            total_seconds: total(TimeUnit::Seconds),
            current_days: current(TimeUnit::Days),
            current_hours: current(TimeUnit::Hours),
            current_minutes: current(TimeUnit::Minutes),
            current_seconds: current(TimeUnit::Seconds),
        }
    }
}

/// A rendered time along with its breakdown
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormattedTime {
    pub formatted_time: String,
    pub raw: Raw,
}

/// Render `seconds` according to `template`
///
/// The default `MM:SS` layout (in any case) is joined with `separator` and
/// grows to `HH:MM:SS` past the hour. Any other template has each `dd`, `hh`,
/// `mm` and `ss` token replaced: the largest unit present carries the total
/// for that unit and the rest carry what is left over. Text around the
/// tokens is kept as-is, so a template without tokens comes back unchanged.
/// Tokens only count as whole words or runs of tokens (`HHMMSS`), so the
/// `ss` in `Class` stays put.
///
/// ```
/// use tickr::format_time;
///
/// assert_eq!(format_time(600, "MM:SS", ":", true).formatted_time, "10:00");
/// assert_eq!(format_time(9600, "MM:SS", ":", true).formatted_time, "02:40:00");
/// assert_eq!(format_time(600, "00:mm:ss", ":", true).formatted_time, "00:10:00");
/// ```
pub fn format_time(seconds: u32, template: &str, separator: &str, pad_raw: bool) -> FormattedTime {
    let formatted_time = if template.eq_ignore_ascii_case(DEFAULT_TEMPLATE) {
        to_kitchen(seconds, separator)
    } else {
        substitute(seconds, template)
    };

    FormattedTime {
        formatted_time,
        raw: Raw::new(seconds, pad_raw),
    }
}

/// Formats seconds as a "kitchen timer" string, e.g. mm:ss.
///
/// If the time is an hour or longer, it is formatted as hh:mm:ss.
fn to_kitchen(seconds: u32, separator: &str) -> String {
    let hours = TimeUnit::Hours.total(seconds);
    let minutes = TimeUnit::Minutes.current(seconds);
    let seconds = TimeUnit::Seconds.current(seconds);

    if hours > 0 {
        format!("{hours:02}{separator}{minutes:02}{separator}{seconds:02}")
    } else {
        format!("{minutes:02}{separator}{seconds:02}")
    }
}

/// Find the unit tokens in a template
///
/// A run of letters only counts when it is made up entirely of tokens, so
/// `HHMMSS` holds three units while `Class` is plain text.
fn tokens(template: &str) -> Vec<(Range<usize>, TimeUnit)> {
    WORD.find_iter(template)
        .filter(|word| word.len() % 2 == 0)
        .filter_map(|word| {
            (word.start()..word.end())
                .step_by(2)
                .map(|start| {
                    TimeUnit::from_token(&template[start..start + 2]).map(|unit| (start..start + 2, unit))
                })
                .collect::<Option<Vec<_>>>()
        })
        .flatten()
        .collect()
}

fn substitute(seconds: u32, template: &str) -> String {
    let tokens = tokens(template);
    let Some(largest) = tokens.iter().map(|(_, unit)| *unit).max() else {
        return template.to_string();
    };

    let mut formatted = String::with_capacity(template.len());
    let mut last = 0;

    for (range, unit) in tokens {
        let value = if unit == largest {
            unit.total(seconds)
        } else {
            unit.current(seconds)
        };

        formatted.push_str(&template[last..range.start]);
        formatted.push_str(&format!("{value:02}"));
        last = range.end;
    }

    formatted.push_str(&template[last..]);

    formatted
}

/// Check that a template can be rendered
///
/// Each unit may appear at most once, largest first. Templates without any
/// units are allowed and render as literal text.
pub fn validate_template(template: &str) -> Result<()> {
    if template.is_empty() {
        return Err(TimerError::InvalidOutputFormat {
            format: template.to_string(),
            reason: "template is empty".to_string(),
        });
    }

    let units: Vec<TimeUnit> = tokens(template).into_iter().map(|(_, unit)| unit).collect();

    if units.windows(2).any(|pair| pair[0] <= pair[1]) {
        return Err(TimerError::InvalidOutputFormat {
            format: template.to_string(),
            reason: "expected each of DD, HH, MM, SS at most once, largest first".to_string(),
        });
    }

    Ok(())
}

/// Pads out single digit numbers in a string with a leading zero
///
/// ```
/// assert_eq!(tickr::zero_pad("1:5:30"), "01:05:30");
/// ```
pub fn zero_pad(text: &str) -> String {
    DIGITS
        .replace_all(text, |caps: &regex::Captures| {
            if caps[0].len() == 1 {
                format!("0{}", &caps[0])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}
