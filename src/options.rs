use serde::{Deserialize, Serialize};

use crate::error::{Result, TimerError};
use crate::format::{validate_template, DEFAULT_SEPARATOR, DEFAULT_TEMPLATE};

/// Settings that change how a timer runs and renders
///
/// Every field is optional. Unset fields fall back to the defaults, and
/// [`merge`](Self::merge) layers one set of options over another, which is
/// how [`Timer::change_options`](crate::Timer::change_options) and the
/// registry defaults work.
///
/// In TOML:
///
/// ```toml
/// countdown = true
/// format_output = "HH:MM:SS"
/// separator = ":"
/// pad_raw = false
/// store = true
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimerOptions {
    /// Set to `false` to count up from a non-zero start time
    ///
    /// `true` only has an effect when the start time is above zero;
    /// a timer starting at zero is always a stopwatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown: Option<bool>,
    /// Template for formatted times, `MM:SS` by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_output: Option<String>,
    /// Separator for the default template, `:` by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    /// Whether the raw breakdown holds two-digit strings, `true` by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad_raw: Option<bool>,
    /// Whether the timer joins the registry that created it
    ///
    /// Falls back to the registry's own default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
}

impl TimerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countdown(mut self, countdown: bool) -> Self {
        self.countdown = Some(countdown);
        self
    }

    pub fn format_output(mut self, template: impl Into<String>) -> Self {
        self.format_output = Some(template.into());
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn pad_raw(mut self, pad_raw: bool) -> Self {
        self.pad_raw = Some(pad_raw);
        self
    }

    pub fn store(mut self, store: bool) -> Self {
        self.store = Some(store);
        self
    }

    /// Parse options from a TOML table
    pub fn from_toml(s: &str) -> Result<Self> {
        let options: Self = toml::from_str(s).map_err(|e| TimerError::InvalidOptionType {
            option: "options".to_string(),
            reason: e.message().to_string(),
        })?;

        options.validate()?;

        Ok(options)
    }

    /// Returns these options with every field set in `patch` replaced
    pub fn merge(&self, patch: &TimerOptions) -> TimerOptions {
        TimerOptions {
            countdown: patch.countdown.or(self.countdown),
            format_output: patch.format_output.clone().or_else(|| self.format_output.clone()),
            separator: patch.separator.clone().or_else(|| self.separator.clone()),
            pad_raw: patch.pad_raw.or(self.pad_raw),
            store: patch.store.or(self.store),
        }
    }

    /// Check that the template and separator are usable
    pub fn validate(&self) -> Result<()> {
        if let Some(template) = &self.format_output {
            validate_template(template)?;
        }

        if let Some("") = self.separator.as_deref() {
            return Err(TimerError::InvalidOptionType {
                option: "separator".to_string(),
                reason: "expected a non-empty string".to_string(),
            });
        }

        Ok(())
    }

    /// The template to render with
    pub fn template(&self) -> &str {
        self.format_output.as_deref().unwrap_or(DEFAULT_TEMPLATE)
    }

    /// The separator for the default template
    pub fn separator_or_default(&self) -> &str {
        self.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR)
    }

    pub fn pads_raw(&self) -> bool {
        self.pad_raw.unwrap_or(true)
    }
}
