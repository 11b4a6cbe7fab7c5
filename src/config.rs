//! Policy knobs for the reader, writer and validator.
//!
//! Every policy is explicit: nothing is inferred from the input. The
//! defaults favour the legacy numeric behaviour on input and the safe
//! (rejecting) behaviour on output.

use crate::reconcilement::Agency;
use serde::Deserialize;

/// What the reader does with a malformed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort the read on the first malformed record.
    #[default]
    FailFast,
    /// Log, buffer and continue past malformed records.
    SkipAndCollect,
}

/// Behaviour when a field's range lies outside the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractPolicy {
    /// Out-of-range fields decode as empty strings.
    Lenient,
    /// Out-of-range fields raise an [`ExtractionError`](crate::error::ExtractionError).
    #[default]
    Strict,
}

/// Behaviour for blank or unparsable numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericPolicy {
    /// Blank or unparsable content decodes as zero.
    #[default]
    Lenient,
    /// Blank or unparsable content is an error.
    Strict,
}

/// Behaviour when a value does not fit its field on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Reject the write and report every offending field.
    #[default]
    Error,
    /// Truncate, log a warning and keep the event for inspection.
    WarnAndTruncate,
    /// Truncate silently.
    Allow,
}

/// Stream reader configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub error_policy: ErrorPolicy,
    /// Upper bound on buffered errors in skip-and-collect mode.
    pub max_collected_errors: usize,
    pub extract_policy: ExtractPolicy,
    pub numeric_policy: NumericPolicy,
    /// Validate the file header as soon as it is decoded.
    pub validate_header: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            error_policy: ErrorPolicy::FailFast,
            max_collected_errors: 1000,
            extract_policy: ExtractPolicy::Strict,
            numeric_policy: NumericPolicy::Lenient,
            validate_header: true,
        }
    }
}

impl ReaderConfig {
    /// Skip-and-collect configuration with the given buffer cap.
    pub fn skip_and_collect(max_collected_errors: usize) -> Self {
        ReaderConfig {
            error_policy: ErrorPolicy::SkipAndCollect,
            max_collected_errors,
            ..ReaderConfig::default()
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub truncation: TruncationPolicy,
}

/// Validator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Agency whose reconcilement layout is checked on every payment.
    pub agency: Option<Agency>,
}
