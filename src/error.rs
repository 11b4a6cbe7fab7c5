//! Error types for reading, writing and validating payment files.

use std::fmt;
use thiserror::Error;

/// Result type alias for codec and validator operations
pub type Result<T> = std::result::Result<T, SprError>;

/// Errors that can occur while processing a payment file.
#[derive(Error, Debug)]
pub enum SprError {
    /// Failed to read from or write to the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV report rendering error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A physical record is not exactly the fixed record length
    #[error("record length is {actual}, expected {expected}")]
    RecordLength { expected: usize, actual: usize },

    /// The two-character tag at the start of a record is not a known record kind
    #[error("unknown record tag {tag:?}")]
    UnknownTag { tag: String },

    /// A record appeared where the file grammar does not allow it
    #[error("unexpected {tag:?} record: {message}")]
    UnexpectedRecord { tag: String, message: String },

    /// A mandatory record never appeared
    #[error("missing {0}")]
    MissingRecord(&'static str),

    /// A field's byte range lies outside the line (strict extraction)
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A numeric field could not be parsed (strict numeric policy)
    #[error("field {field}: {value:?} is not a valid number")]
    InvalidNumber { field: &'static str, value: String },

    /// One or more fields could not be rendered into their fixed width
    #[error(transparent)]
    Format(#[from] FormatErrors),

    /// A business or structural rule was violated
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Declared trailer totals disagree with the records they summarize
    #[error(transparent)]
    Balancing(#[from] BalancingError),

    /// Any of the above, located at a physical line of the input
    #[error("line {line}: {source}")]
    AtLine {
        line: usize,
        #[source]
        source: Box<SprError>,
    },

    /// Bad command-line invocation
    #[error("{0}")]
    Usage(String),
}

impl SprError {
    /// Wraps this error with the line number it was found on.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            SprError::AtLine { .. } => self,
            other => SprError::AtLine {
                line,
                source: Box::new(other),
            },
        }
    }

    /// Line number context, if the error was raised while reading a stream.
    pub fn line(&self) -> Option<usize> {
        match self {
            SprError::AtLine { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The error with any line context stripped.
    pub fn inner(&self) -> &SprError {
        match self {
            SprError::AtLine { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Rule name of a validation failure (`"balancing"` for balancing errors).
    pub fn rule(&self) -> Option<&str> {
        match self.inner() {
            SprError::Validation(v) => Some(v.rule),
            SprError::Balancing(_) => Some("balancing"),
            _ => None,
        }
    }
}

/// A field's declared byte range does not fit inside the line it is read from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field {field} at {start}-{end} exceeds line length {line_length}")]
pub struct ExtractionError {
    pub field: &'static str,
    pub start: usize,
    pub end: usize,
    pub line_length: usize,
}

/// What went wrong while rendering one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    /// Text longer than the field width.
    Truncated,
    /// More digits than the field width.
    Overflow,
    /// Characters outside ASCII cannot be placed at fixed byte offsets.
    NonAscii,
    /// Numeric fields carry no sign.
    Negative,
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemKind::Truncated => write!(f, "value too long"),
            ProblemKind::Overflow => write!(f, "numeric overflow"),
            ProblemKind::NonAscii => write!(f, "non-ASCII characters"),
            ProblemKind::Negative => write!(f, "negative value"),
        }
    }
}

/// A single field-level formatting problem found by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    /// Record tag being rendered, e.g. `"02"`.
    pub record: &'static str,
    /// Zero-based index of the record within the output.
    pub record_index: usize,
    pub field: &'static str,
    pub value: String,
    pub width: usize,
    pub kind: ProblemKind,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} ({:?}) field {}: {} ({} chars into width {})",
            self.record_index,
            self.record,
            self.field,
            self.kind,
            self.value.chars().count(),
            self.width
        )
    }
}

/// Every formatting problem collected during one write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct FormatErrors {
    pub problems: Vec<FieldProblem>,
}

impl fmt::Display for FormatErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field formatting problem(s)", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "; {}", problem)?;
        }
        Ok(())
    }
}

/// A violated structural or business rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} = {value:?} violates {rule}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub rule: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        rule: &'static str,
        message: impl Into<String>,
    ) -> Self {
        ValidationError {
            field: field.into(),
            value: value.into(),
            rule,
            message: message.into(),
        }
    }
}

/// Declared trailer value versus the value recomputed from constituent records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{scope}: {field} is {actual}, records add up to {expected}")]
pub struct BalancingError {
    /// `"file"` or `"schedule <number>"`.
    pub scope: String,
    /// Trailer field name, e.g. `FileTrailer.TotalCountPayments`.
    pub field: &'static str,
    pub expected: i64,
    pub actual: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_line_does_not_double_wrap() {
        let err = SprError::MissingRecord("file trailer").at_line(3).at_line(9);
        assert_eq!(err.line(), Some(3));
        assert!(matches!(err.inner(), SprError::MissingRecord(_)));
    }

    #[test]
    fn test_rule_sees_through_line_context() {
        let err = SprError::from(ValidationError::new("X", "1", "sda_max_amount", "too big"))
            .at_line(4);
        assert_eq!(err.rule(), Some("sda_max_amount"));
        assert!(err.to_string().starts_with("line 4: X"));
    }

    #[test]
    fn test_format_errors_lists_every_problem() {
        let problem = |field| FieldProblem {
            record: "02",
            record_index: 2,
            field,
            value: "x".repeat(40),
            width: 35,
            kind: ProblemKind::Truncated,
        };
        let err = FormatErrors {
            problems: vec![problem("PayeeName"), problem("CityName")],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 field formatting problem(s)"));
        assert!(text.contains("PayeeName"));
        assert!(text.contains("CityName"));
    }
}
