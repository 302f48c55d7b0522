use thiserror::Error;

/// Which timestamp of an event failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampField {
    Start,
    End,
}

impl std::fmt::Display for TimestampField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimestampField::Start => f.write_str("start_date"),
            TimestampField::End => f.write_str("end_date"),
        }
    }
}

/// A timestamp that does not match any accepted layout.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {field} '{value}': {reason}")]
pub struct ParseError {
    pub field: TimestampField,
    pub value: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(field: TimestampField, value: &str, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Raised for the first unparseable event under the strict policy.
    #[error("event #{index}: {source}")]
    Parse {
        index: usize,
        #[source]
        source: ParseError,
    },
}

pub type ResolveResult<T> = Result<T, ResolveError>;
