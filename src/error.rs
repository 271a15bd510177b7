use thiserror::Error;

/// Failures that can cross the fetch boundary, either for a single calendar or
/// for a whole window.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("authorization rejected: {0}")]
    Unauthorized(String),
    #[error("server responded {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("no calendars matched the current filter")]
    NoCalendars,
    #[error("all {failed} calendars failed to load (last error: {last})")]
    Unavailable { failed: usize, last: Box<FetchError> },
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// A user-supplied filter that does not fit the account's calendars.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("no matching calendars found for: {}\nUse 'agenda-tui calendars' to see available calendars", .0.join(", "))]
    NoMatchingCalendars(Vec<String>),
}
