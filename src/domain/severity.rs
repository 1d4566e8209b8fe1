/// Output channel of a log entry.
///
/// The pipeline only distinguishes two channels: errors, which may also be
/// shipped to the remote aggregation service, and everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Debug,
}

impl From<&tracing::Level> for Severity {
    fn from(level: &tracing::Level) -> Self {
        if *level == tracing::Level::ERROR {
            Severity::Error
        } else {
            Severity::Debug
        }
    }
}
