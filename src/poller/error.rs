use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Fetch failed for source {source_id}: {cause}")]
    FetchFailed { source_id: String, cause: String },

    #[error("Normalize failed for source {source_id}: {message}")]
    NormalizeFailed { source_id: String, message: String },

    #[error("Invalid interval for source {0}: interval must be greater than zero")]
    InvalidInterval(String),

    #[error("Source already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Poll task for source {source_id} ended abnormally: {message}")]
    TaskAborted { source_id: String, message: String },
}

pub type PollResult<T> = Result<T, PollError>;

/// Renders an error together with its `source()` chain on one line.
pub(crate) fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

/// Extracts the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_includes_sources() {
        let err = Outer(std::io::Error::other("connection reset"));
        assert_eq!(error_chain(&err), "outer: connection reset");
    }

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
