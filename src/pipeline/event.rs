use serde::Serialize;

/// Advisory progress notification.
///
/// Only the display text is guaranteed; consumers are free to reparse or
/// ignore it. Events are delivered in source-line order.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub label: String,
}

impl ProgressEvent {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// A diagnostic surfaced from an engine's error stream or from the
/// coordinator's failure boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub message: String,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
