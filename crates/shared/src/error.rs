use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("channel id '{0}' must have the form type:id")]
    MissingSeparator(String),
    #[error("channel id '{0}' has an empty type or id segment")]
    EmptySegment(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event is not a JSON object")]
    NotAnObject,
    #[error("event has no string `type` field")]
    MissingType,
    #[error("failed to decode `{event_type}` event: {source}")]
    Malformed {
        event_type: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
