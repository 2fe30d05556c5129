use shared::domain::{ChannelId, MessageId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("channel {0} is not stored")]
    ChannelMissing(ChannelId),
    #[error("message {0} is not stored")]
    MessageMissing(MessageId),
    #[error("message {message_id} is stored under {stored}, not {requested}")]
    ChannelMismatch {
        message_id: MessageId,
        stored: ChannelId,
        requested: ChannelId,
    },
    #[error("message {0} carries no channel reference")]
    MissingChannelReference(MessageId),
}
