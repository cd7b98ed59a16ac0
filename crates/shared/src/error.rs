use thiserror::Error;

use crate::protocol::Reply;

/// Request contract violations the dispatcher recovers locally. Each variant
/// carries the exact message its Error reply puts on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Unable to convert message to dict")]
    MalformedMessage,
    #[error("No 'cmd' key given")]
    MissingCommand,
    #[error("Key 'cmd' is not a string")]
    InvalidCommandType,
    #[error("Key 'opts' not a dict")]
    InvalidOptionsType,
    #[error("Unknown cmd: {0}")]
    UnknownCommand(String),
}

impl From<DispatchError> for Reply {
    fn from(err: DispatchError) -> Self {
        Reply::error(err.to_string())
    }
}
