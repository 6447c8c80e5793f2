//! Wire protocol spoken with the sampler plugin
//!
//! Text frames over a WebSocket. Inbound frames carry state snapshots and
//! incremental updates; outbound frames are fire-and-forget commands.

pub mod inbound;
pub mod outbound;

use thiserror::Error;

pub use inbound::{decode, split_message, InboundMessage, StateUpdate, TreeChange};
pub use outbound::{
    CcMapping, NoteLayout, PluginCommand, ReverbParameters, SoundQuery, StateKind,
    DEFAULT_NOTE_VELOCITY,
};

/// Errors raised while decoding an inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("message has no type separator ':'")]
    MissingSeparator,

    #[error("unknown message type '{0}'")]
    UnknownMessageType(String),

    #[error("unknown update type '{0}'")]
    UnknownUpdateType(String),

    #[error("missing field '{field}' in {context}")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },

    #[error("invalid number '{value}' for {field}")]
    InvalidNumber { field: &'static str, value: String },
}
