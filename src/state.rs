//! Plugin state documents
//!
//! The plugin's persistent configuration and its live performance data are
//! both exchanged as XML trees. This module owns the tree model, parsing and
//! the typed read accessors used by the UI layer.

mod queries;
mod tree;
mod types;
mod volatile;
mod xml;

use thiserror::Error;

pub use queries::{midi_mappings, samples};
pub use tree::{Descendants, Document, Node};
pub use types::{
    is_sound_parameter, midi_controllable_parameters, sound_parameter, NodeType, ParameterKind,
    SoundParameter, ATTR_CURRENT_PRESET_INDEX, ATTR_NUM_RESULTS_LAST_QUERY,
    ATTR_TMP_FILES_LOCATION, ATTR_UUID, ATTR_WILL_BE_DELETED, SOUND_PARAMETERS,
};
pub use volatile::VolatileSnapshot;

/// Errors raised while parsing a serialized tree
#[derive(Debug, Error)]
pub enum TreeError {
    /// Malformed XML
    #[error("XML error at position {position}: {message}")]
    Xml { position: u64, message: String },

    /// The payload contains no element
    #[error("document has no root element")]
    Empty,

    /// Closing tag without a matching opening tag
    #[error("unexpected closing tag </{0}>")]
    UnbalancedClose(String),

    /// Input ended inside an element
    #[error("unclosed element <{0}>")]
    Unclosed(String),
}
