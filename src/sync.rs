//! State synchronization
//!
//! Keeps a local copy of the plugin's full and volatile state trees in step
//! with the plugin and turns incoming diffs into targeted UI notifications.
//!
//! ```text
//!  connection task ──LinkEvent──▶ SyncActor ──UiEvent──▶ subscribers
//!        ▲                          │  ▲
//!        └──────── outbound text ───┘  └── SyncCommand ── SyncHandle (cloneable)
//! ```
//!
//! The actor owns the [`Synchronizer`] and serializes every inbound message,
//! timer and handle request, so readers never see a half-applied update.

mod actor;
mod applier;
mod handle;
mod synchronizer;


use std::sync::Arc;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::connection::ConnectionStatus;
use crate::state::NodeType;

pub use actor::{LinkEvent, SyncActor, SyncCommand};
pub use applier::apply_change;
pub use handle::SyncHandle;
pub use synchronizer::Synchronizer;

/// Notification sent to UI subscribers after the synchronized state changed
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// A `/full_state` replaced the whole tree
    FullStateReplaced,
    /// A `/volatile_state` replaced the volatile tree
    VolatileStateReplaced,
    /// Sounds or MIDI mappings were added; the sound list must be rebuilt
    SoundListChanged,
    /// Something shown on a sound card changed
    SoundCardChanged { sound_uuid: String },
    /// A slider parameter of a sound changed
    SoundParameterChanged {
        sound_uuid: String,
        parameter: String,
        value: String,
    },
    /// Global (preset / source state) parameters changed
    PresetParametersChanged,
    MidiMappingChanged { mapping_uuid: String },
    /// A node was detached from the tree
    ElementRemoved { uuid: String, node_type: NodeType },
    /// A sound was removed so 1-based display indexes shifted
    SoundNumbersChanged,
    /// A sound query finished with `count` results
    QueryResults { count: i64 },
    /// A new session started (e.g. reset playback indicators)
    SessionReset,
    ConnectionChanged(ConnectionStatus),
}

/// Callback invoked for every [`UiEvent`]
pub type UiCallback = Arc<dyn Fn(&UiEvent) + Send + Sync>;

/// Timing and consistency knobs of the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Cadence of `/get_state:volatile` requests while connected
    pub volatile_poll_interval: Duration,
    /// Quiet period after the last update before a full state is re-requested
    pub resync_debounce: Duration,
    /// Request a full state as soon as an update id gap is seen
    pub resync_on_update_gap: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            volatile_poll_interval: Duration::from_millis(100),
            resync_debounce: Duration::from_millis(1000),
            resync_on_update_gap: false,
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            volatile_poll_interval: Duration::from_millis(config.volatile_poll_interval_ms),
            resync_debounce: Duration::from_millis(config.resync_debounce_ms),
            resync_on_update_gap: config.resync_on_update_gap,
        }
    }
}
