//! SyncHandle - public API of the synchronizer
//!
//! Mutations are fire-and-forget: they enqueue an outbound command and
//! return immediately. Reads run inside the actor and answer through a
//! oneshot channel, so they always see a fully applied state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::actor::{query, LinkEvent, SyncActor, SyncCommand};
use super::{SyncSettings, Synchronizer, UiCallback, UiEvent};
use crate::connection::{self, ConnectionStatus, Endpoint};
use crate::protocol::{
    CcMapping, NoteLayout, PluginCommand, ReverbParameters, SoundQuery, StateKind,
    DEFAULT_NOTE_VELOCITY,
};
use crate::state::{samples, Node, VolatileSnapshot};

/// Cloneable handle to a running synchronizer
///
/// # Fire-and-forget
/// - `send` and every typed mutation (`play_sound`, `set_sound_parameter`, ...)
/// - intents resolved against the current state (`replace_sound_at`,
///   `next_preset`, `previous_preset`, `set_sound_root_note`)
///
/// # Queries (async)
/// - `read` for arbitrary reads, plus typed helpers (`sounds`, `sound`, ...)
#[derive(Clone)]
pub struct SyncHandle {
    cmd_tx: mpsc::UnboundedSender<SyncCommand>,
    status: Arc<RwLock<ConnectionStatus>>,
}

impl SyncHandle {
    pub(super) fn new(
        cmd_tx: mpsc::UnboundedSender<SyncCommand>,
        status: Arc<RwLock<ConnectionStatus>>,
    ) -> Self {
        Self { cmd_tx, status }
    }

    /// Start the connection task and the synchronizer actor
    pub fn connect(endpoint: Endpoint, reconnect_delay: Duration, settings: SyncSettings) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel::<LinkEvent>();
        tokio::spawn(connection::run(endpoint, reconnect_delay, link_tx));
        SyncActor::spawn(settings, link_rx)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Current connection status (non-blocking)
    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Register a notification callback. It runs on the actor task and must not block.
    pub fn subscribe(&self, callback: UiCallback) {
        let _ = self.cmd_tx.send(SyncCommand::Subscribe(callback));
    }

    /// Notifications as a channel, for consumers living in their own task
    pub fn events(&self) -> mpsc::UnboundedReceiver<UiEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(Arc::new(move |event: &UiEvent| {
            let _ = tx.send(event.clone());
        }));
        rx
    }

    /// Stop the actor and, through it, the connection task
    pub fn shutdown(&self) {
        debug!("SyncHandle shutdown requested");
        let _ = self.cmd_tx.send(SyncCommand::Shutdown);
    }

    /// Whether the actor is still running
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Run `f` against the synchronizer and return its result.
    ///
    /// `None` when the actor has stopped.
    pub async fn read<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&Synchronizer) -> R + Send + 'static,
    {
        let (job, response) = query(f);
        self.cmd_tx.send(SyncCommand::Run(job)).ok()?;
        response.await.ok()
    }

    /// Whether a full state has been received
    pub async fn has_state(&self) -> bool {
        self.read(|s| s.state().is_some()).await.unwrap_or(false)
    }

    /// All sounds in display order
    pub async fn sounds(&self) -> Vec<Node> {
        self.read(|s| {
            s.state()
                .map(|doc| doc.sounds().cloned().collect())
                .unwrap_or_default()
        })
        .await
        .unwrap_or_default()
    }

    pub async fn sound(&self, sound_uuid: &str) -> Option<Node> {
        let uuid = sound_uuid.to_string();
        self.read(move |s| s.state().and_then(|doc| doc.sound(&uuid)).cloned())
            .await
            .flatten()
    }

    /// Sound owning the sample with the given uuid
    pub async fn sound_for_sample(&self, sample_uuid: &str) -> Option<Node> {
        let uuid = sample_uuid.to_string();
        self.read(move |s| {
            s.state()
                .and_then(|doc| doc.sound_for_sample(&uuid))
                .cloned()
        })
        .await
        .flatten()
    }

    /// 1-based display index of a sound
    pub async fn sound_index(&self, sound_uuid: &str) -> Option<usize> {
        let uuid = sound_uuid.to_string();
        self.read(move |s| s.state().and_then(|doc| doc.sound_index(&uuid)))
            .await
            .flatten()
    }

    /// 1-based display index of the sound owning a sample
    pub async fn sound_index_for_sample(&self, sample_uuid: &str) -> Option<usize> {
        let uuid = sample_uuid.to_string();
        self.read(move |s| s.state().and_then(|doc| doc.sound_index_for_sample(&uuid)))
            .await
            .flatten()
    }

    pub async fn midi_mapping(&self, mapping_uuid: &str) -> Option<Node> {
        let uuid = mapping_uuid.to_string();
        self.read(move |s| s.state().and_then(|doc| doc.midi_mapping(&uuid)).cloned())
            .await
            .flatten()
    }

    pub async fn tmp_files_location(&self) -> Option<String> {
        self.read(|s| {
            s.state()
                .and_then(|doc| doc.tmp_files_location())
                .map(str::to_string)
        })
        .await
        .flatten()
    }

    pub async fn volatile_snapshot(&self) -> Option<VolatileSnapshot> {
        self.read(Synchronizer::volatile_snapshot).await.flatten()
    }

    /// Full state serialized back to XML
    pub async fn state_xml(&self) -> Option<String> {
        self.read(|s| s.state().and_then(|doc| doc.root().to_xml().ok()))
            .await
            .flatten()
    }

    // =========================================================================
    // Mutations (fire-and-forget)
    // =========================================================================

    /// Enqueue a command for the plugin
    pub fn send(&self, command: PluginCommand) {
        let _ = self.cmd_tx.send(SyncCommand::Send(command));
    }

    /// Run a closure with exclusive access to the synchronizer, without waiting
    pub fn run<F>(&self, f: F)
    where
        F: FnOnce(&mut Synchronizer) + Send + 'static,
    {
        let _ = self.cmd_tx.send(SyncCommand::Run(Box::new(f)));
    }

    pub fn request_full_state(&self) {
        self.send(PluginCommand::GetState(StateKind::Full));
    }

    pub fn request_volatile_state(&self) {
        self.send(PluginCommand::GetState(StateKind::Volatile));
    }

    /// Set a float parameter; an empty `sound_uuid` targets every sound
    pub fn set_sound_parameter(&self, sound_uuid: &str, parameter: &str, value: f32) {
        self.send(PluginCommand::SetSoundParameter {
            sound_uuid: sound_uuid.to_string(),
            parameter: parameter.to_string(),
            value,
        });
    }

    pub fn set_sound_parameter_int(&self, sound_uuid: &str, parameter: &str, value: i32) {
        self.send(PluginCommand::SetSoundParameterInt {
            sound_uuid: sound_uuid.to_string(),
            parameter: parameter.to_string(),
            value,
        });
    }

    pub fn add_sounds_from_query(&self, query: SoundQuery) {
        self.send(PluginCommand::AddSoundsFromQuery(query));
    }

    pub fn replace_sounds_from_query(&self, query: SoundQuery) {
        self.send(PluginCommand::ReplaceSoundsFromQuery(query));
    }

    pub fn replace_sound_from_query(&self, sound_uuid: &str, query: SoundQuery) {
        self.send(PluginCommand::ReplaceSoundFromQuery {
            sound_uuid: sound_uuid.to_string(),
            query,
        });
    }

    pub fn reapply_layout(&self, layout: NoteLayout) {
        self.send(PluginCommand::ReapplyLayout(layout));
    }

    pub fn clear_all_sounds(&self) {
        self.send(PluginCommand::ClearAllSounds);
    }

    pub fn set_midi_in_channel(&self, channel: u8) {
        self.send(PluginCommand::SetMidiInChannel(channel));
    }

    pub fn set_reverb_parameters(&self, parameters: ReverbParameters) {
        self.send(PluginCommand::SetReverbParameters(parameters));
    }

    pub fn set_polyphony(&self, voices: u32) {
        self.send(PluginCommand::SetPolyphony(voices));
    }

    pub fn play_sound(&self, sound_uuid: &str) {
        self.send(PluginCommand::PlaySound(sound_uuid.to_string()));
    }

    pub fn stop_sound(&self, sound_uuid: &str) {
        self.send(PluginCommand::StopSound(sound_uuid.to_string()));
    }

    pub fn remove_sound(&self, sound_uuid: &str) {
        self.send(PluginCommand::RemoveSound(sound_uuid.to_string()));
    }

    pub fn save_preset(&self, name: &str, index: u32) {
        self.send(PluginCommand::SavePreset {
            name: name.to_string(),
            index,
        });
    }

    pub fn load_preset(&self, index: u32) {
        self.send(PluginCommand::LoadPreset(index));
    }

    /// Note on with the default velocity on the plugin's global channel
    pub fn note_on(&self, note: u8) {
        self.send(PluginCommand::NoteOn {
            note,
            velocity: DEFAULT_NOTE_VELOCITY,
            channel: 0,
        });
    }

    pub fn note_off(&self, note: u8) {
        self.send(PluginCommand::NoteOff {
            note,
            velocity: DEFAULT_NOTE_VELOCITY,
            channel: 0,
        });
    }

    pub fn set_sampler_sound_root_note(&self, sound_uuid: &str, sample_uuid: &str, root_note: u8) {
        self.send(PluginCommand::SetSamplerSoundRootNote {
            sound_uuid: sound_uuid.to_string(),
            sample_uuid: sample_uuid.to_string(),
            root_note,
        });
    }

    pub fn add_or_update_cc_mapping(&self, mapping: CcMapping) {
        self.send(PluginCommand::AddOrUpdateCcMapping(mapping));
    }

    pub fn remove_cc_mapping(&self, sound_uuid: &str, mapping_uuid: &str) {
        self.send(PluginCommand::RemoveCcMapping {
            sound_uuid: sound_uuid.to_string(),
            mapping_uuid: mapping_uuid.to_string(),
        });
    }

    // =========================================================================
    // Intents resolved against the current state
    // =========================================================================

    /// Replace the sound shown at a 1-based display index
    pub fn replace_sound_at(&self, index: usize, query: SoundQuery) {
        self.run(move |core| {
            let sound_uuid = core
                .state()
                .and_then(|doc| doc.sound_uuid_at(index))
                .map(str::to_string);
            match sound_uuid {
                Some(sound_uuid) => {
                    core.send(&PluginCommand::ReplaceSoundFromQuery { sound_uuid, query });
                },
                None => warn!(index, "No sound at index, replace skipped"),
            }
        });
    }

    /// Load the preset after the current one (the first one when none is loaded)
    pub fn next_preset(&self) {
        self.run(|core| {
            let next = core
                .state()
                .and_then(|doc| doc.current_preset_index())
                .map_or(0, |current| current.saturating_add(1));
            core.send(&PluginCommand::LoadPreset(next));
        });
    }

    /// Load the preset before the current one, never going below 0
    pub fn previous_preset(&self) {
        self.run(|core| {
            let previous = core
                .state()
                .and_then(|doc| doc.current_preset_index())
                .map_or(0, |current| current.max(1) - 1);
            core.send(&PluginCommand::LoadPreset(previous));
        });
    }

    /// Set the root note of a sound's first sample
    pub fn set_sound_root_note(&self, sound_uuid: &str, root_note: u8) {
        let sound_uuid = sound_uuid.to_string();
        self.run(move |core| {
            let sample_uuid = core
                .state()
                .and_then(|doc| doc.sound(&sound_uuid))
                .and_then(|sound| samples(sound).next())
                .and_then(Node::uuid)
                .map(str::to_string);
            let Some(sample_uuid) = sample_uuid else {
                warn!(%sound_uuid, "Sound has no sample, root note not set");
                return;
            };
            core.send(&PluginCommand::SetSamplerSoundRootNote {
                sound_uuid,
                sample_uuid,
                root_note,
            });
        });
    }
}
