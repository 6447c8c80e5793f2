//! Typed view of the volatile state (meters, voices, query status)

use serde::Serialize;

use super::tree::{Document, Node};
use super::types::NodeType;

/// Decoded VOLATILE_STATE attributes
///
/// The plugin serializes per-voice and per-channel data as comma separated
/// lists with a trailing comma; empty and unparsable entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VolatileSnapshot {
    pub is_querying: bool,
    pub midi_received: bool,
    pub last_cc_received: Option<i32>,
    pub last_note_received: Option<i32>,
    pub voice_activations: Vec<u32>,
    /// Sample uuid played by each voice, `-1` for idle voices
    pub voice_sound_ids: Vec<String>,
    pub voice_play_positions: Vec<f32>,
    pub audio_levels: Vec<f32>,
}

impl VolatileSnapshot {
    /// Decode from a volatile document; `None` when it holds no VOLATILE_STATE node
    pub fn from_document(doc: &Document) -> Option<Self> {
        doc.nodes()
            .find(|n| n.node_type() == NodeType::VolatileState)
            .map(Self::from_node)
    }

    pub fn from_node(node: &Node) -> Self {
        Self {
            is_querying: node.attr("isQuerying").is_some_and(|v| v != "0"),
            midi_received: node
                .attr("midiInActivity")
                .or_else(|| node.attr("midiReceived"))
                .is_some_and(|v| v != "0"),
            last_cc_received: node.attr("lastMIDICCReceived").and_then(|v| v.trim().parse().ok()),
            last_note_received: node
                .attr("lastMIDINoteReceived")
                .and_then(|v| v.trim().parse().ok()),
            voice_activations: parse_list(node.attr("voiceActivations")),
            voice_sound_ids: split_list(node.attr("voiceSoundIdxs"))
                .map(str::to_string)
                .collect(),
            voice_play_positions: parse_list(node.attr("voiceSoundPlayPosition")),
            audio_levels: parse_list(node.attr("audioLevels")),
        }
    }

    /// Number of voices currently sounding
    pub fn num_active_voices(&self) -> u32 {
        self.voice_activations
            .iter()
            .fold(0u32, |total, v| total.saturating_add(*v))
    }

    /// 1-based display index of the sound played by each voice
    ///
    /// Idle voices (`-1`) and samples no longer present in `state` map to `None`.
    pub fn voice_sound_indexes(&self, state: &Document) -> Vec<Option<usize>> {
        self.voice_sound_ids
            .iter()
            .map(|id| match id.as_str() {
                "-1" => None,
                sample_uuid => state.sound_index_for_sample(sample_uuid),
            })
            .collect()
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_list<T: std::str::FromStr>(raw: Option<&str>) -> Vec<T> {
    split_list(raw).filter_map(|s| s.parse().ok()).collect()
}
