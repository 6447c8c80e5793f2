//! Outbound commands
//!
//! Every intent is serialized as `<address>:<arg1>;<arg2>;...` and sent
//! fire-and-forget. Replies, if any, arrive later as state updates.

use std::fmt;
use std::str::FromStr;

/// Which snapshot to request with `/get_state`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Full,
    Volatile,
}

impl StateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Full => "full",
            StateKind::Volatile => "volatile",
        }
    }
}

/// How the plugin spreads loaded sounds over the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteLayout {
    #[default]
    Contiguous,
    Interleaved,
    /// Every note triggers every sound
    All,
}

impl NoteLayout {
    /// Numeric value understood by the plugin
    pub fn as_int(self) -> u8 {
        match self {
            NoteLayout::Contiguous => 0,
            NoteLayout::Interleaved => 1,
            NoteLayout::All => 2,
        }
    }
}

impl FromStr for NoteLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contiguous" | "0" => Ok(NoteLayout::Contiguous),
            "interleaved" | "1" => Ok(NoteLayout::Interleaved),
            "all" | "2" => Ok(NoteLayout::All),
            other => Err(format!("unknown note layout '{}'", other)),
        }
    }
}

/// Parameters of a sound search
#[derive(Debug, Clone, PartialEq)]
pub struct SoundQuery {
    pub query: String,
    pub num_sounds: u32,
    /// Minimum sound duration in seconds
    pub min_length: f32,
    /// Maximum sound duration in seconds
    pub max_length: f32,
    pub layout: NoteLayout,
}

impl SoundQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

impl Default for SoundQuery {
    fn default() -> Self {
        Self {
            query: String::new(),
            num_sounds: 16,
            min_length: 0.0,
            max_length: 0.5,
            layout: NoteLayout::Contiguous,
        }
    }
}

/// Global reverb settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParameters {
    pub room_size: f32,
    pub damping: f32,
    pub wet_level: f32,
    pub dry_level: f32,
    pub width: f32,
    pub freeze_mode: f32,
}

/// A MIDI CC mapping to create or update
#[derive(Debug, Clone, PartialEq)]
pub struct CcMapping {
    pub sound_uuid: String,
    /// Empty when creating a new mapping
    pub mapping_uuid: String,
    pub cc_number: u8,
    pub parameter_name: String,
    pub min_range: f32,
    pub max_range: f32,
}

/// Default note velocity used by the note on/off intents
pub const DEFAULT_NOTE_VELOCITY: u8 = 120;

/// Every message the client can send to the plugin
#[derive(Debug, Clone, PartialEq)]
pub enum PluginCommand {
    GetState(StateKind),
    /// An empty `sound_uuid` targets all sounds
    SetSoundParameter {
        sound_uuid: String,
        parameter: String,
        value: f32,
    },
    SetSoundParameterInt {
        sound_uuid: String,
        parameter: String,
        value: i32,
    },
    AddSoundsFromQuery(SoundQuery),
    ReplaceSoundsFromQuery(SoundQuery),
    ReplaceSoundFromQuery {
        sound_uuid: String,
        query: SoundQuery,
    },
    ReapplyLayout(NoteLayout),
    ClearAllSounds,
    SetMidiInChannel(u8),
    SetReverbParameters(ReverbParameters),
    SetPolyphony(u32),
    PlaySound(String),
    StopSound(String),
    RemoveSound(String),
    SavePreset {
        name: String,
        index: u32,
    },
    LoadPreset(u32),
    /// Channel 0 lets the plugin pick its global MIDI input channel
    NoteOn {
        note: u8,
        velocity: u8,
        channel: u8,
    },
    NoteOff {
        note: u8,
        velocity: u8,
        channel: u8,
    },
    SetSamplerSoundRootNote {
        sound_uuid: String,
        sample_uuid: String,
        root_note: u8,
    },
    AddOrUpdateCcMapping(CcMapping),
    RemoveCcMapping {
        sound_uuid: String,
        mapping_uuid: String,
    },
}

impl PluginCommand {
    pub fn address(&self) -> &'static str {
        match self {
            PluginCommand::GetState(_) => "/get_state",
            PluginCommand::SetSoundParameter { .. } => "/set_sound_parameter",
            PluginCommand::SetSoundParameterInt { .. } => "/set_sound_parameter_int",
            PluginCommand::AddSoundsFromQuery(_) => "/add_sounds_from_query",
            PluginCommand::ReplaceSoundsFromQuery(_) => "/replace_sounds_from_query",
            PluginCommand::ReplaceSoundFromQuery { .. } => "/replace_sound_from_query",
            PluginCommand::ReapplyLayout(_) => "/reapply_layout",
            PluginCommand::ClearAllSounds => "/clear_all_sounds",
            PluginCommand::SetMidiInChannel(_) => "/set_midi_in_channel",
            PluginCommand::SetReverbParameters(_) => "/set_reverb_parameters",
            PluginCommand::SetPolyphony(_) => "/set_polyphony",
            PluginCommand::PlaySound(_) => "/play_sound",
            PluginCommand::StopSound(_) => "/stop_sound",
            PluginCommand::RemoveSound(_) => "/remove_sound",
            PluginCommand::SavePreset { .. } => "/save_preset",
            PluginCommand::LoadPreset(_) => "/load_preset",
            PluginCommand::NoteOn { .. } => "/note_on",
            PluginCommand::NoteOff { .. } => "/note_off",
            PluginCommand::SetSamplerSoundRootNote { .. } => "/set_sampler_sound_root_note",
            PluginCommand::AddOrUpdateCcMapping(_) => "/add_or_update_cc_mapping",
            PluginCommand::RemoveCcMapping { .. } => "/remove_cc_mapping",
        }
    }

    /// Positional arguments, already formatted
    pub fn args(&self) -> Vec<String> {
        match self {
            PluginCommand::GetState(kind) => vec![kind.as_str().to_string()],
            PluginCommand::SetSoundParameter {
                sound_uuid,
                parameter,
                value,
            } => vec![sound_uuid.clone(), parameter.clone(), value.to_string()],
            PluginCommand::SetSoundParameterInt {
                sound_uuid,
                parameter,
                value,
            } => vec![sound_uuid.clone(), parameter.clone(), value.to_string()],
            PluginCommand::AddSoundsFromQuery(q) | PluginCommand::ReplaceSoundsFromQuery(q) => vec![
                q.query.clone(),
                q.num_sounds.to_string(),
                q.min_length.to_string(),
                q.max_length.to_string(),
                q.layout.as_int().to_string(),
            ],
            PluginCommand::ReplaceSoundFromQuery { sound_uuid, query } => vec![
                sound_uuid.clone(),
                query.query.clone(),
                query.min_length.to_string(),
                query.max_length.to_string(),
                query.layout.as_int().to_string(),
            ],
            PluginCommand::ReapplyLayout(layout) => vec![layout.as_int().to_string()],
            PluginCommand::ClearAllSounds => Vec::new(),
            PluginCommand::SetMidiInChannel(channel) => vec![channel.to_string()],
            PluginCommand::SetReverbParameters(r) => vec![
                r.room_size.to_string(),
                r.damping.to_string(),
                r.wet_level.to_string(),
                r.dry_level.to_string(),
                r.width.to_string(),
                r.freeze_mode.to_string(),
            ],
            PluginCommand::SetPolyphony(voices) => vec![voices.to_string()],
            PluginCommand::PlaySound(uuid)
            | PluginCommand::StopSound(uuid)
            | PluginCommand::RemoveSound(uuid) => vec![uuid.clone()],
            PluginCommand::SavePreset { name, index } => vec![name.clone(), index.to_string()],
            PluginCommand::LoadPreset(index) => vec![index.to_string()],
            PluginCommand::NoteOn {
                note,
                velocity,
                channel,
            }
            | PluginCommand::NoteOff {
                note,
                velocity,
                channel,
            } => vec![note.to_string(), velocity.to_string(), channel.to_string()],
            PluginCommand::SetSamplerSoundRootNote {
                sound_uuid,
                sample_uuid,
                root_note,
            } => vec![sound_uuid.clone(), sample_uuid.clone(), root_note.to_string()],
            PluginCommand::AddOrUpdateCcMapping(m) => vec![
                m.sound_uuid.clone(),
                m.mapping_uuid.clone(),
                m.cc_number.to_string(),
                m.parameter_name.clone(),
                m.min_range.to_string(),
                m.max_range.to_string(),
            ],
            PluginCommand::RemoveCcMapping {
                sound_uuid,
                mapping_uuid,
            } => vec![sound_uuid.clone(), mapping_uuid.clone()],
        }
    }

    /// Wire form: `address:arg1;arg2;...`
    pub fn encode(&self) -> String {
        format!("{}:{}", self.address(), self.args().join(";"))
    }
}

impl fmt::Display for PluginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_state_encoding() {
        assert_eq!(
            PluginCommand::GetState(StateKind::Full).encode(),
            "/get_state:full"
        );
        assert_eq!(
            PluginCommand::GetState(StateKind::Volatile).encode(),
            "/get_state:volatile"
        );
    }

    #[test]
    fn test_no_argument_command() {
        assert_eq!(PluginCommand::ClearAllSounds.encode(), "/clear_all_sounds:");
    }

    #[test]
    fn test_sound_parameter_encoding() {
        let cmd = PluginCommand::SetSoundParameter {
            sound_uuid: String::new(),
            parameter: "gain".to_string(),
            value: 0.75,
        };
        assert_eq!(cmd.encode(), "/set_sound_parameter:;gain;0.75");
    }

    #[test]
    fn test_query_encoding() {
        let query = SoundQuery {
            query: "piano".to_string(),
            num_sounds: 8,
            min_length: 0.0,
            max_length: 1.5,
            layout: NoteLayout::Interleaved,
        };
        assert_eq!(
            PluginCommand::ReplaceSoundsFromQuery(query.clone()).encode(),
            "/replace_sounds_from_query:piano;8;0;1.5;1"
        );
        assert_eq!(
            PluginCommand::ReplaceSoundFromQuery {
                sound_uuid: "s1".to_string(),
                query,
            }
            .encode(),
            "/replace_sound_from_query:s1;piano;0;1.5;1"
        );
    }

    #[test]
    fn test_mapping_and_note_encoding() {
        let mapping = CcMapping {
            sound_uuid: "s1".to_string(),
            mapping_uuid: String::new(),
            cc_number: 74,
            parameter_name: "filterCutoff".to_string(),
            min_range: 0.0,
            max_range: 1.0,
        };
        assert_eq!(
            PluginCommand::AddOrUpdateCcMapping(mapping).encode(),
            "/add_or_update_cc_mapping:s1;;74;filterCutoff;0;1"
        );
        assert_eq!(
            PluginCommand::NoteOn {
                note: 60,
                velocity: DEFAULT_NOTE_VELOCITY,
                channel: 0,
            }
            .encode(),
            "/note_on:60;120;0"
        );
    }

    #[test]
    fn test_note_layout_parsing() {
        assert_eq!("interleaved".parse(), Ok(NoteLayout::Interleaved));
        assert_eq!("2".parse(), Ok(NoteLayout::All));
        assert!("spiral".parse::<NoteLayout>().is_err());
    }
}
