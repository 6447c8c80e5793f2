//! Node types and well-known attribute names of the plugin state tree

use std::fmt;

/// Attribute carrying the node identity
pub const ATTR_UUID: &str = "uuid";
/// Transient marker set on sounds and samples right before the plugin removes them
pub const ATTR_WILL_BE_DELETED: &str = "willBeDeleted";
/// Number of results returned by the last query (-1 when no query ran)
pub const ATTR_NUM_RESULTS_LAST_QUERY: &str = "numResultsLastQuery";
/// Index of the currently loaded preset, -1 before any load (root attribute)
pub const ATTR_CURRENT_PRESET_INDEX: &str = "currentPresetIndex";
/// Location of the plugin's temporary files (root attribute)
pub const ATTR_TMP_FILES_LOCATION: &str = "tmpFilesLocation";

/// Node type, derived from the element tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Root of the full state
    SourceState,
    Preset,
    Sound,
    /// A single audio source bound under a SOUND node
    SoundSample,
    MidiCcMapping,
    /// Root of the volatile state
    VolatileState,
    /// Any tag the synchronizer does not interpret
    Other(String),
}

impl NodeType {
    /// Map an element tag to its node type
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "SOURCE_STATE" => NodeType::SourceState,
            "PRESET" => NodeType::Preset,
            "SOUND" => NodeType::Sound,
            "SOUND_SAMPLE" => NodeType::SoundSample,
            "MIDI_CC_MAPPING" => NodeType::MidiCcMapping,
            "VOLATILE_STATE" => NodeType::VolatileState,
            other => NodeType::Other(other.to_string()),
        }
    }

    /// Element tag for this node type
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::SourceState => "SOURCE_STATE",
            NodeType::Preset => "PRESET",
            NodeType::Sound => "SOUND",
            NodeType::SoundSample => "SOUND_SAMPLE",
            NodeType::MidiCcMapping => "MIDI_CC_MAPPING",
            NodeType::VolatileState => "VOLATILE_STATE",
            NodeType::Other(tag) => tag,
        }
    }

    /// Whether adding a node of this type changes the sound list layout
    pub fn is_structural(&self) -> bool {
        matches!(self, NodeType::Sound | NodeType::MidiCcMapping)
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        NodeType::from_tag(tag)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kind of a sound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Int,
    Float,
}

/// A sound parameter exposed as a slider
#[derive(Debug, Clone, Copy)]
pub struct SoundParameter {
    pub name: &'static str,
    pub kind: ParameterKind,
    /// Whether the parameter can be the target of a MIDI CC mapping
    pub midi_controllable: bool,
}

const fn int(name: &'static str) -> SoundParameter {
    SoundParameter {
        name,
        kind: ParameterKind::Int,
        midi_controllable: false,
    }
}

const fn float(name: &'static str) -> SoundParameter {
    SoundParameter {
        name,
        kind: ParameterKind::Float,
        midi_controllable: false,
    }
}

const fn mappable(name: &'static str) -> SoundParameter {
    SoundParameter {
        name,
        kind: ParameterKind::Float,
        midi_controllable: true,
    }
}

/// All per-sound parameters known to the plugin
pub const SOUND_PARAMETERS: &[SoundParameter] = &[
    int("launchMode"),
    mappable("startPosition"),
    mappable("endPosition"),
    mappable("loopStartPosition"),
    mappable("loopEndPosition"),
    int("loopXFadeNSamples"),
    int("reverse"),
    int("noteMappingMode"),
    int("numSlices"),
    mappable("playheadPosition"),
    mappable("freezePlayheadSpeed"),
    mappable("filterCutoff"),
    mappable("filterRessonance"),
    float("filterKeyboardTracking"),
    float("filterAttack"),
    float("filterDecay"),
    float("filterSustain"),
    float("filterRelease"),
    float("filterADSR2CutoffAmt"),
    mappable("gain"),
    float("attack"),
    float("decay"),
    float("sustain"),
    float("release"),
    mappable("pan"),
    mappable("pitch"),
    float("pitchBendRangeUp"),
    float("pitchBendRangeDown"),
    float("mod2CutoffAmt"),
    float("mod2GainAmt"),
    float("mod2PitchAmt"),
    float("mod2PlayheadPos"),
    float("vel2CutoffAmt"),
    float("vel2GainAmt"),
    int("midiChannel"),
];

/// Look up a sound parameter by name
pub fn sound_parameter(name: &str) -> Option<&'static SoundParameter> {
    SOUND_PARAMETERS.iter().find(|p| p.name == name)
}

/// Whether `name` is a per-sound slider parameter
pub fn is_sound_parameter(name: &str) -> bool {
    sound_parameter(name).is_some()
}

/// Names of the parameters that MIDI CC mappings may target
pub fn midi_controllable_parameters() -> impl Iterator<Item = &'static str> {
    SOUND_PARAMETERS
        .iter()
        .filter(|p| p.midi_controllable)
        .map(|p| p.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_mapping() {
        for tag in [
            "SOURCE_STATE",
            "PRESET",
            "SOUND",
            "SOUND_SAMPLE",
            "MIDI_CC_MAPPING",
            "VOLATILE_STATE",
        ] {
            let ty = NodeType::from_tag(tag);
            assert!(!matches!(ty, NodeType::Other(_)), "{tag} should be known");
            assert_eq!(ty.as_str(), tag);
        }

        assert_eq!(
            NodeType::from_tag("sound"),
            NodeType::Other("sound".to_string())
        );
    }

    #[test]
    fn test_structural_types() {
        assert!(NodeType::Sound.is_structural());
        assert!(NodeType::MidiCcMapping.is_structural());
        assert!(!NodeType::SoundSample.is_structural());
        assert!(!NodeType::Preset.is_structural());
    }

    #[test]
    fn test_sound_parameter_catalogue() {
        assert!(is_sound_parameter("gain"));
        assert!(is_sound_parameter("midiChannel"));
        assert!(!is_sound_parameter("willBeDeleted"));

        assert_eq!(sound_parameter("numSlices").unwrap().kind, ParameterKind::Int);
        assert_eq!(sound_parameter("pitch").unwrap().kind, ParameterKind::Float);

        let mappable: Vec<_> = midi_controllable_parameters().collect();
        assert_eq!(mappable.len(), 11);
        assert!(mappable.contains(&"filterCutoff"));
        assert!(!mappable.contains(&"attack"));
    }
}
