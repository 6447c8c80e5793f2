//! Read accessors over the full state tree
//!
//! These mirror what the UI needs to render sound cards: sounds in display
//! order, their samples and MIDI mappings, and 1-based display indexes.

use super::tree::{Document, Node};
use super::types::{NodeType, ATTR_CURRENT_PRESET_INDEX, ATTR_TMP_FILES_LOCATION};

impl Document {
    /// All SOUND nodes in document order
    pub fn sounds(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| n.node_type() == NodeType::Sound)
    }

    /// SOUND node with the given uuid
    pub fn sound(&self, sound_uuid: &str) -> Option<&Node> {
        self.find(sound_uuid)
            .filter(|n| n.node_type() == NodeType::Sound)
    }

    /// The SOUND owning the sample with the given uuid
    pub fn sound_for_sample(&self, sample_uuid: &str) -> Option<&Node> {
        self.parent_of(sample_uuid)
            .filter(|n| n.node_type() == NodeType::Sound)
    }

    /// 1-based display index of a sound
    pub fn sound_index(&self, sound_uuid: &str) -> Option<usize> {
        self.sounds()
            .position(|s| s.uuid() == Some(sound_uuid))
            .map(|i| i + 1)
    }

    /// 1-based display index of the sound that owns a sample
    pub fn sound_index_for_sample(&self, sample_uuid: &str) -> Option<usize> {
        self.sounds()
            .position(|s| samples(s).any(|ss| ss.uuid() == Some(sample_uuid)))
            .map(|i| i + 1)
    }

    /// Uuid of the sound displayed at a 1-based index
    pub fn sound_uuid_at(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.sounds().nth(i))
            .and_then(Node::uuid)
    }

    /// MIDI CC mapping with the given uuid
    pub fn midi_mapping(&self, mapping_uuid: &str) -> Option<&Node> {
        self.find(mapping_uuid)
            .filter(|n| n.node_type() == NodeType::MidiCcMapping)
    }

    /// Location of the plugin's temporary files
    pub fn tmp_files_location(&self) -> Option<&str> {
        self.source_state()
            .and_then(|n| n.attr(ATTR_TMP_FILES_LOCATION))
    }

    /// Index of the loaded preset; `None` when no preset was loaded yet
    pub fn current_preset_index(&self) -> Option<u32> {
        self.source_state()
            .and_then(|n| n.attr(ATTR_CURRENT_PRESET_INDEX))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|v| u32::try_from(v).ok())
    }

    fn source_state(&self) -> Option<&Node> {
        self.nodes()
            .find(|n| n.node_type() == NodeType::SourceState)
    }
}

/// SOUND_SAMPLE nodes under a sound
pub fn samples(sound: &Node) -> impl Iterator<Item = &Node> {
    sound
        .descendants()
        .filter(|n| n.node_type() == NodeType::SoundSample)
}

/// MIDI_CC_MAPPING nodes under a sound
pub fn midi_mappings(sound: &Node) -> impl Iterator<Item = &Node> {
    sound
        .descendants()
        .filter(|n| n.node_type() == NodeType::MidiCcMapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<SOURCE_STATE uuid="root" tmpFilesLocation="/tmp/src" currentPresetIndex="3">
                 <PRESET uuid="p1">
                   <SOUND uuid="s1">
                     <SOUND_SAMPLE uuid="ss1"/>
                     <SOUND_SAMPLE uuid="ss2"/>
                     <MIDI_CC_MAPPING uuid="m1" ccNumber="10"/>
                   </SOUND>
                   <SOUND uuid="s2">
                     <SOUND_SAMPLE uuid="ss3"/>
                   </SOUND>
                 </PRESET>
               </SOURCE_STATE>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_sound_lookups() {
        let doc = doc();
        let uuids: Vec<_> = doc.sounds().filter_map(Node::uuid).collect();
        assert_eq!(uuids, vec!["s1", "s2"]);

        assert!(doc.sound("s2").is_some());
        assert!(doc.sound("ss1").is_none(), "samples are not sounds");
        assert_eq!(doc.sound_for_sample("ss3").unwrap().uuid(), Some("s2"));
        assert!(doc.sound_for_sample("missing").is_none());
    }

    #[test]
    fn test_display_indexes() {
        let doc = doc();
        assert_eq!(doc.sound_index("s1"), Some(1));
        assert_eq!(doc.sound_index("s2"), Some(2));
        assert_eq!(doc.sound_index("nope"), None);

        assert_eq!(doc.sound_index_for_sample("ss2"), Some(1));
        assert_eq!(doc.sound_index_for_sample("ss3"), Some(2));
        assert_eq!(doc.sound_index_for_sample("nope"), None);

        assert_eq!(doc.sound_uuid_at(2), Some("s2"));
        assert_eq!(doc.sound_uuid_at(0), None);
        assert_eq!(doc.sound_uuid_at(3), None);
    }

    #[test]
    fn test_children_accessors() {
        let doc = doc();
        let s1 = doc.sound("s1").unwrap();
        assert_eq!(samples(s1).count(), 2);
        assert_eq!(midi_mappings(s1).count(), 1);
        assert_eq!(doc.midi_mapping("m1").unwrap().attr("ccNumber"), Some("10"));
        assert_eq!(doc.tmp_files_location(), Some("/tmp/src"));
        assert_eq!(doc.current_preset_index(), Some(3));
    }

    #[test]
    fn test_unloaded_preset_index() {
        let doc = Document::parse(r#"<SOURCE_STATE uuid="r" currentPresetIndex="-1"/>"#).unwrap();
        assert_eq!(doc.current_preset_index(), None);
    }
}
