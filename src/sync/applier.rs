//! Applies one decoded tree change to the full state

use tracing::{debug, warn};

use super::UiEvent;
use crate::protocol::TreeChange;
use crate::state::{
    is_sound_parameter, Document, Node, NodeType, TreeError, ATTR_NUM_RESULTS_LAST_QUERY,
    ATTR_WILL_BE_DELETED,
};

/// Apply `change` to `doc` and return the notifications it warrants.
///
/// References to nodes that no longer exist are ignored: the plugin may
/// report changes on elements a later message already removed. The only
/// error is an `addedChild` payload that does not parse.
pub fn apply_change(doc: &mut Document, change: &TreeChange) -> Result<Vec<UiEvent>, TreeError> {
    match change {
        TreeChange::PropertyChanged {
            tree_uuid,
            tree_type,
            property,
            value,
        } => Ok(property_changed(doc, tree_uuid, tree_type, property, value)),
        TreeChange::AddedChild {
            parent_uuid,
            parent_type,
            index,
            child,
        } => added_child(doc, parent_uuid, parent_type, *index, child),
        TreeChange::RemovedChild {
            child_uuid,
            child_type,
        } => Ok(removed_child(doc, child_uuid, child_type)),
    }
}

fn property_changed(
    doc: &mut Document,
    uuid: &str,
    tree_type: &NodeType,
    property: &str,
    value: &str,
) -> Vec<UiEvent> {
    let Some(node) = doc.find_mut(uuid) else {
        debug!(uuid, %tree_type, property, "property change for unknown node ignored");
        return Vec::new();
    };
    node.set_attr(property, value);

    let mut events = Vec::new();

    if property == ATTR_NUM_RESULTS_LAST_QUERY {
        if let Ok(count) = value.trim().parse() {
            events.push(UiEvent::QueryResults { count });
        }
    }

    match tree_type {
        NodeType::Sound | NodeType::SoundSample => {
            let sound = match tree_type {
                NodeType::Sound => doc.sound(uuid),
                _ => doc.sound_for_sample(uuid),
            };
            let sound_uuid = sound.and_then(Node::uuid).map(str::to_string);

            if property != ATTR_WILL_BE_DELETED {
                match &sound_uuid {
                    Some(sound_uuid) => events.push(UiEvent::SoundCardChanged {
                        sound_uuid: sound_uuid.clone(),
                    }),
                    None => warn!(uuid, %tree_type, property, "no sound found for changed node"),
                }
            }

            if *tree_type == NodeType::Sound && is_sound_parameter(property) {
                events.push(UiEvent::SoundParameterChanged {
                    sound_uuid: uuid.to_string(),
                    parameter: property.to_string(),
                    value: value.to_string(),
                });
            }
        },
        NodeType::SourceState | NodeType::Preset => events.push(UiEvent::PresetParametersChanged),
        NodeType::MidiCcMapping => events.push(UiEvent::MidiMappingChanged {
            mapping_uuid: uuid.to_string(),
        }),
        NodeType::VolatileState | NodeType::Other(_) => {},
    }

    events
}

fn added_child(
    doc: &mut Document,
    parent_uuid: &str,
    parent_type: &NodeType,
    index: Option<usize>,
    child: &str,
) -> Result<Vec<UiEvent>, TreeError> {
    let parent = match parent_type {
        NodeType::Preset => doc.root_mut(),
        _ => match doc.find_mut(parent_uuid) {
            Some(parent) => parent,
            None => {
                debug!(parent_uuid, %parent_type, "added child for unknown parent ignored");
                return Ok(Vec::new());
            },
        },
    };

    let child = Node::parse(child)?;
    let child_type = child.node_type();
    let position = parent.insert_child(index, child);
    debug!(parent_uuid, %child_type, position, "child added");

    Ok(if child_type.is_structural() {
        vec![UiEvent::SoundListChanged]
    } else {
        Vec::new()
    })
}

fn removed_child(doc: &mut Document, uuid: &str, child_type: &NodeType) -> Vec<UiEvent> {
    if doc.remove(uuid).is_none() {
        debug!(uuid, %child_type, "removal of unknown node ignored");
        return Vec::new();
    }

    let mut events = vec![UiEvent::ElementRemoved {
        uuid: uuid.to_string(),
        node_type: child_type.clone(),
    }];
    if *child_type == NodeType::Sound {
        events.push(UiEvent::SoundNumbersChanged);
    }
    events
}
