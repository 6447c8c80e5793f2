//! Inbound message decoding
//!
//! Wire format: `<messageType>:<payload>`. Only the first `:` separates the
//! type; payloads routinely contain further colons (and semicolons) inside
//! serialized XML.

use crate::state::NodeType;

use super::ProtocolError;

pub const MSG_FULL_STATE: &str = "/full_state";
pub const MSG_VOLATILE_STATE: &str = "/volatile_state";
pub const MSG_STATE_UPDATE: &str = "/state_update";

pub const UPDATE_PROPERTY_CHANGED: &str = "propertyChanged";
pub const UPDATE_ADDED_CHILD: &str = "addedChild";
pub const UPDATE_REMOVED_CHILD: &str = "removedChild";

/// A decoded message from the plugin
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Complete snapshot replacing the full state
    FullState { update_id: Option<i64>, tree: String },
    /// Snapshot replacing the volatile state
    VolatileState { tree: String },
    /// Incremental change to the full state
    StateUpdate(StateUpdate),
}

/// An incremental update with its (informational) sequence id
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    /// `None` when the plugin sent an id that is not a number
    pub update_id: Option<i64>,
    pub change: TreeChange,
}

/// The three kinds of tree mutation the plugin reports
#[derive(Debug, Clone, PartialEq)]
pub enum TreeChange {
    PropertyChanged {
        tree_uuid: String,
        tree_type: NodeType,
        property: String,
        value: String,
    },
    AddedChild {
        parent_uuid: String,
        parent_type: NodeType,
        /// Insertion position; `None` appends
        index: Option<usize>,
        /// Serialized child element
        child: String,
    },
    RemovedChild {
        child_uuid: String,
        child_type: NodeType,
    },
}

/// Split a raw frame into `(messageType, payload)` at the first `:`
pub fn split_message(raw: &str) -> Result<(&str, &str), ProtocolError> {
    raw.split_once(':').ok_or(ProtocolError::MissingSeparator)
}

/// Decode a raw text frame
pub fn decode(raw: &str) -> Result<InboundMessage, ProtocolError> {
    let (msg_type, payload) = split_message(raw)?;

    match msg_type {
        MSG_FULL_STATE => {
            let (id, tree) = payload.split_once(';').ok_or(ProtocolError::MissingField {
                context: MSG_FULL_STATE,
                field: "tree",
            })?;
            Ok(InboundMessage::FullState {
                update_id: parse_update_id(id),
                tree: tree.to_string(),
            })
        },
        MSG_VOLATILE_STATE => Ok(InboundMessage::VolatileState {
            tree: payload.to_string(),
        }),
        MSG_STATE_UPDATE => decode_state_update(payload).map(InboundMessage::StateUpdate),
        other => Err(ProtocolError::UnknownMessageType(other.to_string())),
    }
}

/// Decode a `/state_update` payload: `<updateType>;<updateId>;<fields...>`
pub fn decode_state_update(payload: &str) -> Result<StateUpdate, ProtocolError> {
    let mut parts = payload.split(';');
    let update_type = parts.next().unwrap_or_default();
    let update_id = parse_update_id(parts.next().ok_or(ProtocolError::MissingField {
        context: MSG_STATE_UPDATE,
        field: "updateId",
    })?);
    let fields: Vec<&str> = parts.collect();

    let change = match update_type {
        UPDATE_PROPERTY_CHANGED => TreeChange::PropertyChanged {
            tree_uuid: field(&fields, 0, UPDATE_PROPERTY_CHANGED, "treeUUID")?.to_string(),
            tree_type: field(&fields, 1, UPDATE_PROPERTY_CHANGED, "treeType")?.into(),
            property: field(&fields, 2, UPDATE_PROPERTY_CHANGED, "propertyName")?.to_string(),
            value: rest(&fields, 3, UPDATE_PROPERTY_CHANGED, "propertyValue")?,
        },
        UPDATE_ADDED_CHILD => {
            let index: i64 = parse_number(
                "index",
                field(&fields, 2, UPDATE_ADDED_CHILD, "indexInParent")?,
            )?;
            TreeChange::AddedChild {
                parent_uuid: field(&fields, 0, UPDATE_ADDED_CHILD, "parentUUID")?.to_string(),
                parent_type: field(&fields, 1, UPDATE_ADDED_CHILD, "parentType")?.into(),
                index: usize::try_from(index).ok(),
                child: rest(&fields, 3, UPDATE_ADDED_CHILD, "child")?,
            }
        },
        UPDATE_REMOVED_CHILD => TreeChange::RemovedChild {
            child_uuid: field(&fields, 0, UPDATE_REMOVED_CHILD, "childUUID")?.to_string(),
            child_type: field(&fields, 1, UPDATE_REMOVED_CHILD, "childType")?.into(),
        },
        other => return Err(ProtocolError::UnknownUpdateType(other.to_string())),
    };

    Ok(StateUpdate { update_id, change })
}

fn field<'a>(
    fields: &[&'a str],
    index: usize,
    context: &'static str,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    fields.get(index).copied().ok_or(ProtocolError::MissingField {
        context,
        field: name,
    })
}

/// Re-join every field from `index` on; the last field may itself contain `;`
fn rest(
    fields: &[&str],
    index: usize,
    context: &'static str,
    name: &'static str,
) -> Result<String, ProtocolError> {
    match fields.get(index..) {
        Some(tail) if !tail.is_empty() => Ok(tail.join(";")),
        _ => Err(ProtocolError::MissingField {
            context,
            field: name,
        }),
    }
}

/// Update ids are informational only; a garbled one never rejects the message
fn parse_update_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn parse_number(field: &'static str, raw: &str) -> Result<i64, ProtocolError> {
    raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_state_splits_on_first_separators() {
        let msg = decode("/full_state:7;<SOURCE_STATE name=\"a:b;c\"/>").unwrap();
        assert_eq!(
            msg,
            InboundMessage::FullState {
                update_id: Some(7),
                tree: "<SOURCE_STATE name=\"a:b;c\"/>".to_string(),
            }
        );
    }

    #[test]
    fn test_volatile_state_keeps_whole_payload() {
        let msg = decode("/volatile_state:<VOLATILE_STATE audioLevels=\"0.1,0.2,\"/>").unwrap();
        assert_eq!(
            msg,
            InboundMessage::VolatileState {
                tree: "<VOLATILE_STATE audioLevels=\"0.1,0.2,\"/>".to_string(),
            }
        );
    }

    #[test]
    fn test_property_changed() {
        let msg = decode("/state_update:propertyChanged;8;U1;SOUND;gain;0.5").unwrap();
        assert_eq!(
            msg,
            InboundMessage::StateUpdate(StateUpdate {
                update_id: Some(8),
                change: TreeChange::PropertyChanged {
                    tree_uuid: "U1".to_string(),
                    tree_type: NodeType::Sound,
                    property: "gain".to_string(),
                    value: "0.5".to_string(),
                },
            })
        );
    }

    #[test]
    fn test_added_child_rejoins_payload() {
        let update = decode_state_update(
            "addedChild;9;root;SOURCE_STATE;-1;<SOUND uuid=\"U1\" name=\"a;b;c\"/>",
        )
        .unwrap();

        match update.change {
            TreeChange::AddedChild {
                parent_uuid,
                parent_type,
                index,
                child,
            } => {
                assert_eq!(parent_uuid, "root");
                assert_eq!(parent_type, NodeType::SourceState);
                assert_eq!(index, None);
                assert_eq!(child, "<SOUND uuid=\"U1\" name=\"a;b;c\"/>");
            },
            other => panic!("unexpected change: {:?}", other),
        }
    }

    #[test]
    fn test_added_child_with_index() {
        let update = decode_state_update("addedChild;3;p;PRESET;2;<SOUND/>").unwrap();
        assert!(matches!(
            update.change,
            TreeChange::AddedChild { index: Some(2), .. }
        ));
    }

    #[test]
    fn test_removed_child() {
        let update = decode_state_update("removedChild;11;U1;SOUND").unwrap();
        assert_eq!(
            update.change,
            TreeChange::RemovedChild {
                child_uuid: "U1".to_string(),
                child_type: NodeType::Sound,
            }
        );
    }

    #[test]
    fn test_malformed_messages() {
        assert_eq!(decode("no separator"), Err(ProtocolError::MissingSeparator));
        assert_eq!(
            decode("/bogus:1"),
            Err(ProtocolError::UnknownMessageType("/bogus".to_string()))
        );
        assert!(matches!(
            decode("/full_state:12"),
            Err(ProtocolError::MissingField { .. })
        ));
        assert_eq!(
            decode_state_update("renamed;1;a;b"),
            Err(ProtocolError::UnknownUpdateType("renamed".to_string()))
        );
        assert!(matches!(
            decode_state_update("propertyChanged;1;U1;SOUND"),
            Err(ProtocolError::MissingField { field: "propertyName", .. })
        ));
        assert!(matches!(
            decode_state_update("addedChild;1;U1;SOUND;x;<A/>"),
            Err(ProtocolError::InvalidNumber { field: "index", .. })
        ));
        assert!(matches!(
            decode_state_update("propertyChanged"),
            Err(ProtocolError::MissingField { field: "updateId", .. })
        ));
    }

    #[test]
    fn test_garbled_update_id_still_decodes() {
        assert_eq!(
            decode("/full_state:abc;<A/>"),
            Ok(InboundMessage::FullState {
                update_id: None,
                tree: "<A/>".to_string(),
            })
        );
        assert_eq!(
            decode("/full_state:;<A/>"),
            Ok(InboundMessage::FullState {
                update_id: None,
                tree: "<A/>".to_string(),
            })
        );

        let update = decode_state_update("propertyChanged;;U1;SOUND;gain;0.5").unwrap();
        assert_eq!(update.update_id, None);
        assert!(matches!(
            update.change,
            TreeChange::PropertyChanged { ref property, .. } if property == "gain"
        ));
    }
}
