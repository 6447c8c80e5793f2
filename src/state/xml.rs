//! XML reading and writing for state trees (quick-xml)
//!
//! State trees carry all data in attributes, so text content, comments and
//! declarations are skipped when reading.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::tree::Node;
use super::TreeError;

/// Parse the first top-level element of `xml` into a node
pub(super) fn parse_element(xml: &str) -> Result<Node, TreeError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| TreeError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(start) => {
                stack.push(node_from_start(&reader, &start)?);
            },
            Event::Empty(start) => {
                let node = node_from_start(&reader, &start)?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.insert_child(None, node);
                    },
                    None => return Ok(node),
                }
            },
            Event::End(end) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| TreeError::UnbalancedClose(tag_name(end.name().as_ref())))?;
                match stack.last_mut() {
                    Some(parent) => {
                        parent.insert_child(None, node);
                    },
                    None => return Ok(node),
                }
            },
            Event::Eof => {
                return Err(match stack.pop() {
                    Some(open) => TreeError::Unclosed(open.tag().to_string()),
                    None => TreeError::Empty,
                });
            },
            _ => {},
        }
    }
}

fn node_from_start(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> Result<Node, TreeError> {
    let mut node = Node::new(tag_name(start.name().as_ref()));

    for attr in start.attributes() {
        let attr = attr.map_err(|e| TreeError::Xml {
            position: reader.buffer_position() as u64,
            message: e.to_string(),
        })?;
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| TreeError::Xml {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;
        node.set_attr(tag_name(attr.key.as_ref()), value.into_owned());
    }

    Ok(node)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Serialize a node (and its subtree) to XML
pub(super) fn write_element(node: &Node) -> anyhow::Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> anyhow::Result<()> {
    let mut start = BytesStart::new(node.tag());
    for (name, value) in node.attributes() {
        start.push_attribute((name, value));
    }

    if node.children().is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in node.children() {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(node.tag())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_snapshot() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<SOURCE_STATE uuid="root" tmpFilesLocation="/tmp/source">
  <PRESET uuid="p1" name="Default">
    <SOUND uuid="s1" gain="0.5">
      <SOUND_SAMPLE uuid="ss1" name="kick;808"/>
    </SOUND>
  </PRESET>
</SOURCE_STATE>"#;

        let root = parse_element(xml).unwrap();
        assert_eq!(root.tag(), "SOURCE_STATE");
        assert_eq!(root.attr("tmpFilesLocation"), Some("/tmp/source"));

        let preset = &root.children()[0];
        assert_eq!(preset.attr("name"), Some("Default"));
        let sample = &preset.children()[0].children()[0];
        assert_eq!(sample.attr("name"), Some("kick;808"));
    }

    #[test]
    fn test_parse_unescapes_attributes() {
        let node = parse_element(r#"<SOUND uuid="a" name="drums &amp; bass"/>"#).unwrap();
        assert_eq!(node.attr("name"), Some("drums & bass"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_element(""), Err(TreeError::Empty)));
        assert!(matches!(
            parse_element("<SOUND uuid=\"a\">"),
            Err(TreeError::Unclosed(tag)) if tag == "SOUND"
        ));
        assert!(parse_element("<SOUND></PRESET>").is_err());
    }

    #[test]
    fn test_write_then_parse_preserves_tree() {
        let node = Node::new("SOUND")
            .with_attr("uuid", "s1")
            .with_attr("name", "a \"quoted\" <name>")
            .with_child(Node::new("SOUND_SAMPLE").with_attr("uuid", "ss1"));

        let xml = write_element(&node).unwrap();
        assert_eq!(parse_element(&xml).unwrap(), node);
    }
}
