//! Document tree - ordered, attributed nodes addressed by uuid
//!
//! The plugin serializes its state as XML where every piece of information
//! lives in attributes. Nodes are owned recursively; lookups walk the tree
//! depth-first in document order, so the first node carrying a uuid wins.

use std::collections::BTreeMap;

use super::types::{NodeType, ATTR_UUID};
use super::xml;
use super::TreeError;

/// A single element of the state tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    children: Vec<Node>,
}

impl Node {
    /// Create an empty node with the given tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Parse a serialized element (used for `addedChild` payloads)
    pub fn parse(xml: &str) -> Result<Self, TreeError> {
        xml::parse_element(xml)
    }

    /// Builder: set an attribute
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_tag(&self.tag)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn uuid(&self) -> Option<&str> {
        self.attr(ATTR_UUID)
    }

    /// Set (or overwrite) an attribute. Values are kept as strings; typed
    /// interpretation is left to readers.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Insert a child at `index`, or append when `index` is `None` or past the end.
    ///
    /// Returns the position the child ended up at.
    pub fn insert_child(&mut self, index: Option<usize>, child: Node) -> usize {
        match index {
            Some(i) if i < self.children.len() => {
                self.children.insert(i, child);
                i
            },
            _ => {
                self.children.push(child);
                self.children.len() - 1
            },
        }
    }

    /// All descendants (excluding `self`) in document order
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Serialize back to XML
    pub fn to_xml(&self) -> anyhow::Result<String> {
        xml::write_element(self)
    }
}

/// Depth-first pre-order iterator over a node's descendants
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// A complete parsed state tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

impl Document {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Parse a serialized snapshot. The first top-level element becomes the root.
    pub fn parse(xml: &str) -> Result<Self, TreeError> {
        xml::parse_element(xml).map(Self::new)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node {
        &mut self.root
    }

    /// Root plus all descendants in document order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        std::iter::once(&self.root).chain(self.root.descendants())
    }

    /// Find a node by uuid anywhere in the tree (root included)
    pub fn find(&self, uuid: &str) -> Option<&Node> {
        self.nodes().find(|n| n.uuid() == Some(uuid))
    }

    pub fn find_mut(&mut self, uuid: &str) -> Option<&mut Node> {
        let path = self.path_of(uuid)?;
        self.node_at_mut(&path)
    }

    /// Parent of the node carrying `uuid`; `None` for the root or a missing uuid
    pub fn parent_of(&self, uuid: &str) -> Option<&Node> {
        let mut path = self.path_of(uuid)?;
        path.pop()?;
        self.node_at(&path)
    }

    /// Detach the node carrying `uuid` from its parent.
    ///
    /// Returns the detached subtree; `None` when the uuid is absent or names
    /// the root (which has no parent).
    pub fn remove(&mut self, uuid: &str) -> Option<Node> {
        let mut path = self.path_of(uuid)?;
        let index = path.pop()?;
        let parent = self.node_at_mut(&path)?;
        Some(parent.children.remove(index))
    }

    /// Child-index path from the root to the first node carrying `uuid`
    fn path_of(&self, uuid: &str) -> Option<Vec<usize>> {
        fn walk(node: &Node, uuid: &str, path: &mut Vec<usize>) -> bool {
            if node.uuid() == Some(uuid) {
                return true;
            }
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                if walk(child, uuid, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        walk(&self.root, uuid, &mut path).then_some(path)
    }

    fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(&self.root, |node, &i| node.children.get(i))
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter()
            .try_fold(&mut self.root, |node, &i| node.children.get_mut(i))
    }
}
