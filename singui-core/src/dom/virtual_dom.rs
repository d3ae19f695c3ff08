//! In-Memory Tree
//!
//! [`VirtualDom`] is a small document implementation good enough to run the
//! builder outside a browser: server-side rendering, snapshot tests, and the
//! crate's own test-suite.
//!
//! # How the Arena Works
//!
//! Nodes live in a map keyed by [`NodeId`]. Each node records its parent and
//! its ordered children, so moves are two list edits. Handles are plain ids;
//! the `VirtualDom` itself is a cheap `Rc` clone over the shared arena.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::{smallvec, SmallVec};

use super::env::{Env, Listener};
use super::error::DomError;
use super::namespace;
use super::value::Value;

/// Handle to a node of a [`VirtualDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

/// Event delivered by [`VirtualDom::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualEvent {
    pub name: String,
    pub target: NodeId,
}

/// Serializable copy of a subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Snapshot {
    Element {
        tag: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        attributes: IndexMap<String, String>,
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        properties: IndexMap<String, Value>,
        children: Vec<Snapshot>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
    Fragment {
        children: Vec<Snapshot>,
    },
}

type AttrKey = (Option<String>, String);

#[derive(Clone)]
struct ElementData {
    tag: String,
    namespace: Option<String>,
    attributes: IndexMap<AttrKey, String>,
    properties: IndexMap<String, Value>,
}

#[derive(Clone)]
enum NodeData {
    Element(ElementData),
    Text(String),
    Comment(String),
    Fragment,
}

struct VNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    listeners: Vec<(String, Listener<VirtualEvent>)>,
}

impl VNode {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            children: SmallVec::new(),
            listeners: Vec::new(),
        }
    }

    fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::Element(_) => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Comment(_) => NodeKind::Comment,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }
}

#[derive(Default)]
struct Arena {
    nodes: HashMap<NodeId, VNode>,
}

impl Arena {
    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::next();
        self.nodes.insert(id, VNode::new(data));
        id
    }

    fn node(&self, id: NodeId) -> Result<&VNode, DomError> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut VNode, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::UnknownNode(id))
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(element) => Ok(element),
            _ => Err(DomError::NotAnElement(id)),
        }
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(&id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != id);
        }
    }

    /// Drop `id` and everything below it.
    fn free(&mut self, id: NodeId) {
        self.unlink(id);
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                pending.extend(node.children);
            }
        }
    }

    /// Insert `node` under `parent`, before `reference` or at the end.
    fn insert(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.node(parent)?;
        let is_fragment = self.node(node)?.kind() == NodeKind::Fragment;
        if reference == Some(node) {
            return Ok(());
        }

        let moving: SmallVec<[NodeId; 4]> = if is_fragment {
            let children = self.node(node)?.children.clone();
            if let Some(child) = children.iter().find(|c| self.contains(**c, parent)) {
                return Err(DomError::Hierarchy { parent, child: *child });
            }
            for child in &children {
                self.unlink(*child);
            }
            children
        } else {
            if self.contains(node, parent) {
                return Err(DomError::Hierarchy { parent, child: node });
            }
            self.unlink(node);
            smallvec![node]
        };

        let siblings = &self.node(parent)?.children;
        let mut index = match reference {
            Some(r) => siblings
                .iter()
                .position(|c| *c == r)
                .ok_or(DomError::NoParent(r))?,
            None => siblings.len(),
        };
        for id in moving {
            self.node_mut(parent)?.children.insert(index, id);
            self.node_mut(id)?.parent = Some(parent);
            index += 1;
        }
        Ok(())
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Comment(_) => {}
            NodeData::Element(_) | NodeData::Fragment => {
                for child in &node.children {
                    self.text_content(*child, out);
                }
            }
        }
    }

    fn clone_subtree(&mut self, id: NodeId, deep: bool) -> Result<NodeId, DomError> {
        let (data, children) = {
            let node = self.node(id)?;
            (node.data.clone(), node.children.clone())
        };
        let copy = self.alloc(data);
        if deep {
            for child in children {
                let child_copy = self.clone_subtree(child, true)?;
                self.node_mut(copy)?.children.push(child_copy);
                self.node_mut(child_copy)?.parent = Some(copy);
            }
        }
        Ok(copy)
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(&escape(text, false)),
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Fragment => {
                for child in &node.children {
                    self.write_html(*child, out);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                out.push_str(&element.tag);
                for ((_, name), value) in &element.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
                out.push('>');
                if is_void(&element.tag) && node.children.is_empty() {
                    return;
                }
                for child in &node.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag);
                out.push('>');
            }
        }
    }

    fn snapshot(&self, id: NodeId) -> Option<Snapshot> {
        let node = self.nodes.get(&id)?;
        let children = || {
            node.children
                .iter()
                .filter_map(|c| self.snapshot(*c))
                .collect::<Vec<_>>()
        };
        Some(match &node.data {
            NodeData::Text(text) => Snapshot::Text { text: text.clone() },
            NodeData::Comment(text) => Snapshot::Comment { text: text.clone() },
            NodeData::Fragment => Snapshot::Fragment { children: children() },
            NodeData::Element(element) => Snapshot::Element {
                tag: element.tag.clone(),
                namespace: element.namespace.clone(),
                attributes: element
                    .attributes
                    .iter()
                    .map(|((_, name), value)| (name.clone(), value.clone()))
                    .collect(),
                properties: element.properties.clone(),
                children: children(),
            },
        })
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

fn valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '<' | '>' | '/' | '"' | '\'' | '='))
}

fn is_content_property(name: &str) -> bool {
    matches!(name, "textContent" | "data" | "nodeValue")
}

/// Shared in-memory document.
///
/// Clones share the same arena.
#[derive(Clone, Default)]
pub struct VirtualDom {
    arena: Rc<RefCell<Arena>>,
}

impl VirtualDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes, attached or not.
    pub fn len(&self) -> usize {
        self.arena.borrow().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.arena.borrow().nodes.get(&node).map(VNode::kind)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.to_vec())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.data {
            NodeData::Element(element) => Some(element.tag.clone()),
            _ => None,
        }
    }

    /// Resolved namespace URI of an element.
    pub fn namespace(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.data {
            NodeData::Element(element) => element.namespace.clone(),
            _ => None,
        }
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().text_content(node, &mut out);
        out
    }

    /// Call every listener registered on `node` for `event`.
    ///
    /// Returns how many listeners ran. Listeners may mutate the tree.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let listeners: Vec<Listener<VirtualEvent>> = match self.arena.borrow().nodes.get(&node) {
            Some(n) => n
                .listeners
                .iter()
                .filter(|(name, _)| name == event)
                .map(|(_, listener)| listener.clone())
                .collect(),
            None => return 0,
        };
        let payload = VirtualEvent {
            name: event.to_string(),
            target: node,
        };
        for listener in &listeners {
            listener(&payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.arena
            .borrow()
            .nodes
            .get(&node)
            .map_or(0, |n| n.listeners.iter().filter(|(name, _)| name == event).count())
    }

    /// Serialize a subtree as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().write_html(node, &mut out);
        out
    }

    pub fn snapshot(&self, node: NodeId) -> Option<Snapshot> {
        self.arena.borrow().snapshot(node)
    }

    pub fn to_json(&self, node: NodeId) -> Result<String, DomError> {
        let snapshot = self.snapshot(node).ok_or(DomError::UnknownNode(node))?;
        Ok(serde_json::to_string(&snapshot)?)
    }
}

impl fmt::Debug for VirtualDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDom").field("nodes", &self.len()).finish()
    }
}

impl Env for VirtualDom {
    type Node = NodeId;
    type Event = VirtualEvent;
    type Error = DomError;

    fn create_element(&self, tag: &str, namespace: Option<&str>) -> Result<NodeId, DomError> {
        if !valid_tag(tag) {
            return Err(DomError::InvalidTag(tag.to_string()));
        }
        Ok(self.arena.borrow_mut().alloc(NodeData::Element(ElementData {
            tag: tag.to_string(),
            namespace: namespace.map(|ns| namespace::resolve(ns).to_string()),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
        })))
    }

    fn create_text_node(&self, text: &str) -> Result<NodeId, DomError> {
        Ok(self.arena.borrow_mut().alloc(NodeData::Text(text.to_string())))
    }

    fn create_comment(&self, text: &str) -> Result<NodeId, DomError> {
        Ok(self.arena.borrow_mut().alloc(NodeData::Comment(text.to_string())))
    }

    fn create_document_fragment(&self) -> Result<NodeId, DomError> {
        Ok(self.arena.borrow_mut().alloc(NodeData::Fragment))
    }

    fn clone_element(&self, node: &NodeId, deep: bool) -> Result<NodeId, DomError> {
        self.arena.borrow_mut().clone_subtree(*node, deep)
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> Result<(), DomError> {
        self.arena.borrow_mut().insert(*parent, *child, None)
    }

    fn insert_before(&self, anchor: &NodeId, node: &NodeId) -> Result<(), DomError> {
        let mut arena = self.arena.borrow_mut();
        let parent = arena.node(*anchor)?.parent.ok_or(DomError::NoParent(*anchor))?;
        arena.insert(parent, *node, Some(*anchor))
    }

    fn insert_after(&self, anchor: &NodeId, node: &NodeId) -> Result<(), DomError> {
        let mut arena = self.arena.borrow_mut();
        let parent = arena.node(*anchor)?.parent.ok_or(DomError::NoParent(*anchor))?;
        if *anchor == *node {
            return Ok(());
        }
        let siblings = &arena.node(parent)?.children;
        let reference = siblings
            .iter()
            .position(|c| c == anchor)
            .and_then(|i| siblings.get(i + 1).copied());
        arena.insert(parent, *node, reference)
    }

    fn remove(&self, node: &NodeId) -> Result<(), DomError> {
        let mut arena = self.arena.borrow_mut();
        arena.node(*node)?;
        arena.unlink(*node);
        Ok(())
    }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(node)?.children.first().copied()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let parent = arena.nodes.get(node)?.parent?;
        let siblings = &arena.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|c| c == node)?;
        siblings.get(index + 1).copied()
    }

    fn get_attribute(&self, node: &NodeId, name: &str, namespace: Option<&str>) -> Option<String> {
        let key = (namespace.map(|ns| namespace::resolve(ns).to_string()), name.to_string());
        match &self.arena.borrow().nodes.get(node)?.data {
            NodeData::Element(element) => element.attributes.get(&key).cloned(),
            _ => None,
        }
    }

    fn set_attribute(
        &self,
        node: &NodeId,
        name: &str,
        value: &str,
        namespace: Option<&str>,
    ) -> Result<(), DomError> {
        let key = (namespace.map(|ns| namespace::resolve(ns).to_string()), name.to_string());
        self.arena
            .borrow_mut()
            .element_mut(*node)?
            .attributes
            .insert(key, value.to_string());
        Ok(())
    }

    fn remove_attribute(
        &self,
        node: &NodeId,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<(), DomError> {
        let key = (namespace.map(|ns| namespace::resolve(ns).to_string()), name.to_string());
        self.arena
            .borrow_mut()
            .element_mut(*node)?
            .attributes
            .shift_remove(&key);
        Ok(())
    }

    fn get_property(&self, node: &NodeId, name: &str) -> Option<Value> {
        let arena = self.arena.borrow();
        let vnode = arena.nodes.get(node)?;
        match &vnode.data {
            NodeData::Text(text) | NodeData::Comment(text) if is_content_property(name) => {
                Some(Value::Text(text.clone()))
            }
            NodeData::Element(_) | NodeData::Fragment if name == "textContent" => {
                let mut out = String::new();
                arena.text_content(*node, &mut out);
                Some(Value::Text(out))
            }
            NodeData::Element(element) => element.properties.get(name).cloned(),
            _ => None,
        }
    }

    fn set_property(&self, node: &NodeId, name: &str, value: Value) -> Result<(), DomError> {
        let mut arena = self.arena.borrow_mut();
        let kind = arena.node(*node)?.kind();
        match kind {
            NodeKind::Text | NodeKind::Comment if is_content_property(name) => {
                if let NodeData::Text(text) | NodeData::Comment(text) = &mut arena.node_mut(*node)?.data {
                    *text = value.to_string();
                }
                Ok(())
            }
            NodeKind::Element | NodeKind::Fragment if name == "textContent" => {
                let children = std::mem::take(&mut arena.node_mut(*node)?.children);
                for child in children {
                    arena.node_mut(child)?.parent = None;
                    arena.free(child);
                }
                let text = value.to_string();
                if !text.is_empty() {
                    let child = arena.alloc(NodeData::Text(text));
                    arena.insert(*node, child, None)?;
                }
                Ok(())
            }
            NodeKind::Element => {
                arena.element_mut(*node)?.properties.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(DomError::NotAnElement(*node)),
        }
    }

    fn add_event_listener(
        &self,
        node: &NodeId,
        event: &str,
        listener: &Listener<VirtualEvent>,
    ) -> Result<(), DomError> {
        let mut arena = self.arena.borrow_mut();
        let listeners = &mut arena.node_mut(*node)?.listeners;
        let present = listeners
            .iter()
            .any(|(name, l)| name == event && Rc::ptr_eq(l, listener));
        if !present {
            listeners.push((event.to_string(), listener.clone()));
        }
        Ok(())
    }

    fn remove_event_listener(
        &self,
        node: &NodeId,
        event: &str,
        listener: &Listener<VirtualEvent>,
    ) -> Result<(), DomError> {
        self.arena
            .borrow_mut()
            .node_mut(*node)?
            .listeners
            .retain(|(name, l)| !(name == event && Rc::ptr_eq(l, listener)));
        Ok(())
    }

    /// Frees the subtree. Unknown nodes are ignored, so disposing twice is
    /// harmless.
    fn dispose(&self, node: &NodeId) -> Result<(), DomError> {
        self.arena.borrow_mut().free(*node);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn append_moves_attached_nodes() {
        let dom = VirtualDom::new();
        let a = dom.create_element("div", None).unwrap();
        let b = dom.create_element("div", None).unwrap();
        let child = dom.create_text_node("x").unwrap();

        dom.append_child(&a, &child).unwrap();
        dom.append_child(&b, &child).unwrap();

        assert!(dom.children(a).is_empty());
        assert_eq!(dom.children(b), vec![child]);
        assert_eq!(dom.parent(child), Some(b));
    }

    #[test]
    fn fragments_are_emptied_into_their_target() {
        let dom = VirtualDom::new();
        let parent = dom.create_element("ul", None).unwrap();
        let frag = dom.create_document_fragment().unwrap();
        let one = dom.create_text_node("1").unwrap();
        let two = dom.create_text_node("2").unwrap();
        dom.append_child(&frag, &one).unwrap();
        dom.append_child(&frag, &two).unwrap();

        dom.append_child(&parent, &frag).unwrap();

        assert_eq!(dom.children(parent), vec![one, two]);
        assert!(dom.children(frag).is_empty());
        assert_eq!(dom.parent(frag), None);
    }

    #[test]
    fn sibling_insertion() {
        let dom = VirtualDom::new();
        let parent = dom.create_element("div", None).unwrap();
        let mid = dom.create_text_node("m").unwrap();
        dom.append_child(&parent, &mid).unwrap();

        let first = dom.create_text_node("a").unwrap();
        let last = dom.create_text_node("z").unwrap();
        dom.insert_before(&mid, &first).unwrap();
        dom.insert_after(&mid, &last).unwrap();

        assert_eq!(dom.children(parent), vec![first, mid, last]);
        assert_eq!(dom.next_sibling(&mid), Some(last));
        assert_eq!(dom.next_sibling(&last), None);
        assert_eq!(dom.text_content(parent), "amz");
    }

    #[test]
    fn orphan_anchor_is_an_error() {
        let dom = VirtualDom::new();
        let anchor = dom.create_text_node("").unwrap();
        let node = dom.create_text_node("x").unwrap();
        assert!(matches!(
            dom.insert_before(&anchor, &node),
            Err(DomError::NoParent(id)) if id == anchor
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let dom = VirtualDom::new();
        let outer = dom.create_element("div", None).unwrap();
        let inner = dom.create_element("div", None).unwrap();
        dom.append_child(&outer, &inner).unwrap();

        assert!(matches!(
            dom.append_child(&inner, &outer),
            Err(DomError::Hierarchy { .. })
        ));
        assert!(matches!(
            dom.append_child(&outer, &outer),
            Err(DomError::Hierarchy { .. })
        ));
    }

    #[test]
    fn invalid_tags_are_rejected() {
        let dom = VirtualDom::new();
        assert!(matches!(dom.create_element("", None), Err(DomError::InvalidTag(_))));
        assert!(matches!(dom.create_element("a b", None), Err(DomError::InvalidTag(_))));
    }

    #[test]
    fn attributes_are_namespaced() {
        let dom = VirtualDom::new();
        let el = dom.create_element("use", Some("svg")).unwrap();
        dom.set_attribute(&el, "href", "#a", Some("xlink")).unwrap();
        dom.set_attribute(&el, "href", "#b", None).unwrap();

        assert_eq!(dom.namespace(el).as_deref(), Some(namespace::SVG));
        assert_eq!(dom.get_attribute(&el, "href", Some(namespace::XLINK)).as_deref(), Some("#a"));
        assert_eq!(dom.get_attribute(&el, "href", None).as_deref(), Some("#b"));

        dom.remove_attribute(&el, "href", Some("xlink")).unwrap();
        assert_eq!(dom.get_attribute(&el, "href", Some("xlink")), None);
        assert_eq!(dom.get_attribute(&el, "href", None).as_deref(), Some("#b"));
    }

    #[test]
    fn text_content_property() {
        let dom = VirtualDom::new();
        let el = dom.create_element("p", None).unwrap();
        let old = dom.create_element("b", None).unwrap();
        dom.append_child(&el, &old).unwrap();

        dom.set_property(&el, "textContent", Value::from(42)).unwrap();

        assert_eq!(dom.children(el).len(), 1);
        assert_eq!(dom.kind(old), None);
        assert_eq!(dom.get_property(&el, "textContent"), Some(Value::from("42")));

        let text = dom.children(el)[0];
        dom.set_property(&text, "data", Value::from("x")).unwrap();
        assert_eq!(dom.text_content(el), "x");
    }

    #[test]
    fn other_properties_are_stored() {
        let dom = VirtualDom::new();
        let input = dom.create_element("input", None).unwrap();
        assert_eq!(dom.get_property(&input, "value"), None);
        dom.set_property(&input, "value", Value::from("abc")).unwrap();
        assert_eq!(dom.get_property(&input, "value"), Some(Value::from("abc")));

        let text = dom.create_text_node("t").unwrap();
        assert!(matches!(
            dom.set_property(&text, "value", Value::Null),
            Err(DomError::NotAnElement(_))
        ));
    }

    #[test]
    fn listeners_dispatch_and_remove_by_identity() {
        let dom = VirtualDom::new();
        let button = dom.create_element("button", None).unwrap();
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let listener: Listener<VirtualEvent> = Rc::new(move |ev: &VirtualEvent| {
            assert_eq!(ev.name, "click");
            counter.set(counter.get() + 1);
        });

        dom.add_event_listener(&button, "click", &listener).unwrap();
        dom.add_event_listener(&button, "click", &listener).unwrap();
        assert_eq!(dom.dispatch(button, "click"), 1);
        assert_eq!(dom.dispatch(button, "input"), 0);

        dom.remove_event_listener(&button, "click", &listener).unwrap();
        assert_eq!(dom.dispatch(button, "click"), 0);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn deep_clone_copies_the_subtree() {
        let dom = VirtualDom::new();
        let el = dom.create_element("div", None).unwrap();
        dom.set_attribute(&el, "class", "c", None).unwrap();
        let text = dom.create_text_node("t").unwrap();
        dom.append_child(&el, &text).unwrap();

        let shallow = dom.clone_element(&el, false).unwrap();
        let deep = dom.clone_element(&el, true).unwrap();

        assert!(dom.children(shallow).is_empty());
        assert_eq!(dom.get_attribute(&shallow, "class", None).as_deref(), Some("c"));
        assert_eq!(dom.text_content(deep), "t");
        assert_ne!(dom.children(deep)[0], text);
    }

    #[test]
    fn html_and_json_output() {
        let dom = VirtualDom::new();
        let el = dom.create_element("a", None).unwrap();
        dom.set_attribute(&el, "title", "\"q\"", None).unwrap();
        let text = dom.create_text_node("1 < 2").unwrap();
        let br = dom.create_element("br", None).unwrap();
        let anchor = dom.create_text_node("").unwrap();
        dom.append_child(&el, &text).unwrap();
        dom.append_child(&el, &br).unwrap();
        dom.append_child(&el, &anchor).unwrap();

        assert_eq!(dom.to_html(el), "<a title=\"&quot;q&quot;\">1 &lt; 2<br></a>");

        let json: serde_json::Value = serde_json::from_str(&dom.to_json(el).unwrap()).unwrap();
        assert_eq!(json["kind"], "element");
        assert_eq!(json["tag"], "a");
        assert_eq!(json["children"][0]["text"], "1 < 2");
    }

    #[test]
    fn remove_keeps_the_node_and_dispose_frees_it() {
        let dom = VirtualDom::new();
        let list = dom.create_element("ul", None).unwrap();
        let item = dom.create_element("li", None).unwrap();
        let text = dom.create_text_node("x").unwrap();
        dom.append_child(&list, &item).unwrap();
        dom.append_child(&item, &text).unwrap();
        assert_eq!(dom.first_child(&list), Some(item));

        dom.remove(&item).unwrap();
        assert_eq!(dom.first_child(&list), None);
        assert_eq!(dom.parent(text), Some(item));
        dom.remove(&item).unwrap();

        dom.dispose(&item).unwrap();
        assert_eq!(dom.len(), 1);
        assert_eq!(dom.kind(text), None);
        dom.dispose(&item).unwrap();
    }
}
