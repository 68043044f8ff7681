use crate::apply::{UpdateInstruction, apply};
use crate::error::Result;
use crate::host::{HostId, HostTree};
use crate::region::{MarkerIds, TextRegion};
use crate::stage::LazySubtree;
use smartstring::{LazyCompact, SmartString};
use std::collections::HashMap;
use std::mem;
use tracing::{debug, warn};

/// Identity of one mounted logical node, allocated per container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId(pub(crate) u32);

/// Receives retirement notifications when logical nodes unmount.
pub trait Environment {
    fn on_node_retired(&mut self, id: LogicalId);
}

impl Environment for () {
    fn on_node_retired(&mut self, _id: LogicalId) {}
}

/// Per-root mount state: marker-id allocation and the explicit
/// `LogicalId -> HostId` registry. Lifetime is tied to the root the
/// container serves; `teardown` drops every mapping at once.
pub struct Container {
    markers: MarkerIds,
    next_logical: u32,
    instances: HashMap<LogicalId, HostId>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            markers: MarkerIds::new(),
            next_logical: 0,
            instances: HashMap::new(),
        }
    }

    pub(crate) fn markers_mut(&mut self) -> &mut MarkerIds {
        &mut self.markers
    }

    pub(crate) fn alloc(&mut self, host: HostId) -> LogicalId {
        let id = LogicalId(self.next_logical);
        self.next_logical += 1;
        self.instances.insert(id, host);
        id
    }

    pub(crate) fn retire(&mut self, id: LogicalId) -> Option<HostId> {
        self.instances.remove(&id)
    }

    pub fn host_of(&self, id: LogicalId) -> Option<HostId> {
        self.instances.get(&id).copied()
    }

    pub fn mounted(&self) -> usize {
        self.instances.len()
    }

    pub fn teardown(&mut self) {
        self.instances.clear();
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

/// Description of one logical element.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub kind: SmartString<LazyCompact>,
    pub key: SmartString<LazyCompact>,
    pub content: Content,
}

#[derive(Debug, Clone)]
pub enum Content {
    Empty,
    Text(SmartString<LazyCompact>),
    Children(Vec<ChildSpec>),
}

#[derive(Debug, Clone)]
pub enum ChildSpec {
    Element(NodeSpec),
    Text {
        key: SmartString<LazyCompact>,
        text: SmartString<LazyCompact>,
    },
}

impl ChildSpec {
    pub fn key(&self) -> &str {
        match self {
            ChildSpec::Element(spec) => &spec.key,
            ChildSpec::Text { key, .. } => key,
        }
    }
}

/// A mounted text item: its current run and the delimited region holding it.
#[derive(Debug)]
pub struct TextLeaf {
    id: LogicalId,
    key: SmartString<LazyCompact>,
    text: SmartString<LazyCompact>,
    region: TextRegion,
}

impl TextLeaf {
    pub fn id(&self) -> LogicalId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn open_marker(&self) -> HostId {
        self.region.open()
    }

    /// Records the run the host tree now holds; the host-side replacement
    /// itself travels as a `TextUpdate` instruction.
    pub fn set_text(&mut self, text: SmartString<LazyCompact>) {
        self.text = text;
    }

    fn unmount<H: HostTree, E: Environment>(
        mut self,
        safely: bool,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<()> {
        if let Err(err) = self.region.clear(scope.host) {
            if safely {
                warn!(%err, "ignoring host failure during safe unmount");
            } else {
                return Err(err);
            }
        }
        scope.container.retire(self.id);
        scope.env.on_node_retired(self.id);
        Ok(())
    }
}

#[derive(Debug)]
pub enum MountedChild {
    Element(ElementNode),
    Text(TextLeaf),
}

impl MountedChild {
    pub fn key(&self) -> &str {
        match self {
            MountedChild::Element(node) => &node.key,
            MountedChild::Text(leaf) => &leaf.key,
        }
    }

    /// Host node future siblings anchor on when inserted after this child:
    /// an element's own node, a text leaf's close marker.
    pub fn anchor<H: HostTree>(&mut self, host: &H) -> Result<HostId> {
        match self {
            MountedChild::Element(node) => Ok(node.host),
            MountedChild::Text(leaf) => leaf.region.locate(host),
        }
    }

    /// Emits the instructions that relocate this child after `anchor` and
    /// returns the new anchor. A text leaf moves as its whole delimited run,
    /// marker pair included.
    pub fn move_ops<H: HostTree>(
        &mut self,
        host: &H,
        anchor: Option<HostId>,
        out: &mut Vec<UpdateInstruction>,
    ) -> Result<HostId> {
        match self {
            MountedChild::Element(node) => {
                out.push(UpdateInstruction::Move {
                    node: node.host,
                    after: anchor,
                });
                Ok(node.host)
            }
            MountedChild::Text(leaf) => {
                let open = leaf.region.open();
                let content = leaf.region.content_nodes(host)?;
                let close = leaf.region.locate(host)?;
                out.push(UpdateInstruction::Move {
                    node: open,
                    after: anchor,
                });
                let mut last = open;
                for node in content {
                    out.push(UpdateInstruction::Move {
                        node,
                        after: Some(last),
                    });
                    last = node;
                }
                out.push(UpdateInstruction::Move {
                    node: close,
                    after: Some(last),
                });
                Ok(close)
            }
        }
    }
}

/// Borrowed collaborators threaded through one mount/update/unmount call.
pub struct MountScope<'a, H: HostTree, E: Environment> {
    pub host: &'a mut H,
    pub container: &'a mut Container,
    pub env: &'a mut E,
}

impl<'a, H: HostTree, E: Environment> MountScope<'a, H, E> {
    pub fn new(host: &'a mut H, container: &'a mut Container, env: &'a mut E) -> Self {
        Self {
            host,
            container,
            env,
        }
    }

    /// Builds a fresh child as a staged unit ready for a single attach.
    pub fn mount_child(&mut self, spec: &ChildSpec) -> Result<(MountedChild, LazySubtree)> {
        match spec {
            ChildSpec::Element(spec) => {
                let (node, tree) = ElementNode::build(spec, self)?;
                Ok((MountedChild::Element(node), tree))
            }
            ChildSpec::Text { key, text } => {
                let (region, tree) =
                    TextRegion::create_staged(self.host, self.container.markers_mut(), text)?;
                let id = self.container.alloc(region.open());
                Ok((
                    MountedChild::Text(TextLeaf {
                        id,
                        key: key.clone(),
                        text: text.clone(),
                        region,
                    }),
                    tree,
                ))
            }
        }
    }

    /// Unmounts a child that fell out of the list and emits the `Remove`
    /// instructions that detach its host nodes. Text-leaf content is cleared
    /// through the region before its markers are named for removal.
    pub fn remove_child_ops(
        &mut self,
        child: MountedChild,
        out: &mut Vec<UpdateInstruction>,
    ) -> Result<()> {
        match child {
            MountedChild::Element(node) => {
                out.push(UpdateInstruction::Remove { node: node.host });
                node.unmount(false, self)?;
            }
            MountedChild::Text(mut leaf) => {
                let open = leaf.region.open();
                let close = leaf.region.locate(self.host)?;
                out.push(UpdateInstruction::Remove { node: open });
                out.push(UpdateInstruction::Remove { node: close });
                leaf.unmount(false, self)?;
            }
        }
        Ok(())
    }
}

/// External diffing collaborator: turns previous mounted children plus next
/// child specs into the new child list and the instruction batch that
/// realizes it. The batch is trusted as ordered and correct.
pub trait ChildDiffer<H: HostTree, E: Environment> {
    fn diff(
        &mut self,
        scope: &mut MountScope<'_, H, E>,
        parent: HostId,
        prev: Vec<MountedChild>,
        next: &[ChildSpec],
    ) -> Result<(Vec<MountedChild>, Vec<UpdateInstruction>)>;
}

#[derive(Debug)]
enum Mode {
    Empty,
    Content {
        region: TextRegion,
        text: SmartString<LazyCompact>,
    },
    Children(Vec<MountedChild>),
}

/// One host-bearing logical node: owns its host handle and either a text
/// region or a list of mounted children, never both.
#[derive(Debug)]
pub struct ElementNode {
    id: LogicalId,
    kind: SmartString<LazyCompact>,
    key: SmartString<LazyCompact>,
    host: HostId,
    mode: Mode,
}

impl ElementNode {
    /// Builds and materializes the whole subtree in one attach, returning the
    /// mounted node. Attaching the returned host node to its parent is the
    /// caller's responsibility.
    pub fn mount<H: HostTree, E: Environment>(
        spec: &NodeSpec,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<Self> {
        let (node, mut tree) = Self::build(spec, scope)?;
        tree.materialize(scope.host)?;
        debug!(id = node.id.0, kind = %node.kind, "mounted element");
        Ok(node)
    }

    fn build<H: HostTree, E: Environment>(
        spec: &NodeSpec,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<(Self, LazySubtree)> {
        let host_node = scope.host.create_node(&spec.kind);
        let id = scope.container.alloc(host_node);
        let mut tree = LazySubtree::new(host_node);
        let mode = match &spec.content {
            Content::Empty => Mode::Empty,
            Content::Text(text) => {
                let (region, staged) =
                    TextRegion::create(scope.host, scope.container.markers_mut(), text);
                for node in staged {
                    tree.queue_child(node)?;
                }
                Mode::Content {
                    region,
                    text: text.clone(),
                }
            }
            Content::Children(specs) => {
                let mut kids = Vec::with_capacity(specs.len());
                for child_spec in specs {
                    let (child, staged) = scope.mount_child(child_spec)?;
                    tree.queue_child(staged)?;
                    kids.push(child);
                }
                Mode::Children(kids)
            }
        };
        Ok((
            Self {
                id,
                kind: spec.kind.clone(),
                key: spec.key.clone(),
                host: host_node,
                mode,
            },
            tree,
        ))
    }

    pub fn id(&self) -> LogicalId {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn host_node(&self) -> HostId {
        self.host
    }

    pub fn children(&self) -> Option<&[MountedChild]> {
        match &self.mode {
            Mode::Children(kids) => Some(kids),
            _ => None,
        }
    }

    pub fn content_text(&self) -> Option<&str> {
        match &self.mode {
            Mode::Content { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Reconciles this node against its next description. Mode switches tear
    /// the previous representation down completely before the new one is
    /// established; the transitions are exhaustive by construction.
    pub fn update<H: HostTree, E: Environment, D: ChildDiffer<H, E>>(
        &mut self,
        next: &NodeSpec,
        scope: &mut MountScope<'_, H, E>,
        differ: &mut D,
    ) -> Result<()> {
        debug_assert_eq!(self.kind, next.kind, "update must preserve node identity");
        let mode = mem::replace(&mut self.mode, Mode::Empty);
        self.mode = match (mode, &next.content) {
            (Mode::Children(prev), Content::Children(specs)) => {
                let (kids, batch) = differ.diff(scope, self.host, prev, specs)?;
                apply(scope.host, self.host, batch)?;
                Mode::Children(kids)
            }
            (Mode::Children(prev), Content::Text(text)) => {
                self.clear_children(prev, scope)?;
                let region = self.attach_region(text, scope)?;
                Mode::Content {
                    region,
                    text: text.clone(),
                }
            }
            (Mode::Children(prev), Content::Empty) => {
                self.clear_children(prev, scope)?;
                Mode::Empty
            }
            (
                Mode::Content {
                    mut region,
                    text: prev_text,
                },
                Content::Text(text),
            ) => {
                if prev_text != *text {
                    region.replace(scope.host, text)?;
                }
                Mode::Content {
                    region,
                    text: text.clone(),
                }
            }
            (Mode::Content { mut region, .. }, Content::Empty) => {
                // The run is emptied; the markers stay for the region's
                // lifetime.
                region.clear(scope.host)?;
                Mode::Content {
                    region,
                    text: SmartString::new(),
                }
            }
            (Mode::Content { region, .. }, Content::Children(specs)) => {
                self.teardown_region(region, scope)?;
                let (kids, batch) = differ.diff(scope, self.host, Vec::new(), specs)?;
                apply(scope.host, self.host, batch)?;
                Mode::Children(kids)
            }
            (Mode::Empty, Content::Text(text)) => {
                let region = self.attach_region(text, scope)?;
                Mode::Content {
                    region,
                    text: text.clone(),
                }
            }
            (Mode::Empty, Content::Children(specs)) => {
                let (kids, batch) = differ.diff(scope, self.host, Vec::new(), specs)?;
                apply(scope.host, self.host, batch)?;
                Mode::Children(kids)
            }
            (Mode::Empty, Content::Empty) => Mode::Empty,
        };
        Ok(())
    }

    fn clear_children<H: HostTree, E: Environment>(
        &self,
        kids: Vec<MountedChild>,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<()> {
        let mut batch = Vec::with_capacity(kids.len());
        for child in kids {
            scope.remove_child_ops(child, &mut batch)?;
        }
        apply(scope.host, self.host, batch)
    }

    fn attach_region<H: HostTree, E: Environment>(
        &self,
        text: &str,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<TextRegion> {
        let (region, mut staged) =
            TextRegion::create_staged(scope.host, scope.container.markers_mut(), text)?;
        let fragment = staged.materialize(scope.host)?;
        scope.host.insert_before(self.host, fragment, None);
        Ok(region)
    }

    fn teardown_region<H: HostTree, E: Environment>(
        &self,
        mut region: TextRegion,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<()> {
        region.clear(scope.host)?;
        let close = region.locate(scope.host)?;
        apply(
            scope.host,
            self.host,
            vec![
                UpdateInstruction::Remove {
                    node: region.open(),
                },
                UpdateInstruction::Remove { node: close },
            ],
        )
    }

    /// Terminal teardown: recursively unmounts children or clears the text
    /// region, retires the logical id, and notifies the environment.
    /// Detaching this node's own host node is the parent's responsibility.
    /// `safely` downgrades host-side failures from nodes an ancestor already
    /// removed.
    pub fn unmount<H: HostTree, E: Environment>(
        self,
        safely: bool,
        scope: &mut MountScope<'_, H, E>,
    ) -> Result<()> {
        debug!(id = self.id.0, kind = %self.kind, "unmounting element");
        match self.mode {
            Mode::Children(kids) => {
                for child in kids {
                    match child {
                        MountedChild::Element(node) => node.unmount(safely, scope)?,
                        MountedChild::Text(leaf) => leaf.unmount(safely, scope)?,
                    }
                }
            }
            Mode::Content { mut region, .. } => {
                if let Err(err) = region.clear(scope.host) {
                    if safely {
                        warn!(%err, "ignoring host failure during safe unmount");
                    } else {
                        return Err(err);
                    }
                }
            }
            Mode::Empty => {}
        }
        scope.container.retire(self.id);
        scope.env.on_node_retired(self.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::InsertContent;
    use crate::error::TreeError;
    use crate::host::{MemoryTree, NodeKind};

    /// Keyed differ that re-anchors every kept child at its next position.
    struct ReanchorDiffer;

    impl<H: HostTree, E: Environment> ChildDiffer<H, E> for ReanchorDiffer {
        fn diff(
            &mut self,
            scope: &mut MountScope<'_, H, E>,
            _parent: HostId,
            prev: Vec<MountedChild>,
            next: &[ChildSpec],
        ) -> Result<(Vec<MountedChild>, Vec<UpdateInstruction>)> {
            let mut leftover: Vec<Option<MountedChild>> = prev.into_iter().map(Some).collect();
            let mut batch = Vec::new();
            let mut kids = Vec::with_capacity(next.len());
            let mut anchor: Option<HostId> = None;
            for spec in next {
                let slot = leftover
                    .iter_mut()
                    .find(|s| s.as_ref().is_some_and(|c| c.key() == spec.key()));
                match slot {
                    Some(slot) => {
                        let mut child = slot.take().unwrap();
                        anchor = Some(child.move_ops(scope.host, anchor, &mut batch)?);
                        match (&mut child, spec) {
                            (MountedChild::Text(leaf), ChildSpec::Text { text, .. }) => {
                                if leaf.text() != text.as_str() {
                                    batch.push(UpdateInstruction::TextUpdate {
                                        node: leaf.open_marker(),
                                        text: text.clone(),
                                    });
                                    leaf.set_text(text.clone());
                                }
                            }
                            (MountedChild::Element(el), ChildSpec::Element(s)) => {
                                el.update(s, scope, self)?;
                            }
                            _ => {}
                        }
                        kids.push(child);
                    }
                    None => {
                        let (mut child, staged) = scope.mount_child(spec)?;
                        batch.push(UpdateInstruction::Insert {
                            content: InsertContent::Subtree(staged),
                            after: anchor,
                        });
                        anchor = Some(child.anchor(scope.host)?);
                        kids.push(child);
                    }
                }
            }
            for child in leftover.into_iter().flatten() {
                scope.remove_child_ops(child, &mut batch)?;
            }
            Ok((kids, batch))
        }
    }

    #[derive(Default)]
    struct RecordingEnv {
        retired: Vec<LogicalId>,
    }

    impl Environment for RecordingEnv {
        fn on_node_retired(&mut self, id: LogicalId) {
            self.retired.push(id);
        }
    }

    fn element(kind: &str, key: &str, content: Content) -> NodeSpec {
        NodeSpec {
            kind: kind.into(),
            key: key.into(),
            content,
        }
    }

    fn text_child(key: &str, text: &str) -> ChildSpec {
        ChildSpec::Text {
            key: key.into(),
            text: text.into(),
        }
    }

    #[test]
    fn test_mount_empty_element() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(&element("box", "root", Content::Empty), &mut scope).unwrap();

        assert!(host.children_of(node.host_node()).is_empty());
        assert_eq!(container.host_of(node.id()), Some(node.host_node()));
    }

    #[test]
    fn test_mount_content_creates_region() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(
            &element("label", "root", Content::Text("hi".into())),
            &mut scope,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 3);
        assert!(matches!(host.kind_of(children[0]), Some(NodeKind::Marker(_))));
        assert_eq!(host.text_of(children[1]), Some("hi"));
        assert!(matches!(host.kind_of(children[2]), Some(NodeKind::Marker(_))));
        assert_eq!(node.content_text(), Some("hi"));
    }

    #[test]
    fn test_mount_children_attaches_in_spec_order() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(
            &element(
                "list",
                "root",
                Content::Children(vec![
                    ChildSpec::Element(element("item", "x", Content::Empty)),
                    ChildSpec::Element(element("item", "y", Content::Empty)),
                ]),
            ),
            &mut scope,
        )
        .unwrap();

        let kids = node.children().unwrap();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].key(), "x");
        assert_eq!(host.children_of(node.host_node()).len(), 2);
    }

    #[test]
    fn test_update_text_content_in_place() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node = ElementNode::mount(
            &element("label", "root", Content::Text("old".into())),
            &mut scope,
        )
        .unwrap();
        node.update(
            &element("label", "root", Content::Text("new".into())),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(host.text_of(children[1]), Some("new"));
        assert_eq!(node.content_text(), Some("new"));
    }

    #[test]
    fn test_update_content_to_empty_keeps_markers() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node = ElementNode::mount(
            &element("label", "root", Content::Text("gone".into())),
            &mut scope,
        )
        .unwrap();
        node.update(
            &element("label", "root", Content::Empty),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 2);
        assert!(matches!(host.kind_of(children[0]), Some(NodeKind::Marker(_))));
        assert_eq!(node.content_text(), Some(""));
    }

    #[test]
    fn test_update_empty_to_content_attaches_region() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node =
            ElementNode::mount(&element("label", "root", Content::Empty), &mut scope).unwrap();
        node.update(
            &element("label", "root", Content::Text("born".into())),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(host.text_of(children[1]), Some("born"));
    }

    #[test]
    fn test_update_children_to_content_tears_down_first() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = RecordingEnv::default();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node = ElementNode::mount(
            &element(
                "box",
                "root",
                Content::Children(vec![text_child("a", "a")]),
            ),
            &mut scope,
        )
        .unwrap();
        node.update(
            &element("box", "root", Content::Text("hello".into())),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 3);
        assert_eq!(host.text_of(children[1]), Some("hello"));
        assert_eq!(env.retired.len(), 1);
    }

    #[test]
    fn test_update_content_to_children_removes_markers() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node = ElementNode::mount(
            &element("box", "root", Content::Text("was text".into())),
            &mut scope,
        )
        .unwrap();
        node.update(
            &element(
                "box",
                "root",
                Content::Children(vec![ChildSpec::Element(element(
                    "item",
                    "only",
                    Content::Empty,
                ))]),
            ),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        let children = host.children_of(node.host_node()).to_vec();
        assert_eq!(children.len(), 1);
        assert!(matches!(
            host.kind_of(children[0]),
            Some(NodeKind::Element(_))
        ));
    }

    #[test]
    fn test_update_children_to_empty_unmounts_all() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = RecordingEnv::default();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        let mut differ = ReanchorDiffer;

        let mut node = ElementNode::mount(
            &element(
                "list",
                "root",
                Content::Children(vec![text_child("a", "a"), text_child("b", "b")]),
            ),
            &mut scope,
        )
        .unwrap();
        node.update(
            &element("list", "root", Content::Empty),
            &mut scope,
            &mut differ,
        )
        .unwrap();

        assert!(host.children_of(node.host_node()).is_empty());
        assert_eq!(env.retired.len(), 2);
    }

    #[test]
    fn test_unmount_retires_whole_subtree() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = RecordingEnv::default();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(
            &element(
                "list",
                "root",
                Content::Children(vec![
                    text_child("a", "a"),
                    ChildSpec::Element(element("item", "b", Content::Text("t".into()))),
                ]),
            ),
            &mut scope,
        )
        .unwrap();

        assert_eq!(scope.container.mounted(), 3);
        node.unmount(false, &mut scope).unwrap();
        assert_eq!(scope.container.mounted(), 0);
        assert_eq!(env.retired.len(), 3);
    }

    #[test]
    fn test_unsafe_unmount_propagates_corruption() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = ();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(
            &element("label", "root", Content::Text("t".into())),
            &mut scope,
        )
        .unwrap();
        let close = *host.children_of(node.host_node()).last().unwrap();
        host.remove_child(node.host_node(), close);
        host.reclaim(close);

        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        assert!(matches!(
            node.unmount(false, &mut scope),
            Err(TreeError::MissingCloseMarker { .. })
        ));
    }

    #[test]
    fn test_safe_unmount_swallows_corruption() {
        let mut host = MemoryTree::new();
        let mut container = Container::new();
        let mut env = RecordingEnv::default();
        let mut scope = MountScope::new(&mut host, &mut container, &mut env);

        let node = ElementNode::mount(
            &element("label", "root", Content::Text("t".into())),
            &mut scope,
        )
        .unwrap();
        let close = *host.children_of(node.host_node()).last().unwrap();
        host.remove_child(node.host_node(), close);
        host.reclaim(close);

        let mut scope = MountScope::new(&mut host, &mut container, &mut env);
        node.unmount(true, &mut scope).unwrap();
        assert_eq!(env.retired.len(), 1);
        assert_eq!(container.mounted(), 0);
    }
}
