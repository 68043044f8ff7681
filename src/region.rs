use crate::error::{Result, TreeError};
use crate::host::{HostId, HostTree};
use crate::stage::LazySubtree;
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

const OPEN_PREFIX: &str = " text: ";
const CLOSE_PAYLOAD: &str = " /text ";

fn open_payload(id: u32) -> SmartString<LazyCompact> {
    format!("{OPEN_PREFIX}{id} ").into()
}

/// Monotonic marker-id allocator, one per owning container.
#[derive(Debug, Default)]
pub struct MarkerIds {
    next: u32,
}

impl MarkerIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// A text run held between two permanent marker nodes.
///
/// The region owns every node strictly between its markers; content is
/// always rebuilt as a single node on replace, never edited in place.
/// Regions do not nest, so a forward scan stops at the first close marker.
#[derive(Debug, Clone)]
pub struct TextRegion {
    id: u32,
    open: HostId,
    close: Option<HostId>,
}

impl TextRegion {
    /// Makes both markers (and one content node when `text` is non-empty) and
    /// returns the region plus the staged nodes in host order, unattached.
    pub fn create<H: HostTree>(
        host: &mut H,
        ids: &mut MarkerIds,
        text: &str,
    ) -> (Self, SmallVec<[HostId; 3]>) {
        let id = ids.next_id();
        let open = host.create_marker_node(&open_payload(id));
        let close = host.create_marker_node(CLOSE_PAYLOAD);
        let mut staged = SmallVec::new();
        staged.push(open);
        if !text.is_empty() {
            staged.push(host.create_text_node(text));
        }
        staged.push(close);
        (
            Self {
                id,
                open,
                close: Some(close),
            },
            staged,
        )
    }

    /// Like [`create`](Self::create), but wraps the staged nodes in a
    /// fragment-rooted lazy subtree so the region mounts as one unit.
    pub fn create_staged<H: HostTree>(
        host: &mut H,
        ids: &mut MarkerIds,
        text: &str,
    ) -> Result<(Self, LazySubtree)> {
        let (region, staged) = Self::create(host, ids, text);
        let mut tree = LazySubtree::new(host.create_fragment());
        for node in staged {
            tree.queue_child(node)?;
        }
        Ok((region, tree))
    }

    /// Rebuilds a region handle from a bare open-marker node. The close
    /// marker is found by [`locate`](Self::locate) on first use.
    pub fn from_open<H: HostTree>(host: &H, open: HostId) -> Result<Self> {
        let id = host
            .marker_payload(open)
            .and_then(|payload| payload.strip_prefix(OPEN_PREFIX))
            .and_then(|rest| rest.trim().parse::<u32>().ok())
            .ok_or(TreeError::MissingCloseMarker { marker: open })?;
        Ok(Self {
            id,
            open,
            close: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn open(&self) -> HostId {
        self.open
    }

    /// Scans forward siblings from the open marker until the matching close
    /// marker. Markers never move, so the result is cached.
    pub fn locate<H: HostTree>(&mut self, host: &H) -> Result<HostId> {
        if let Some(close) = self.close {
            return Ok(close);
        }
        let mut cursor = host.next_sibling(self.open);
        while let Some(node) = cursor {
            if host.marker_payload(node) == Some(CLOSE_PAYLOAD) {
                self.close = Some(node);
                return Ok(node);
            }
            cursor = host.next_sibling(node);
        }
        Err(TreeError::MissingCloseMarker { marker: self.open })
    }

    /// Nodes strictly between the markers, in host order.
    pub fn content_nodes<H: HostTree>(&mut self, host: &H) -> Result<SmallVec<[HostId; 2]>> {
        let close = self.locate(host)?;
        let mut nodes = SmallVec::new();
        let mut cursor = host.next_sibling(self.open);
        loop {
            let node = cursor.ok_or(TreeError::MissingCloseMarker { marker: self.open })?;
            if node == close {
                return Ok(nodes);
            }
            nodes.push(node);
            cursor = host.next_sibling(node);
        }
    }

    /// Replaces the run in place: removes every node strictly between the
    /// markers, then holds `text` as one fresh content node (none when
    /// `text` is empty). The markers themselves are untouched.
    pub fn replace<H: HostTree>(&mut self, host: &mut H, text: &str) -> Result<()> {
        let close = self.locate(host)?;
        let parent = host
            .parent(self.open)
            .ok_or(TreeError::MissingCloseMarker { marker: self.open })?;
        let existing = self.content_nodes(host)?;
        if existing.is_empty() && text.is_empty() {
            return Ok(());
        }
        for node in existing {
            host.remove_child(parent, node);
        }
        if !text.is_empty() {
            let content = host.create_text_node(text);
            host.insert_before(parent, content, Some(close));
        }
        Ok(())
    }

    pub fn clear<H: HostTree>(&mut self, host: &mut H) -> Result<()> {
        self.replace(host, "")
    }
}
