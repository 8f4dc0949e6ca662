//! Screen pages
//!
//! A page is an ordered list of node handles plus the encoder focus slots
//! and lifecycle hooks used when it is opened.

use heapless::{String, Vec};
use minipanel_protocol::ENCODER_COUNT;

use crate::node::{NodeId, MAX_NAME_LEN};

/// Maximum nodes on one page
pub const MAX_NODES_PAGE: usize = 32;

/// Maximum focus groups per page
pub const MAX_FOCUS_GROUPS: usize = 4;

/// Maximum title / surface name length
pub const MAX_TITLE_LEN: usize = 16;

/// Default text colour (white, RGB565)
pub const DEFAULT_TEXT_COLOR: u16 = 65535;

/// Handle into the catalog page arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageId(pub u8);

impl PageId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Modal program behind a modal page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModalKind {
    TestPad,
    DataMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageKind {
    #[default]
    User,
    Modal(ModalKind),
}

/// Hook run after the page surface is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EntryHook {
    /// Fill the overflow grid buttons from the profile
    OverflowGrid,
    /// Run the primary op of every system-op node
    PrimeSystemOps,
}

/// Encoder focus assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FocusGroup {
    /// Rotation targets
    pub enc: [Option<NodeId>; ENCODER_COUNT],
    /// Push targets
    pub push: [Option<NodeId>; ENCODER_COUNT],
    /// Long-press targets
    pub long: [Option<NodeId>; ENCODER_COUNT],
}

impl FocusGroup {
    /// True if `node` is a rotation target of any encoder
    pub fn is_attached(&self, node: NodeId) -> bool {
        self.enc.iter().any(|n| *n == Some(node))
    }
}

/// Page errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageError {
    /// Node list is full; the node was dropped
    Overflow,
    /// Range end precedes its start
    InvalidRange,
    /// Too many focus groups
    TooManyGroups,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Catalog name
    pub name: String<MAX_NAME_LEN>,
    /// Title shown on the sidebar and overflow grid
    pub title: String<MAX_TITLE_LEN>,
    /// Display surface name (`page <surface>`)
    pub surface: String<MAX_TITLE_LEN>,
    pub text_color: u16,
    pub kind: PageKind,
    nodes: Vec<NodeId, MAX_NODES_PAGE>,
    /// Current encoder assignment
    pub focus: FocusGroup,
    /// Configured assignments; group 0 is the default focus
    pub focus_groups: Vec<FocusGroup, MAX_FOCUS_GROUPS>,
    pub entry: Option<EntryHook>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            text_color: DEFAULT_TEXT_COLOR,
            ..Self::default()
        }
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn is_modal(&self) -> bool {
        matches!(self.kind, PageKind::Modal(_))
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Append a node
    ///
    /// Fails with [`PageError::Overflow`] when full; the node is dropped.
    pub fn add_node(&mut self, node: NodeId) -> Result<(), PageError> {
        self.nodes.push(node).map_err(|_| PageError::Overflow)
    }

    /// Append the inclusive range `first..=last`
    ///
    /// Nodes that fit are kept even when the range overflows.
    pub fn add_nodes(&mut self, first: NodeId, last: NodeId) -> Result<(), PageError> {
        if last < first {
            return Err(PageError::InvalidRange);
        }
        let mut result = Ok(());
        for id in first.0..=last.0 {
            if self.add_node(NodeId(id)).is_err() {
                result = Err(PageError::Overflow);
            }
        }
        result
    }

    /// Copy all attributes and the node list from `template`
    ///
    /// The catalog name is kept.
    pub fn clone_from_template(&mut self, template: &Page) {
        let name = core::mem::take(&mut self.name);
        *self = template.clone();
        self.name = name;
    }

    /// Set a configured focus group
    pub fn set_focus_group(&mut self, index: usize, group: FocusGroup) -> Result<(), PageError> {
        if index >= MAX_FOCUS_GROUPS {
            return Err(PageError::TooManyGroups);
        }
        while self.focus_groups.len() <= index {
            self.focus_groups
                .push(FocusGroup::default())
                .map_err(|_| PageError::TooManyGroups)?;
        }
        self.focus_groups[index] = group;
        Ok(())
    }

    /// Make configured group `index` current
    ///
    /// Returns false if the page has no such group.
    pub fn apply_focus_group(&mut self, index: usize) -> bool {
        match self.focus_groups.get(index) {
            Some(group) => {
                self.focus = *group;
                true
            }
            None => false,
        }
    }
}
