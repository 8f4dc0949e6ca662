//! Node, page and profile catalog
//!
//! Arena storage: nodes and pages live in fixed-capacity vectors and are
//! addressed everywhere by [`NodeId`] / [`PageId`]. An out-of-range handle
//! resolves to `None`, so a stale reference is always a no-op.

pub mod loader;

pub use loader::{LoadError, LoadErrorKind};

use heapless::{String, Vec};
use minipanel_protocol::SIDEBAR_SLOTS;

use crate::node::{Node, NodeId, MAX_NAME_LEN};
use crate::page::{Page, PageId};
use crate::sim::{AuxGroup, CommandHandle};

/// Node arena capacity
pub const MAX_NODES: usize = 256;

/// Page arena capacity
pub const MAX_PAGES: usize = 48;

/// Maximum profiles
pub const MAX_PROFILES: usize = 4;

/// Overflow grid buttons
pub const OVERFLOW_SLOTS: usize = 12;

/// Maximum pages in one profile (sidebar + overflow grid)
pub const MAX_PAGES_PROFILE: usize = SIDEBAR_SLOTS + OVERFLOW_SLOTS;

/// Maximum label tables
pub const MAX_LABEL_TABLES: usize = 8;

/// Maximum labels per table
pub const MAX_LABELS: usize = 8;

/// Maximum label length
pub const MAX_LABEL_LEN: usize = 8;

/// Maximum named auxiliary groups
pub const MAX_AUX_GROUPS: usize = 8;

/// Key table capacity (registered key array commands)
pub const MAX_KEY_COMMANDS: usize = 64;

/// Maximum named key groups
pub const MAX_KEY_GROUPS: usize = 8;

/// Maximum boot error message length
pub const MAX_ERROR_LEN: usize = 48;

/// Simulator backend of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Backend {
    /// Polled ASCII packets
    #[default]
    Serial,
    /// Registered datarefs and commands
    Registration,
}

/// Aircraft/sim combination
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String<MAX_NAME_LEN>,
    pub backend: Backend,
    /// First [`SIDEBAR_SLOTS`] pages form the sidebar, the rest the overflow grid
    pub pages: Vec<PageId, MAX_PAGES_PROFILE>,
}

/// Named value labels for [`crate::node::DisplayHook::Labels`]
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    pub name: String<MAX_NAME_LEN>,
    pub labels: Vec<String<MAX_LABEL_LEN>, MAX_LABELS>,
}

impl LabelTable {
    /// Label for `value`, `?` when out of range
    pub fn label(&self, value: i32) -> &str {
        usize::try_from(value)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(|s| s.as_str())
            .unwrap_or("?")
    }
}

/// Catalog errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CatalogError {
    NodeCapacity,
    PageCapacity,
    ProfileCapacity,
    TableCapacity,
    /// Profile page list is full
    ProfilePages,
    NoProfiles,
    UnknownProfile,
}

/// Catalog of nodes, pages and profiles
#[derive(Debug, Default)]
pub struct Catalog {
    nodes: Vec<Node, MAX_NODES>,
    pages: Vec<Page, MAX_PAGES>,
    profiles: Vec<Profile, MAX_PROFILES>,
    active: usize,
    labels: Vec<LabelTable, MAX_LABEL_TABLES>,
    aux_groups: Vec<(String<MAX_NAME_LEN>, AuxGroup), MAX_AUX_GROUPS>,
    /// Key array commands; `None` where registration failed
    key_commands: Vec<Option<CommandHandle>, MAX_KEY_COMMANDS>,
    /// Named runs of `key_commands`: (name, first, len)
    key_groups: Vec<(String<MAX_NAME_LEN>, u16, u8), MAX_KEY_GROUPS>,
    /// Node whose advancing value shows the link is alive
    link_clock: Option<NodeId>,
    boot_error: Option<String<MAX_ERROR_LEN>>,
}

impl Catalog {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            pages: Vec::new(),
            profiles: Vec::new(),
            active: 0,
            labels: Vec::new(),
            aux_groups: Vec::new(),
            key_commands: Vec::new(),
            key_groups: Vec::new(),
            link_clock: None,
            boot_error: None,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id.index())
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(id.index())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn add_node(&mut self, node: Node) -> Result<NodeId, CatalogError> {
        let id = NodeId(self.nodes.len() as u16);
        self.nodes.push(node).map_err(|_| CatalogError::NodeCapacity)?;
        Ok(id)
    }

    pub fn add_page(&mut self, page: Page) -> Result<PageId, CatalogError> {
        let id = PageId(self.pages.len() as u8);
        self.pages.push(page).map_err(|_| CatalogError::PageCapacity)?;
        Ok(id)
    }

    pub fn add_profile(&mut self, profile: Profile) -> Result<usize, CatalogError> {
        self.profiles
            .push(profile)
            .map_err(|_| CatalogError::ProfileCapacity)?;
        Ok(self.profiles.len() - 1)
    }

    pub fn add_labels(&mut self, table: LabelTable) -> Result<u8, CatalogError> {
        self.labels.push(table).map_err(|_| CatalogError::TableCapacity)?;
        Ok((self.labels.len() - 1) as u8)
    }

    pub fn labels(&self, table: u8) -> Option<&LabelTable> {
        self.labels.get(table as usize)
    }

    pub fn find_labels(&self, name: &str) -> Option<u8> {
        self.labels
            .iter()
            .position(|t| t.name == name)
            .map(|i| i as u8)
    }

    pub fn add_aux_group(&mut self, name: &str, group: AuxGroup) -> Result<(), CatalogError> {
        let name = String::try_from(name).map_err(|_| CatalogError::TableCapacity)?;
        self.aux_groups
            .push((name, group))
            .map_err(|_| CatalogError::TableCapacity)
    }

    pub fn aux_group(&self, name: &str) -> Option<AuxGroup> {
        self.aux_groups
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, g)| *g)
    }

    /// Append a named key group; returns its first entry and length
    pub fn add_key_group(
        &mut self,
        name: &str,
        commands: &[Option<CommandHandle>],
    ) -> Result<(u16, u8), CatalogError> {
        let name = String::try_from(name).map_err(|_| CatalogError::TableCapacity)?;
        let len = u8::try_from(commands.len()).map_err(|_| CatalogError::TableCapacity)?;
        if self.key_commands.len() + commands.len() > MAX_KEY_COMMANDS
            || self.key_groups.is_full()
        {
            return Err(CatalogError::TableCapacity);
        }
        let first = self.key_commands.len() as u16;
        self.key_commands
            .extend_from_slice(commands)
            .map_err(|_| CatalogError::TableCapacity)?;
        self.key_groups
            .push((name, first, len))
            .map_err(|_| CatalogError::TableCapacity)?;
        Ok((first, len))
    }

    pub fn key_group(&self, name: &str) -> Option<(u16, u8)> {
        self.key_groups
            .iter()
            .find(|(n, ..)| n == name)
            .map(|(_, first, len)| (*first, *len))
    }

    /// Registered command at `entry` of the key table
    pub fn key_command(&self, entry: u16) -> Option<CommandHandle> {
        self.key_commands.get(entry as usize).copied().flatten()
    }

    pub fn set_link_clock(&mut self, node: Option<NodeId>) {
        self.link_clock = node;
    }

    pub fn link_clock(&self) -> Option<NodeId> {
        self.link_clock
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u16))
    }

    pub fn find_page(&self, name: &str) -> Option<PageId> {
        self.pages
            .iter()
            .position(|p| p.name == name)
            .map(|i| PageId(i as u8))
    }

    pub fn find_profile(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.name == name)
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn profile_at(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub(crate) fn profile_at_mut(&mut self, index: usize) -> Option<&mut Profile> {
        self.profiles.get_mut(index)
    }

    /// Active profile
    pub fn profile(&self) -> Option<&Profile> {
        self.profiles.get(self.active)
    }

    pub fn active_profile(&self) -> usize {
        self.active
    }

    pub fn set_active_profile(&mut self, index: usize) -> Result<(), CatalogError> {
        if self.profiles.is_empty() {
            return Err(CatalogError::NoProfiles);
        }
        if index >= self.profiles.len() {
            return Err(CatalogError::UnknownProfile);
        }
        self.active = index;
        Ok(())
    }

    /// Backend of the active profile
    pub fn backend(&self) -> Backend {
        self.profile().map(|p| p.backend).unwrap_or_default()
    }

    /// Page at position `slot` of the active profile
    pub fn profile_page(&self, slot: usize) -> Option<PageId> {
        self.profile()?.pages.get(slot).copied()
    }

    pub fn sidebar_page(&self, slot: usize) -> Option<PageId> {
        if slot >= SIDEBAR_SLOTS {
            return None;
        }
        self.profile_page(slot)
    }

    pub fn overflow_page(&self, button: usize) -> Option<PageId> {
        if button >= OVERFLOW_SLOTS {
            return None;
        }
        self.profile_page(SIDEBAR_SLOTS + button)
    }

    /// `i`-th node of a page
    pub fn page_node(&self, page: PageId, i: usize) -> Option<NodeId> {
        self.page(page)?.nodes().get(i).copied()
    }

    /// Force every node of `page` to refresh
    pub fn invalidate_page(&mut self, page: PageId) {
        let mut i = 0;
        while let Some(id) = self.page_node(page, i) {
            if let Some(node) = self.node_mut(id) {
                node.invalidate();
            }
            i += 1;
        }
    }

    /// Record a boot error; only the first one is kept
    pub fn record_error(&mut self, message: &str) {
        if self.boot_error.is_some() {
            return;
        }
        let mut text = String::new();
        for c in message.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        self.boot_error = Some(text);
    }

    pub fn boot_error(&self) -> Option<&str> {
        self.boot_error.as_deref()
    }

    /// Take the boot error for one-time display
    pub fn take_boot_error(&mut self) -> Option<String<MAX_ERROR_LEN>> {
        self.boot_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn profile_with(pages: &[PageId]) -> Profile {
        let mut profile = Profile::default();
        for p in pages {
            profile.pages.push(*p).unwrap();
        }
        profile
    }

    #[test]
    fn test_invalid_handles_resolve_none() {
        let catalog = Catalog::new();
        assert!(catalog.node(NodeId(0)).is_none());
        assert!(catalog.page(PageId(3)).is_none());
        assert!(catalog.profile().is_none());
        assert_eq!(catalog.backend(), Backend::Serial);
    }

    #[test]
    fn test_sidebar_and_overflow_split() {
        let mut catalog = Catalog::new();
        let ids: std::vec::Vec<PageId> = (0..8)
            .map(|_| catalog.add_page(Page::new()).unwrap())
            .collect();
        catalog.add_profile(profile_with(&ids)).unwrap();
        assert_eq!(catalog.sidebar_page(0), Some(ids[0]));
        assert_eq!(catalog.sidebar_page(5), Some(ids[5]));
        assert_eq!(catalog.sidebar_page(6), None);
        assert_eq!(catalog.overflow_page(0), Some(ids[6]));
        assert_eq!(catalog.overflow_page(2), None);
    }

    #[test]
    fn test_invalidate_page_marks_all_nodes() {
        let mut catalog = Catalog::new();
        let a = catalog.add_node(Node::new(ValueKind::Int)).unwrap();
        let b = catalog.add_node(Node::new(ValueKind::Float)).unwrap();
        let mut page = Page::new();
        page.add_node(a).unwrap();
        page.add_node(b).unwrap();
        let pid = catalog.add_page(page).unwrap();
        for id in [a, b] {
            assert!(catalog.node_mut(id).unwrap().take_dirty());
            assert!(!catalog.node(id).unwrap().is_dirty());
        }
        catalog.invalidate_page(pid);
        assert!(catalog.node(a).unwrap().is_dirty());
        assert!(catalog.node(b).unwrap().is_dirty());
    }

    #[test]
    fn test_key_groups() {
        let mut catalog = Catalog::new();
        let a = [Some(CommandHandle(3)), None, Some(CommandHandle(5))];
        assert_eq!(catalog.add_key_group("softkeys", &a), Ok((0, 3)));
        assert_eq!(catalog.add_key_group("keypad", &a[..2]), Ok((3, 2)));
        assert_eq!(catalog.key_group("keypad"), Some((3, 2)));
        assert_eq!(catalog.key_command(2), Some(CommandHandle(5)));
        assert_eq!(catalog.key_command(1), None);
        assert_eq!(catalog.key_command(99), None);

        let big = [None; MAX_KEY_COMMANDS];
        assert_eq!(
            catalog.add_key_group("big", &big),
            Err(CatalogError::TableCapacity)
        );
    }

    #[test]
    fn test_first_boot_error_kept() {
        let mut catalog = Catalog::new();
        catalog.record_error("page radios: overflow");
        catalog.record_error("second");
        assert_eq!(catalog.boot_error(), Some("page radios: overflow"));
        assert!(catalog.take_boot_error().is_some());
        assert!(catalog.take_boot_error().is_none());
    }

    #[test]
    fn test_active_profile_bounds() {
        let mut catalog = Catalog::new();
        assert_eq!(catalog.set_active_profile(0), Err(CatalogError::NoProfiles));
        catalog.add_profile(Profile::default()).unwrap();
        assert_eq!(catalog.set_active_profile(1), Err(CatalogError::UnknownProfile));
        assert!(catalog.set_active_profile(0).is_ok());
    }

    #[test]
    fn test_label_lookup() {
        let mut table = LabelTable::default();
        for l in ["OFF", "STBY", "ON"] {
            table.labels.push(String::try_from(l).unwrap()).unwrap();
        }
        assert_eq!(table.label(1), "STBY");
        assert_eq!(table.label(3), "?");
        assert_eq!(table.label(-1), "?");
    }
}
