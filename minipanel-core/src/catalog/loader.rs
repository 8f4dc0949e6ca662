//! Catalog loader for the panel TOML subset
//!
//! Allocation free: the text is scanned line by line and sections are
//! looked up by name when first referenced, so only the pages of the
//! active profile (and the nodes they reach) are ever built.
//!
//! Supported:
//! - `[profile.X]`, `[page.X]`, `[node.X]`, `[aux.X]`, `[keys.X]`, `[labels.X]`,
//!   `[extra]`
//! - string, integer, float and boolean values
//! - single-line arrays: `nodes = ["com1", "com2"]`
//! - `#` comments
//!
//! A node's `kind` must precede its `value`; booleans store as 0/1.
//!
//! NOT supported:
//! - Multi-line strings or arrays
//! - Inline tables
//! - Commas inside array strings

use core::fmt::Write;
use heapless::{String, Vec};
use minipanel_protocol::{ENCODER_COUNT, NO_INDEX};

use super::{
    Backend, Catalog, CatalogError, LabelTable, Profile, MAX_ERROR_LEN, MAX_KEY_COMMANDS,
    MAX_PAGES_PROFILE, MAX_PROFILES,
};
use crate::dispatch::Transform;
use crate::display::builtin_renderer;
use crate::modal::KeypadKind;
use crate::node::{
    Caps, DatarefBinding, DisplayHook, KeyArray, Node, NodeId, RegOp, SimKey, TouchHook,
};
use crate::page::{EntryHook, FocusGroup, ModalKind, Page, PageId, PageKind};
use crate::sim::{
    AccessMode, AuxGroup, CommandHandle, DatarefSpec, ExtraCommand, RegistrationSink,
};
use crate::value::{Value, ValueKind};

/// Name of the write-only registration op in `commands`
const WRITE_OP: &str = "@write";

/// Page templates may not clone further than this
const MAX_CLONE_DEPTH: u8 = 2;

/// Why a load stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadErrorKind {
    /// Line is neither a header nor `key = value`
    Syntax,
    UnknownSection,
    UnknownKey,
    /// Value has the wrong type or is out of range
    BadValue,
    /// A referenced section does not exist
    Missing,
    Catalog(CatalogError),
}

/// Load failure with its 1-based line (0 when not tied to a line)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadError {
    pub line: usize,
    pub kind: LoadErrorKind,
}

impl LoadError {
    fn at(line: usize, kind: LoadErrorKind) -> Self {
        Self { line, kind }
    }
}

impl From<CatalogError> for LoadErrorKind {
    fn from(e: CatalogError) -> Self {
        LoadErrorKind::Catalog(e)
    }
}

/// Backends of the profiles in declaration order
///
/// Lets the firmware pick its simulator link before the full load.
pub fn profile_backends(text: &str) -> Vec<Backend, MAX_PROFILES> {
    let mut out = Vec::new();
    for (line, entry) in entries(text) {
        if let Entry::Header("profile", _) = entry {
            let backend = section_after(text, line)
                .find_map(|(_, e)| match e {
                    Entry::Pair("backend", v) => parse_backend(v).ok(),
                    _ => None,
                })
                .unwrap_or_default();
            if out.push(backend).is_err() {
                break;
            }
        }
    }
    out
}

impl Catalog {
    /// Build the catalog for profile `profile`
    ///
    /// Every profile is listed, but only the active one gets its pages.
    /// Registration-backend profiles register their datarefs and commands
    /// through `reg`; refused registrations are recorded as the boot error
    /// and leave the node unbound.
    pub fn load(
        &mut self,
        text: &str,
        profile: usize,
        reg: &mut dyn RegistrationSink,
    ) -> Result<(), LoadError> {
        let mut loader = Loader {
            text,
            catalog: self,
            reg,
            backend: Backend::Serial,
        };
        loader.load(profile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry<'t> {
    Header(&'t str, &'t str),
    Pair(&'t str, &'t str),
    Invalid,
}

/// Non-blank, non-comment lines with their 1-based numbers
fn entries(text: &str) -> impl Iterator<Item = (usize, Entry<'_>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        Some((i + 1, parse_line(line)))
    })
}

fn parse_line(line: &str) -> Entry<'_> {
    if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
        let header = header.trim();
        return match header.split_once('.') {
            Some((kind, name)) => Entry::Header(kind.trim(), name.trim()),
            None => Entry::Header(header, ""),
        };
    }
    match parse_key_value(line) {
        Some((key, value)) => Entry::Pair(key, value),
        None => Entry::Invalid,
    }
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    let value = strip_comment(value);

    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Cut a trailing `# comment`, skipping any `#` inside a string
fn strip_comment(value: &str) -> &str {
    let mut quoted = false;
    for (i, c) in value.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted => return value[..i].trim(),
            _ => {}
        }
    }
    value
}

/// Body entries of the section whose header is on `header_line`
fn section_after(text: &str, header_line: usize) -> impl Iterator<Item = (usize, Entry<'_>)> {
    entries(text)
        .skip_while(move |(line, _)| *line <= header_line)
        .take_while(|(_, e)| !matches!(e, Entry::Header(..)))
}

/// Header line of `[kind.name]`
fn find_section(text: &str, kind: &str, name: &str) -> Option<usize> {
    entries(text).find_map(|(line, e)| match e {
        Entry::Header(k, n) if k == kind && n == name => Some(line),
        _ => None,
    })
}

/// Strip surrounding quotes
fn parse_string(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

fn parse_num<T: core::str::FromStr>(value: &str, line: usize) -> Result<T, LoadError> {
    value
        .parse()
        .map_err(|_| LoadError::at(line, LoadErrorKind::BadValue))
}

fn parse_bool(value: &str, line: usize) -> Result<bool, LoadError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(LoadError::at(line, LoadErrorKind::BadValue)),
    }
}

fn parse_text<const N: usize>(value: &str, line: usize) -> Result<String<N>, LoadError> {
    String::try_from(parse_string(value)).map_err(|_| LoadError::at(line, LoadErrorKind::BadValue))
}

/// Items of a single-line array, unquoted
fn parse_array(value: &str, line: usize) -> Result<impl Iterator<Item = &str>, LoadError> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .ok_or(LoadError::at(line, LoadErrorKind::BadValue))?;
    let mut items = inner.split(',').map(|item| parse_string(item.trim()));
    // `[]` yields one empty item
    if inner.trim().is_empty() {
        items.next();
    }
    Ok(items)
}

fn parse_backend(value: &str) -> Result<Backend, LoadErrorKind> {
    match parse_string(value) {
        "serial" => Ok(Backend::Serial),
        "registration" => Ok(Backend::Registration),
        _ => Err(LoadErrorKind::BadValue),
    }
}

/// `name[3]` → (`name`, Some(3))
fn split_index(name: &str) -> (&str, Option<u16>) {
    if let Some(open) = name.find('[') {
        if let Some(index) = name[open + 1..]
            .strip_suffix(']')
            .and_then(|i| i.parse().ok())
        {
            return (&name[..open], Some(index));
        }
    }
    (name, None)
}

/// Hook key applicability: `None` skip, `Some(true)` backend-specific
fn hook_key(key: &str, base: &str, backend: Backend) -> Option<bool> {
    let rest = key.strip_prefix(base)?;
    match rest {
        "" => Some(false),
        "_serial" => (backend == Backend::Serial).then_some(true),
        "_registration" => (backend == Backend::Registration).then_some(true),
        _ => None,
    }
}

fn parse_touch_hook(value: &str) -> Option<TouchHook> {
    let value = parse_string(value);
    if let Some(n) = value.strip_prefix("focus:") {
        return n.parse().ok().map(TouchHook::Focus);
    }
    if let Some(n) = value.strip_prefix("unit:") {
        return n.parse().ok().map(TouchHook::Unit);
    }
    if let Some(args) = value.strip_prefix("keypad:") {
        return KeypadKind::from_hook_args(args).map(TouchHook::Keypad);
    }
    Some(match value {
        "toggle" => TouchHook::ToggleBinary,
        "tristate" => TouchHook::StepTristate,
        "dim_now" => TouchHook::DimNow,
        "cycle_profile" => TouchHook::CycleProfile,
        "accept_profile" => TouchHook::AcceptProfile,
        "restart" => TouchHook::Restart,
        _ => return None,
    })
}

/// Node fields that need the node id or the backend before they apply
struct NodeDraft<'t> {
    node: Node,
    sim_id: Option<u16>,
    sim_index: i16,
    dataref: Option<(usize, &'t str)>,
    mode: AccessMode,
    refresh: u16,
    divider: u16,
    dataref_index: Option<u16>,
    commands: [Option<(usize, &'t str)>; 3],
    transforms: [Option<(usize, &'t str)>; 3],
    keys: Option<(usize, &'t str)>,
    key_units: u8,
    display_specific: bool,
    touch_specific: bool,
}

impl NodeDraft<'_> {
    fn new() -> Self {
        Self {
            node: Node::new(ValueKind::Int),
            sim_id: None,
            sim_index: NO_INDEX,
            dataref: None,
            mode: AccessMode::Read,
            refresh: 1,
            divider: 1,
            dataref_index: None,
            commands: [None; 3],
            transforms: [None; 3],
            keys: None,
            key_units: 1,
            display_specific: false,
            touch_specific: false,
        }
    }
}

struct Loader<'t, 'c> {
    text: &'t str,
    catalog: &'c mut Catalog,
    reg: &'c mut dyn RegistrationSink,
    backend: Backend,
}

impl<'t> Loader<'t, '_> {
    fn load(&mut self, profile: usize) -> Result<(), LoadError> {
        let active_line = self.load_profiles(profile)?;
        self.catalog
            .set_active_profile(profile)
            .map_err(|e| LoadError::at(0, e.into()))?;
        self.backend = self.catalog.backend();

        if self.backend == Backend::Registration {
            self.load_extra()?;
        }

        // Placeholders first so node targets can name any profile page
        let mut pages: Vec<(usize, PageId), MAX_PAGES_PROFILE> = Vec::new();
        if let Some(header) = active_line {
            for (line, entry) in section_after(self.text, header) {
                let Entry::Pair("pages", value) = entry else {
                    continue;
                };
                for name in parse_array(value, line)? {
                    let id = self.placeholder(name, line)?;
                    let active = self
                        .catalog
                        .profile_at_mut(profile)
                        .ok_or(LoadError::at(line, CatalogError::UnknownProfile.into()))?;
                    active
                        .pages
                        .push(id)
                        .map_err(|_| LoadError::at(line, CatalogError::ProfilePages.into()))?;
                    let _ = pages.push((line, id));
                }
            }
        }

        for (line, id) in pages {
            let Some(name) = self.catalog.page(id).map(|p| p.name.clone()) else {
                continue;
            };
            let page = self.build_page(&name, line, 0)?;
            if let Some(slot) = self.catalog.page_mut(id) {
                *slot = page;
            }
        }

        // Link indicator clock, built like any page node
        if let Some(header) = active_line {
            for (line, entry) in section_after(self.text, header) {
                if let Entry::Pair("clock", value) = entry {
                    let id = self.node(parse_string(value), line)?;
                    self.catalog.set_link_clock(Some(id));
                }
            }
        }
        Ok(())
    }

    /// Pass 1: every profile header; returns the active one's line
    fn load_profiles(&mut self, active: usize) -> Result<Option<usize>, LoadError> {
        let mut active_line = None;
        for (line, entry) in entries(self.text) {
            let (kind, name) = match entry {
                Entry::Header(kind, name) => (kind, name),
                Entry::Pair(..) => continue,
                Entry::Invalid => return Err(LoadError::at(line, LoadErrorKind::Syntax)),
            };
            match kind {
                "page" | "node" | "aux" | "keys" | "labels" | "extra" => continue,
                "profile" => {}
                _ => return Err(LoadError::at(line, LoadErrorKind::UnknownSection)),
            }

            let mut profile = Profile {
                name: parse_text(name, line)?,
                ..Profile::default()
            };
            for (l, e) in section_after(self.text, line) {
                match e {
                    Entry::Pair("backend", v) => {
                        profile.backend = parse_backend(v).map_err(|k| LoadError::at(l, k))?
                    }
                    Entry::Pair("pages" | "title" | "clock", _) => {}
                    Entry::Pair(..) => return Err(LoadError::at(l, LoadErrorKind::UnknownKey)),
                    Entry::Invalid => return Err(LoadError::at(l, LoadErrorKind::Syntax)),
                    Entry::Header(..) => break,
                }
            }
            let index = self
                .catalog
                .add_profile(profile)
                .map_err(|e| LoadError::at(line, e.into()))?;
            if index == active {
                active_line = Some(line);
            }
        }
        Ok(active_line)
    }

    fn load_extra(&mut self) -> Result<(), LoadError> {
        let Some(header) = find_section(self.text, "extra", "") else {
            return Ok(());
        };
        for (line, entry) in section_after(self.text, header) {
            let Entry::Pair(key, value) = entry else {
                return Err(LoadError::at(line, LoadErrorKind::Syntax));
            };
            let which = match key {
                "time_down_fast" => ExtraCommand::TimeDownFast,
                "time_up_fast" => ExtraCommand::TimeUpFast,
                _ => return Err(LoadError::at(line, LoadErrorKind::UnknownKey)),
            };
            let name = parse_string(value);
            if self.reg.bind_extra(which, name).is_err() {
                self.unregistered(name);
            }
        }
        Ok(())
    }

    fn placeholder(&mut self, name: &str, line: usize) -> Result<PageId, LoadError> {
        if let Some(id) = self.catalog.find_page(name) {
            return Ok(id);
        }
        let mut page = Page::new();
        page.name = parse_text(name, line)?;
        self.catalog
            .add_page(page)
            .map_err(|e| LoadError::at(line, e.into()))
    }

    fn build_page(&mut self, name: &str, line: usize, depth: u8) -> Result<Page, LoadError> {
        let header = find_section(self.text, "page", name)
            .ok_or(LoadError::at(line, LoadErrorKind::Missing))?;
        let mut page = Page::new();

        for (line, entry) in section_after(self.text, header) {
            let Entry::Pair(key, value) = entry else {
                return Err(LoadError::at(line, LoadErrorKind::Syntax));
            };
            match key {
                "clone" => {
                    if depth >= MAX_CLONE_DEPTH {
                        return Err(LoadError::at(line, LoadErrorKind::BadValue));
                    }
                    let template = self.build_page(parse_string(value), line, depth + 1)?;
                    page.clone_from_template(&template);
                }
                "title" => page.title = parse_text(value, line)?,
                "surface" => page.surface = parse_text(value, line)?,
                "text_color" => page.text_color = parse_num(value, line)?,
                "modal" => {
                    page.kind = PageKind::Modal(match parse_string(value) {
                        "testpad" => ModalKind::TestPad,
                        "datamon" => ModalKind::DataMonitor,
                        _ => return Err(LoadError::at(line, LoadErrorKind::BadValue)),
                    })
                }
                "entry" => {
                    page.entry = Some(match parse_string(value) {
                        "overflow_grid" => EntryHook::OverflowGrid,
                        "prime_system_ops" => EntryHook::PrimeSystemOps,
                        _ => return Err(LoadError::at(line, LoadErrorKind::BadValue)),
                    })
                }
                "nodes" => {
                    for node in parse_array(value, line)?.filter(|n| !n.is_empty()) {
                        let id = self.node(node, line)?;
                        if page.add_node(id).is_err() {
                            self.overflow(name);
                        }
                    }
                }
                _ => self.focus_key(&mut page, key, value, line)?,
            }
        }
        page.name = parse_text(name, line)?;
        Ok(page)
    }

    /// `focus<n>_enc`, `focus<n>_push`, `focus<n>_long`
    fn focus_key(
        &mut self,
        page: &mut Page,
        key: &str,
        value: &str,
        line: usize,
    ) -> Result<(), LoadError> {
        let unknown = LoadError::at(line, LoadErrorKind::UnknownKey);
        let (index, role) = key
            .strip_prefix("focus")
            .and_then(|k| k.split_once('_'))
            .ok_or(unknown)?;
        let index: usize = index.parse().map_err(|_| unknown)?;

        let mut targets = [None; ENCODER_COUNT];
        for (i, name) in parse_array(value, line)?.enumerate() {
            if i >= ENCODER_COUNT {
                return Err(LoadError::at(line, LoadErrorKind::BadValue));
            }
            if !name.is_empty() {
                targets[i] = Some(self.node(name, line)?);
            }
        }

        let mut group: FocusGroup = page.focus_groups.get(index).copied().unwrap_or_default();
        match role {
            "enc" => group.enc = targets,
            "push" => group.push = targets,
            "long" => group.long = targets,
            _ => return Err(unknown),
        }
        page.set_focus_group(index, group)
            .map_err(|_| LoadError::at(line, LoadErrorKind::BadValue))
    }

    /// Resolve a node by name, building it on first use
    fn node(&mut self, name: &str, line: usize) -> Result<NodeId, LoadError> {
        if let Some(id) = self.catalog.find_node(name) {
            return Ok(id);
        }
        let header = find_section(self.text, "node", name)
            .ok_or(LoadError::at(line, LoadErrorKind::Missing))?;

        let mut draft = NodeDraft::new();
        draft.node.name = parse_text(name, line)?;
        for (line, entry) in section_after(self.text, header) {
            let Entry::Pair(key, value) = entry else {
                return Err(LoadError::at(line, LoadErrorKind::Syntax));
            };
            self.node_key(&mut draft, key, value, line)?;
        }
        if let Some(id) = draft.sim_id {
            draft.node.sim_key = Some(SimKey {
                id,
                index: draft.sim_index,
            });
        }

        let id = self
            .catalog
            .add_node(draft.node.clone())
            .map_err(|e| LoadError::at(header, e.into()))?;
        if self.backend == Backend::Registration {
            self.register(id, &draft)?;
        }
        Ok(id)
    }

    fn node_key(
        &mut self,
        draft: &mut NodeDraft<'t>,
        key: &str,
        value: &'t str,
        line: usize,
    ) -> Result<(), LoadError> {
        let bad = LoadError::at(line, LoadErrorKind::BadValue);
        let node = &mut draft.node;
        match key {
            "obj" => node.obj_id = parse_num(value, line)?,
            "tag" => node.tag = parse_text(value, line)?,
            "format" => node.format = parse_text(value, line)?,
            "kind" => node.set_kind(match parse_string(value) {
                "int" => ValueKind::Int,
                "float" => ValueKind::Float,
                "text" => ValueKind::Text,
                _ => return Err(bad),
            }),
            "caps" => {
                for name in parse_array(value, line)? {
                    node.caps.insert(Caps::from_name(name).ok_or(bad)?);
                }
            }
            "value" => match node.kind() {
                ValueKind::Int => {
                    let v = match parse_bool(value, line) {
                        Ok(b) => b as i32,
                        Err(_) => parse_num(value, line)?,
                    };
                    node.set_value(Value::Int(v));
                }
                ValueKind::Float => node.set_value(Value::Float(parse_num(value, line)?)),
                ValueKind::Text => node.set_text(parse_string(value)),
            },
            "sim" => draft.sim_id = Some(parse_num(value, line)?),
            "sim_index" => draft.sim_index = parse_num(value, line)?,
            "ops" => {
                for (slot, op) in parse_array(value, line)?.enumerate() {
                    *node.opcodes.get_mut(slot).ok_or(bad)? = parse_num(op, line)?;
                }
            }
            "target" => {
                node.target_page = Some(
                    self.catalog
                        .find_page(parse_string(value))
                        .ok_or(LoadError::at(line, LoadErrorKind::Missing))?,
                )
            }
            "pic_base" => node.pic_base = parse_num(value, line)?,
            "dataref" => draft.dataref = Some((line, parse_string(value))),
            "mode" => {
                draft.mode = match parse_string(value) {
                    "r" => AccessMode::Read,
                    "rw" => AccessMode::ReadWrite,
                    _ => return Err(bad),
                }
            }
            "refresh" => draft.refresh = parse_num(value, line)?,
            "divider" => draft.divider = parse_num(value, line)?,
            "dataref_index" => draft.dataref_index = Some(parse_num(value, line)?),
            "keys" => draft.keys = Some((line, parse_string(value))),
            "key_units" => draft.key_units = parse_num(value, line)?,
            "commands" | "transforms" => {
                let slots = if key == "commands" {
                    &mut draft.commands
                } else {
                    &mut draft.transforms
                };
                for (slot, name) in parse_array(value, line)?.enumerate() {
                    let entry = slots.get_mut(slot).ok_or(bad)?;
                    *entry = (!name.is_empty()).then_some((line, name));
                }
            }
            _ => {
                if let Some(specific) = hook_key(key, "display", self.backend) {
                    if specific || !draft.display_specific {
                        node.display_hook = Some(self.display_hook(value, line)?);
                        draft.display_specific |= specific;
                    }
                } else if let Some(specific) = hook_key(key, "touch", self.backend) {
                    if specific || !draft.touch_specific {
                        node.touch_hook = Some(parse_touch_hook(value).ok_or(bad)?);
                        draft.touch_specific |= specific;
                    }
                } else if !(key.starts_with("display_") || key.starts_with("touch_")) {
                    return Err(LoadError::at(line, LoadErrorKind::UnknownKey));
                }
            }
        }
        Ok(())
    }

    fn display_hook(&mut self, value: &str, line: usize) -> Result<DisplayHook, LoadError> {
        let value = parse_string(value);
        if let Some(table) = value.strip_prefix("labels:") {
            return self.labels(table, line).map(DisplayHook::Labels);
        }
        value
            .strip_prefix("fn:")
            .and_then(builtin_renderer)
            .map(DisplayHook::Custom)
            .ok_or(LoadError::at(line, LoadErrorKind::BadValue))
    }

    fn labels(&mut self, name: &str, line: usize) -> Result<u8, LoadError> {
        if let Some(table) = self.catalog.find_labels(name) {
            return Ok(table);
        }
        let header = find_section(self.text, "labels", name)
            .ok_or(LoadError::at(line, LoadErrorKind::Missing))?;
        let mut table = LabelTable {
            name: parse_text(name, line)?,
            ..LabelTable::default()
        };
        for (line, entry) in section_after(self.text, header) {
            match entry {
                Entry::Pair("labels", value) => {
                    for label in parse_array(value, line)? {
                        table
                            .labels
                            .push(parse_text(label, line)?)
                            .map_err(|_| LoadError::at(line, LoadErrorKind::BadValue))?;
                    }
                }
                _ => return Err(LoadError::at(line, LoadErrorKind::UnknownKey)),
            }
        }
        self.catalog
            .add_labels(table)
            .map_err(|e| LoadError::at(header, e.into()))
    }

    /// Resolve an auxiliary group, registering its datarefs on first use
    fn aux(&mut self, name: &str, line: usize) -> Result<AuxGroup, LoadError> {
        if let Some(group) = self.catalog.aux_group(name) {
            return Ok(group);
        }
        let header = find_section(self.text, "aux", name)
            .ok_or(LoadError::at(line, LoadErrorKind::Missing))?;
        let mut group: Option<AuxGroup> = None;
        for (line, entry) in section_after(self.text, header) {
            let Entry::Pair("datarefs", value) = entry else {
                return Err(LoadError::at(line, LoadErrorKind::UnknownKey));
            };
            for item in parse_array(value, line)? {
                let (path, index) = split_index(item);
                let spec = DatarefSpec {
                    name: path,
                    mode: AccessMode::ReadWrite,
                    refresh: 1,
                    divider: 1,
                    index,
                    kind: ValueKind::Float,
                };
                match self.reg.bind_aux(&spec) {
                    Ok(slot) => {
                        let g = group.get_or_insert(AuxGroup {
                            first: slot,
                            count: 0,
                        });
                        g.count += 1;
                    }
                    Err(_) => self.unregistered(path),
                }
            }
        }
        let group = group.unwrap_or(AuxGroup { first: 0, count: 0 });
        self.catalog
            .add_aux_group(name, group)
            .map_err(|e| LoadError::at(header, e.into()))?;
        Ok(group)
    }

    /// Resolve a key group, registering its commands on first use
    fn key_group(&mut self, name: &str, line: usize) -> Result<(u16, u8), LoadError> {
        if let Some(group) = self.catalog.key_group(name) {
            return Ok(group);
        }
        let header = find_section(self.text, "keys", name)
            .ok_or(LoadError::at(line, LoadErrorKind::Missing))?;
        let mut commands: Vec<Option<CommandHandle>, MAX_KEY_COMMANDS> = Vec::new();
        for (line, entry) in section_after(self.text, header) {
            let Entry::Pair("commands", value) = entry else {
                return Err(LoadError::at(line, LoadErrorKind::UnknownKey));
            };
            for cmd in parse_array(value, line)? {
                let handle = match self.reg.bind_command(cmd) {
                    Ok(handle) => Some(handle),
                    Err(_) => {
                        self.unregistered(cmd);
                        None
                    }
                };
                commands
                    .push(handle)
                    .map_err(|_| LoadError::at(line, LoadErrorKind::BadValue))?;
            }
        }
        self.catalog
            .add_key_group(name, &commands)
            .map_err(|e| LoadError::at(header, e.into()))
    }

    fn register(&mut self, id: NodeId, draft: &NodeDraft<'t>) -> Result<(), LoadError> {
        if let Some((_, name)) = draft.dataref {
            let spec = DatarefSpec {
                name,
                mode: draft.mode,
                refresh: draft.refresh,
                divider: draft.divider,
                index: draft.dataref_index,
                kind: draft.node.kind(),
            };
            match self.reg.bind_dataref(&spec, id) {
                Ok(handle) => {
                    if let Some(node) = self.catalog.node_mut(id) {
                        node.dataref = Some(DatarefBinding {
                            handle,
                            writable: draft.mode == AccessMode::ReadWrite,
                        });
                    }
                }
                Err(_) => self.unregistered(name),
            }
        }

        let mut ops = [RegOp::None; 3];
        for (slot, command) in draft.commands.iter().enumerate() {
            let Some((_, name)) = *command else {
                continue;
            };
            if name == WRITE_OP {
                ops[slot] = RegOp::Write;
                continue;
            }
            match self.reg.bind_command(name) {
                Ok(handle) => ops[slot] = RegOp::Command(handle),
                Err(_) => self.unregistered(name),
            }
        }
        if let Some((line, name)) = draft.keys {
            let (first, len) = self.key_group(name, line)?;
            let units = draft.key_units.max(1);
            let keys = len / units;
            if keys == 0 {
                return Err(LoadError::at(line, LoadErrorKind::BadValue));
            }
            ops[0] = RegOp::Keys(KeyArray { first, keys, units });
        }
        for (slot, transform) in draft.transforms.iter().enumerate() {
            let Some((line, name)) = *transform else {
                continue;
            };
            let aux = match name.split_once(':') {
                Some((head, group)) if head.starts_with("brightness") => {
                    Some(self.aux(group, line)?)
                }
                _ => None,
            };
            ops[slot] = RegOp::Transform(
                Transform::from_name(name, aux)
                    .ok_or(LoadError::at(line, LoadErrorKind::BadValue))?,
            );
        }

        if let Some(node) = self.catalog.node_mut(id) {
            node.reg_ops = ops;
        }
        Ok(())
    }

    fn overflow(&mut self, page: &str) {
        let mut msg = String::<MAX_ERROR_LEN>::new();
        let _ = write!(msg, "page {}: too many nodes", page);
        self.catalog.record_error(&msg);
    }

    fn unregistered(&mut self, name: &str) {
        let mut msg = String::<MAX_ERROR_LEN>::new();
        let _ = write!(msg, "unregistered: ");
        for c in name.chars() {
            if msg.push(c).is_err() {
                break;
            }
        }
        self.catalog.record_error(&msg);
    }
}
