//! Page transitions, sidebar and encoder focus
//!
//! ```text
//! open_page(target)
//!   ├─ rejected: profile change pending / unknown page
//!   ├─ modal page: park rubber band, show surface, hand over to the panel
//!   └─ user page (input suspended):
//!        commit save → set page → invalidate nodes → reset cursor
//!        → primary focus → show surface + settle → entry hook
//!        → default focus → sidebar
//! ```

use core::fmt::Write;
use embedded_hal::delay::DelayNs;
use heapless::String;
use minipanel_hal::SettingsStore;
use minipanel_protocol::SIDEBAR_SLOTS;

use crate::catalog::{Catalog, OVERFLOW_SLOTS};
use crate::display::{DisplayScheduler, DisplaySink, PAGE_SETTLE_MS};
use crate::node::{Caps, NodeId};
use crate::page::{EntryHook, ModalKind, PageId, PageKind};
use crate::settings::{Settings, SettingsError};
use crate::state::{DeviceState, ScreenEvent};

/// Sidebar button background
pub const COLOR_BGND: u16 = 21130;
/// Sidebar button background of the current page
pub const COLOR_SELBGND: u16 = 33843;
/// Sidebar title colour
pub const COLOR_NORMAL: u16 = 63387;
/// Sidebar title colour of the pinned page
pub const COLOR_RUBBAND: u16 = 43002;
/// Overflow grid background of modal pages
pub const COLOR_MODAL_BUTTON: u16 = 16776;
/// Text colour of encoder-attached nodes
pub const COLOR_HIGHLIGHT: u16 = 65504;

/// Pinned page returns after this much page idle time
pub const RUBBER_BAND_MS: u32 = 8_000;
/// Focus snaps back to primary after this much encoder idle time
pub const SNAPBACK_MS: u32 = 7_000;

/// Holds encoder delivery while focus and node state change
pub trait InputGate {
    fn suspend(&self);
    fn resume(&self);
}

/// Suspends an [`InputGate`] until dropped
pub struct Suspended<'g>(&'g dyn InputGate);

impl<'g> Suspended<'g> {
    pub fn new(gate: &'g dyn InputGate) -> Self {
        gate.suspend();
        Self(gate)
    }
}

impl Drop for Suspended<'_> {
    fn drop(&mut self) {
        self.0.resume();
    }
}

/// Result of a paging request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PageOutcome {
    Rejected,
    Opened(PageId),
    /// Modal page shown; its program must be started
    Modal(PageId, ModalKind),
    /// Rubber band toggled on the current page
    Pinned(Option<u8>),
    /// Focus returned to the default group
    Snapback,
    Unchanged,
}

/// Paging state machine over the device state
pub struct PagingEngine<'a> {
    pub catalog: &'a mut Catalog,
    pub state: &'a mut DeviceState,
    pub settings: &'a mut Settings,
    pub scheduler: &'a mut DisplayScheduler,
    pub store: &'a mut dyn SettingsStore,
    pub sink: &'a mut dyn DisplaySink,
    pub delay: &'a mut dyn DelayNs,
    pub gate: &'a dyn InputGate,
    /// Current time (ms)
    pub now_ms: u32,
}

impl PagingEngine<'_> {
    /// Open a catalog page
    pub fn open_page(&mut self, target: PageId) -> Result<PageOutcome, SettingsError> {
        if self.state.profile_changed {
            return Ok(PageOutcome::Rejected);
        }
        let Some(page) = self.catalog.page(target) else {
            return Ok(PageOutcome::Rejected);
        };

        if let PageKind::Modal(kind) = page.kind {
            self.state.park_rubber_band();
            self.state.apply(ScreenEvent::OpenModal(Some(target)));
            self.sink.show_surface(&page.surface);
            self.delay.delay_ms(PAGE_SETTLE_MS);
            return Ok(PageOutcome::Modal(target, kind));
        }

        let gate = self.gate;
        let _suspended = Suspended::new(gate);

        self.settings.commit_if_required(self.store)?;
        self.state.apply(ScreenEvent::OpenUser(target));
        self.state.touch(self.now_ms);
        self.catalog.invalidate_page(target);
        self.scheduler.reset();
        self.state.at_primary = true;

        if let Some(page) = self.catalog.page(target) {
            self.sink.show_surface(&page.surface);
        }
        self.delay.delay_ms(PAGE_SETTLE_MS);

        self.run_entry_hook(target);
        self.default_focus();
        self.populate_sidebar();
        Ok(PageOutcome::Opened(target))
    }

    /// Touch on sidebar slot `slot`
    pub fn handle_sidebar(&mut self, slot: usize) -> Result<PageOutcome, SettingsError> {
        let Some(target) = self.catalog.sidebar_page(slot) else {
            return Ok(PageOutcome::Rejected);
        };
        if Some(target) != self.state.current_page() {
            return self.open_page(target);
        }
        let slot = slot as u8;
        self.state.rubber_band = match self.state.rubber_band {
            Some(s) if s == slot => None,
            _ => Some(slot),
        };
        self.state.page_timer = self.now_ms;
        self.populate_sidebar();
        Ok(PageOutcome::Pinned(self.state.rubber_band))
    }

    /// Rubber band and focus snapback housekeeping
    pub fn tick(&mut self) -> Result<PageOutcome, SettingsError> {
        if let Some(pinned) = self
            .state
            .rubber_band
            .and_then(|slot| self.catalog.sidebar_page(slot as usize))
        {
            let idle = self.now_ms.wrapping_sub(self.state.page_timer);
            if Some(pinned) != self.state.current_page() && idle > RUBBER_BAND_MS {
                return self.open_page(pinned);
            }
        }

        let idle = self.now_ms.wrapping_sub(self.state.enc_timer);
        if !self.state.at_primary && idle > SNAPBACK_MS {
            let _suspended = Suspended::new(self.gate);
            self.default_focus();
            return Ok(PageOutcome::Snapback);
        }
        Ok(PageOutcome::Unchanged)
    }

    /// Apply the page's default focus group
    pub fn default_focus(&mut self) {
        self.apply_focus(0);
    }

    /// Apply focus group `group` of the current page
    pub fn apply_focus(&mut self, group: usize) {
        let Some(page) = self
            .state
            .current_page()
            .and_then(|p| self.catalog.page_mut(p))
        else {
            return;
        };
        page.apply_focus_group(group);
        self.state.at_primary = group == 0;
        self.state.enc_timer = self.now_ms;
        self.highlight_selection();
    }

    /// Colour selectable text nodes by encoder attachment
    pub fn highlight_selection(&mut self) {
        let Some(page) = self.state.current_page().and_then(|p| self.catalog.page(p)) else {
            return;
        };
        for &id in page.nodes() {
            let Some(node) = self.catalog.node(id) else {
                continue;
            };
            let Some(base) = node.tag.strip_suffix(".txt") else {
                continue;
            };
            if !node.has(Caps::SELECTABLE) {
                continue;
            }
            let color = if page.focus.is_attached(id) {
                COLOR_HIGHLIGHT
            } else {
                page.text_color
            };
            let mut tag = String::<16>::new();
            let _ = write!(tag, "{}.pco", base);
            self.sink.send_number(&tag, color as i32);
        }
    }

    /// Repaint the six sidebar buttons
    pub fn populate_sidebar(&mut self) {
        let current = self.state.screen.user_page();
        for slot in 0..SIDEBAR_SLOTS {
            let page = self.catalog.sidebar_page(slot);
            let title = page
                .and_then(|p| self.catalog.page(p))
                .map_or("", |p| p.title.as_str());
            let pco = if self.state.rubber_band == Some(slot as u8) {
                COLOR_RUBBAND
            } else {
                COLOR_NORMAL
            };
            let bco = if page.is_some() && page == current {
                COLOR_SELBGND
            } else {
                COLOR_BGND
            };
            send_indexed(self.sink, "SB", slot + 1, "txt", |sink, tag| {
                sink.send_value(tag, title)
            });
            send_indexed(self.sink, "SB", slot + 1, "pco", |sink, tag| {
                sink.send_number(tag, pco as i32)
            });
            send_indexed(self.sink, "SB", slot + 1, "bco", |sink, tag| {
                sink.send_number(tag, bco as i32)
            });
        }
    }

    fn run_entry_hook(&mut self, page: PageId) {
        match self.catalog.page(page).and_then(|p| p.entry) {
            Some(EntryHook::OverflowGrid) => self.fill_overflow_grid(page),
            Some(EntryHook::PrimeSystemOps) => self.prime_system_ops(page),
            None => {}
        }
    }

    /// Fill buttons `B01..B12` from the overflow pages of the profile
    fn fill_overflow_grid(&mut self, grid: PageId) {
        for i in 0..OVERFLOW_SLOTS {
            let target = self.catalog.overflow_page(i);
            let (title, modal) = match target.and_then(|p| self.catalog.page(p)) {
                Some(p) => (p.title.clone(), p.is_modal()),
                None => (String::new(), false),
            };
            let bco = if modal { COLOR_MODAL_BUTTON } else { COLOR_BGND };
            let mut tag = String::<8>::new();
            let _ = write!(tag, "B{:02}.txt", i + 1);
            self.sink.send_value(&tag, &title);
            tag.clear();
            let _ = write!(tag, "B{:02}.bco", i + 1);
            self.sink.send_number(&tag, bco as i32);

            if let Some(node) = self
                .catalog
                .page_node(grid, i)
                .and_then(|id| self.catalog.node_mut(id))
            {
                node.target_page = target;
            }
        }
    }

    /// Show every system op value of the page
    fn prime_system_ops(&mut self, page: PageId) {
        let mut i = 0;
        while let Some(id) = self.catalog.page_node(page, i) {
            i += 1;
            let Some(node) = self.catalog.node_mut(id) else {
                continue;
            };
            if node.has(Caps::SYSTEM_OP) {
                let opcode = node.opcodes[0];
                self.settings.handle_config(opcode, node, self.sink);
            }
        }
    }
}

fn send_indexed(
    sink: &mut dyn DisplaySink,
    prefix: &str,
    n: usize,
    attr: &str,
    send: impl FnOnce(&mut dyn DisplaySink, &str),
) {
    let mut tag = String::<12>::new();
    let _ = write!(tag, "{}{}.{}", prefix, n, attr);
    send(sink, &tag);
}

/// Node attached to encoder `i` for rotation
pub fn encoder_target(catalog: &Catalog, page: PageId, i: usize) -> Option<NodeId> {
    catalog.page(page)?.focus.enc.get(i).copied().flatten()
}
