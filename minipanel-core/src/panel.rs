//! Panel controller
//!
//! Owns the catalog and every state machine, and turns the three input
//! streams (simulator data, display touches, encoder events) plus the
//! 1 Hz tick into display updates and simulator commands. Hardware
//! collaborators are borrowed per call through [`PanelIo`].
//!
//! ```text
//! boot ──► splash ─► settings ─► backlight ─► catalog ─► first page
//!
//! poll:   modal? ── yes ─► modal.poll
//!           └─ no ─► collect (90) ─► display step (8)
//! touch:  wake? ─► modal key │ sidebar │ node touch action
//! encoder: wake? ─► inc/dec on enc[i] │ touch action of push[i]/long[i]
//! tick:   dim countdown ─► link indicator ─► rubber band / snapback (no modal)
//! ```

use core::fmt::Write;
use embedded_hal::delay::DelayNs;
use heapless::String;
use minipanel_hal::SettingsStore;
use minipanel_protocol::{InputEvent, TouchEvent};

use crate::catalog::loader::profile_backends;
use crate::catalog::{Catalog, LoadError, MAX_ERROR_LEN};
use crate::dispatch::CommandDispatcher;
use crate::display::{
    DisplayScheduler, DisplaySink, LinkIndicator, DISPLAY_QUOTA, PAGE_SETTLE_MS,
};
use crate::modal::{Keypad, KeypadKind, Modal, ModalContext, ModalStep, KEYPAD_SURFACE};
use crate::node::{Caps, NodeId, OpSlot, RegOp, TouchHook};
use crate::page::{PageId, DEFAULT_TEXT_COLOR};
use crate::paging::{InputGate, PageOutcome, PagingEngine, Suspended};
use crate::power::{PowerInput, PowerOutcome, PowerScheduler};
use crate::settings::{Settings, SettingsError};
use crate::sim::{
    CommandHandle, DatarefHandle, DatarefSpec, ExtraCommand, Operand, RegistrationSink, SimError,
    SimLink,
};
use crate::state::{DeviceState, ScreenEvent};

/// Simulator packets drained per main loop pass
pub const COLLECT_QUOTA: usize = 90;

/// Boot surface
pub const SPLASH_SURFACE: &str = "SPLASH";

/// Status line of the splash surface
const SPLASH_TAG: &str = "Tin.txt";

/// A catalog error stays on the splash this long
pub const BOOT_ERROR_MS: u32 = 15_000;

/// Final boot status stays on the splash this long
pub const BOOT_STATUS_MS: u32 = 800;

/// Hardware collaborators borrowed for one call
pub struct PanelIo<'a> {
    pub sim: &'a mut dyn SimLink,
    pub sink: &'a mut dyn DisplaySink,
    pub delay: &'a mut dyn DelayNs,
    pub gate: &'a dyn InputGate,
    pub store: &'a mut dyn SettingsStore,
}

/// What the caller must do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelEvent {
    Continue,
    /// Persist settings and reset the device
    Restart,
}

/// Panel errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError {
    Settings(SettingsError),
    Sim(SimError),
}

impl From<SettingsError> for PanelError {
    fn from(e: SettingsError) -> Self {
        PanelError::Settings(e)
    }
}

impl From<SimError> for PanelError {
    fn from(e: SimError) -> Self {
        PanelError::Sim(e)
    }
}

/// Registration sink for links without one; refuses everything
struct NoRegistrar;

impl RegistrationSink for NoRegistrar {
    fn bind_dataref(
        &mut self,
        _spec: &DatarefSpec<'_>,
        _node: NodeId,
    ) -> Result<DatarefHandle, SimError> {
        Err(SimError::Unsupported)
    }

    fn bind_aux(&mut self, _spec: &DatarefSpec<'_>) -> Result<u8, SimError> {
        Err(SimError::Unsupported)
    }

    fn bind_command(&mut self, _name: &str) -> Result<CommandHandle, SimError> {
        Err(SimError::Unsupported)
    }

    fn bind_extra(&mut self, _which: ExtraCommand, _name: &str) -> Result<(), SimError> {
        Err(SimError::Unsupported)
    }
}

fn modal_ctx<'a>(
    catalog: &'a mut Catalog,
    settings: &'a mut Settings,
    io: &'a mut PanelIo<'_>,
) -> ModalContext<'a> {
    ModalContext {
        catalog,
        settings,
        sim: &mut *io.sim,
        sink: &mut *io.sink,
    }
}

/// The panel
pub struct Panel {
    pub catalog: Catalog,
    pub settings: Settings,
    pub state: DeviceState,
    scheduler: DisplayScheduler,
    power: PowerScheduler,
    link: LinkIndicator,
    modal: Option<Modal>,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel {
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            settings: Settings::default(),
            state: DeviceState::new(),
            scheduler: DisplayScheduler::new(),
            power: PowerScheduler::new(),
            link: LinkIndicator::new(),
            modal: None,
        }
    }

    pub fn power(&self) -> &PowerScheduler {
        &self.power
    }

    pub fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    /// Run the boot sequence and open the first page
    ///
    /// A catalog load error does not stop the boot; it is shown on the
    /// splash once and returned. The recorded boot error is consumed.
    pub fn boot(
        &mut self,
        catalog_text: &str,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<Option<LoadError>, PanelError> {
        io.sink.show_surface(SPLASH_SURFACE);
        io.delay.delay_ms(PAGE_SETTLE_MS);
        io.sink.send_value(SPLASH_TAG, "Initializing...");

        let profiles = profile_backends(catalog_text).len().max(1) as u8;
        self.settings = Settings::load(&*io.store, profiles)?;
        let mut cmd = String::<16>::new();
        let _ = write!(cmd, "dim={}", self.settings.brightness);
        io.sink.send_command(&cmd);

        let mut refuse = NoRegistrar;
        let result = {
            let reg: &mut dyn RegistrationSink = match io.sim.registrar() {
                Some(reg) => reg,
                None => &mut refuse,
            };
            self.catalog
                .load(catalog_text, self.settings.profile as usize, reg)
        };
        let load_error = result.err();
        if let Some(e) = load_error {
            let mut msg = String::<MAX_ERROR_LEN>::new();
            let _ = write!(msg, "catalog line {}: {:?}", e.line, e.kind);
            self.catalog.record_error(&msg);
        }

        if let Some(msg) = self.catalog.take_boot_error() {
            io.sink.send_value(SPLASH_TAG, &msg);
            io.delay.delay_ms(BOOT_ERROR_MS);
        }
        io.sink.send_value(SPLASH_TAG, "Initialized.");
        io.delay.delay_ms(BOOT_STATUS_MS);

        self.power.handle(
            PowerInput::Wake,
            now_ms,
            &self.settings,
            &mut *io.sink,
            &mut *io.delay,
        );
        if let Some(first) = self.catalog.profile_page(0) {
            self.open_page(first, io, now_ms)?;
        }
        Ok(load_error)
    }

    /// One main loop pass: collect simulator data and refresh the display
    pub fn poll(&mut self, io: &mut PanelIo<'_>) {
        if let Some(modal) = self.modal.as_mut() {
            let mut ctx = modal_ctx(&mut self.catalog, &mut self.settings, io);
            modal.poll(&mut ctx, COLLECT_QUOTA);
            return;
        }
        io.sim.collect(&mut self.catalog, COLLECT_QUOTA);
        if let Some(page) = self.state.screen.user_page() {
            self.scheduler
                .step(&mut self.catalog, page, DISPLAY_QUOTA, &mut *io.sink);
        }
    }

    /// 1 Hz housekeeping
    pub fn tick(&mut self, io: &mut PanelIo<'_>, now_ms: u32) -> Result<(), PanelError> {
        self.power.handle(
            PowerInput::Continue,
            now_ms,
            &self.settings,
            &mut *io.sink,
            &mut *io.delay,
        );
        if self.modal.is_some() {
            return Ok(());
        }
        if let Some(clock) = self.catalog.link_clock().and_then(|id| self.catalog.node(id)) {
            self.link.refresh(clock, &mut *io.sink);
        }
        let outcome = self.paging(io, now_ms).tick()?;
        self.after_paging(outcome, io);
        Ok(())
    }

    /// Display touch or modal key
    pub fn on_touch(
        &mut self,
        touch: TouchEvent,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<PanelEvent, PanelError> {
        if self.wake(io, now_ms) {
            return Ok(PanelEvent::Continue);
        }

        if let Some(modal) = self.modal.as_mut() {
            let mut ctx = modal_ctx(&mut self.catalog, &mut self.settings, io);
            if modal.on_key(touch.op, &mut ctx) == ModalStep::Exit {
                self.exit_modal(io, now_ms)?;
            }
            return Ok(PanelEvent::Continue);
        }

        if let Some(slot) = touch.sidebar_slot() {
            let outcome = self.paging(io, now_ms).handle_sidebar(slot)?;
            self.after_paging(outcome, io);
            return Ok(PanelEvent::Continue);
        }

        let Some(id) = self.touched_node(touch.op) else {
            return Ok(PanelEvent::Continue);
        };
        self.touch_action(id, touch.operand, io, now_ms)
    }

    /// Encoder rotation, push or long press
    pub fn on_encoder(
        &mut self,
        event: InputEvent,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<PanelEvent, PanelError> {
        if self.wake(io, now_ms) || self.modal.is_some() {
            return Ok(PanelEvent::Continue);
        }
        let Some(page) = self
            .state
            .screen
            .user_page()
            .and_then(|p| self.catalog.page(p))
        else {
            return Ok(PanelEvent::Continue);
        };
        let focus = page.focus;

        let (target, slot) = match event {
            InputEvent::Cw(i) => (focus.enc.get(i as usize), Some(OpSlot::Increment)),
            InputEvent::Ccw(i) => (focus.enc.get(i as usize), Some(OpSlot::Decrement)),
            InputEvent::Push(i) => (focus.push.get(i as usize), None),
            InputEvent::LongPress(i) => (focus.long.get(i as usize), None),
        };
        let Some(id) = target.copied().flatten() else {
            return Ok(PanelEvent::Continue);
        };
        match slot {
            Some(slot) => {
                self.dispatch(id, slot, Operand::None, io)?;
                Ok(PanelEvent::Continue)
            }
            None => self.touch_action(id, 0, io, now_ms),
        }
    }

    /// Wake the backlight; true if the event woke a dimmed screen
    fn wake(&mut self, io: &mut PanelIo<'_>, now_ms: u32) -> bool {
        match self.power.handle(
            PowerInput::Wake,
            now_ms,
            &self.settings,
            &mut *io.sink,
            &mut *io.delay,
        ) {
            PowerOutcome::Woke => true,
            PowerOutcome::Refreshed => {
                self.state.touch(now_ms);
                false
            }
            _ => false,
        }
    }

    fn touched_node(&self, obj_id: u8) -> Option<NodeId> {
        let page = self.catalog.page(self.state.screen.user_page()?)?;
        page.nodes().iter().copied().find(|&id| {
            self.catalog
                .node(id)
                .is_some_and(|n| n.obj_id == obj_id)
        })
    }

    /// Hook, else paging target, else primary op
    ///
    /// `key` is the touched key within the object; key arrays send it as
    /// the operand.
    fn touch_action(
        &mut self,
        id: NodeId,
        key: u8,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<PanelEvent, PanelError> {
        let Some(node) = self.catalog.node(id) else {
            return Ok(PanelEvent::Continue);
        };
        if let Some(hook) = node.touch_hook {
            return self.run_hook(hook, id, io, now_ms);
        }
        if node.has(Caps::PAGING) {
            if let Some(target) = node.target_page {
                self.open_page(target, io, now_ms)?;
            }
            return Ok(PanelEvent::Continue);
        }
        let operand = match node.reg_ops[OpSlot::Primary.index()] {
            RegOp::Keys(_) => Operand::Value(i32::from(key)),
            _ => Operand::None,
        };
        self.dispatch(id, OpSlot::Primary, operand, io)?;
        Ok(PanelEvent::Continue)
    }

    fn run_hook(
        &mut self,
        hook: TouchHook,
        id: NodeId,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<PanelEvent, PanelError> {
        let value = self.catalog.node(id).map_or(0, |n| n.int_value());
        match hook {
            TouchHook::ToggleBinary => {
                let next = if value == 0 { 1 } else { 0 };
                self.dispatch(id, OpSlot::Primary, Operand::Value(next), io)?;
            }
            TouchHook::StepTristate => {
                self.dispatch(id, OpSlot::Primary, Operand::Value((value + 1) % 3), io)?;
            }
            TouchHook::Focus(group) => {
                let gate = io.gate;
                let _suspended = Suspended::new(gate);
                self.paging(io, now_ms).apply_focus(group as usize);
            }
            TouchHook::Unit(unit) => self.state.unit = unit,
            TouchHook::Keypad(kind) => self.open_keypad(kind, id, io),
            TouchHook::DimNow => {
                self.power.handle(
                    PowerInput::Dim,
                    now_ms,
                    &self.settings,
                    &mut *io.sink,
                    &mut *io.delay,
                );
            }
            TouchHook::CycleProfile => self.cycle_profile(id, io),
            TouchHook::AcceptProfile => {
                if self.state.profile_changed {
                    self.settings.commit(io.store)?;
                    return Ok(PanelEvent::Restart);
                }
            }
            TouchHook::Restart => return Ok(PanelEvent::Restart),
        }
        Ok(PanelEvent::Continue)
    }

    fn cycle_profile(&mut self, id: NodeId, io: &mut PanelIo<'_>) {
        let count = self.catalog.profile_count().max(1);
        let next = (self.settings.profile as usize + 1) % count;
        self.settings.profile = next as u8;
        self.state.profile_changed = true;
        if let Some(node) = self.catalog.node_mut(id) {
            node.set_int(next as i32);
        }

        // Light up the accept button
        let accept = self.state.screen.user_page().and_then(|p| {
            let page = self.catalog.page(p)?;
            page.nodes().iter().find_map(|&n| {
                self.catalog
                    .node(n)
                    .filter(|n| n.touch_hook == Some(TouchHook::AcceptProfile))
            })
        });
        if let Some(node) = accept.filter(|n| !n.tag.is_empty()) {
            io.sink.send_number(&node.tag, DEFAULT_TEXT_COLOR as i32);
        }
    }

    fn open_keypad(&mut self, kind: KeypadKind, node: NodeId, io: &mut PanelIo<'_>) {
        self.state.park_rubber_band();
        self.state.apply(ScreenEvent::OpenModal(None));
        io.sink.show_surface(KEYPAD_SURFACE);
        io.delay.delay_ms(PAGE_SETTLE_MS);

        let mut modal = Modal::Keypad(Keypad::new(kind, node));
        let mut ctx = modal_ctx(&mut self.catalog, &mut self.settings, io);
        modal.start(&mut ctx);
        self.modal = Some(modal);
    }

    fn exit_modal(&mut self, io: &mut PanelIo<'_>, now_ms: u32) -> Result<(), PanelError> {
        self.modal = None;
        self.state.restore_rubber_band();
        self.state.apply(ScreenEvent::ExitModal);
        if let Some(page) = self.state.screen.user_page() {
            self.open_page(page, io, now_ms)?;
        }
        Ok(())
    }

    fn open_page(
        &mut self,
        target: PageId,
        io: &mut PanelIo<'_>,
        now_ms: u32,
    ) -> Result<(), PanelError> {
        let outcome = self.paging(io, now_ms).open_page(target)?;
        self.after_paging(outcome, io);
        Ok(())
    }

    /// Start the program of a freshly shown modal page
    fn after_paging(&mut self, outcome: PageOutcome, io: &mut PanelIo<'_>) {
        if let PageOutcome::Modal(_, kind) = outcome {
            let mut modal = Modal::for_page(kind);
            let mut ctx = modal_ctx(&mut self.catalog, &mut self.settings, io);
            modal.start(&mut ctx);
            self.modal = Some(modal);
        }
    }

    fn dispatch(
        &mut self,
        id: NodeId,
        slot: OpSlot,
        operand: Operand,
        io: &mut PanelIo<'_>,
    ) -> Result<(), SimError> {
        CommandDispatcher::new(
            &mut self.catalog,
            &mut self.settings,
            &mut *io.sim,
            &mut *io.sink,
        )
        .with_unit(self.state.unit)
        .dispatch(id, slot, operand)
        .map(|_| ())
    }

    fn paging<'a>(&'a mut self, io: &'a mut PanelIo<'_>, now_ms: u32) -> PagingEngine<'a> {
        PagingEngine {
            catalog: &mut self.catalog,
            state: &mut self.state,
            settings: &mut self.settings,
            scheduler: &mut self.scheduler,
            store: &mut *io.store,
            sink: &mut *io.sink,
            delay: &mut *io.delay,
            gate: io.gate,
            now_ms,
        }
    }
}
