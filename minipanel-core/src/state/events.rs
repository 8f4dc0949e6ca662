//! Events that move the screen between pages

use crate::page::PageId;

/// Screen transition requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScreenEvent {
    /// A user page was opened
    OpenUser(PageId),
    /// A modal program was started, on a catalog page or as an overlay
    OpenModal(Option<PageId>),
    /// The modal program finished
    ExitModal,
}

impl ScreenEvent {
    /// Page the event targets, if any
    pub fn target(&self) -> Option<PageId> {
        match self {
            ScreenEvent::OpenUser(p) => Some(*p),
            ScreenEvent::OpenModal(p) => *p,
            ScreenEvent::ExitModal => None,
        }
    }
}
