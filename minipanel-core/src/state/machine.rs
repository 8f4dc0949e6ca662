//! Screen state machine
//!
//! What the display shows is a function of the current screen and a
//! [`ScreenEvent`]. Modal programs remember the user page they replaced.

use super::events::ScreenEvent;
use crate::page::PageId;

/// Screen states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen {
    /// No page opened yet
    #[default]
    Boot,
    User(PageId),
    Modal {
        /// `None` for overlays such as the keypad
        page: Option<PageId>,
        /// User page restored on exit
        previous: Option<PageId>,
    },
}

impl Screen {
    /// Catalog page currently on the display
    pub fn current_page(&self) -> Option<PageId> {
        match *self {
            Screen::Boot => None,
            Screen::User(p) => Some(p),
            Screen::Modal { page, .. } => page,
        }
    }

    /// User page that is showing or will be restored
    pub fn user_page(&self) -> Option<PageId> {
        match *self {
            Screen::Boot => None,
            Screen::User(p) => Some(p),
            Screen::Modal { previous, .. } => previous,
        }
    }

    pub fn is_modal(&self) -> bool {
        matches!(self, Screen::Modal { .. })
    }

    /// Process an event and return the next screen
    pub fn transition(self, event: ScreenEvent) -> Self {
        use ScreenEvent::*;

        match (self, event) {
            (Screen::Boot | Screen::User(_), OpenUser(p)) => Screen::User(p),
            (Screen::Modal { .. }, OpenUser(p)) => Screen::User(p),

            (Screen::Boot, OpenModal(page)) => Screen::Modal {
                page,
                previous: None,
            },
            (Screen::User(prev), OpenModal(page)) => Screen::Modal {
                page,
                previous: Some(prev),
            },

            (Screen::Modal { previous, .. }, ExitModal) => match previous {
                Some(p) => Screen::User(p),
                None => Screen::Boot,
            },

            // Modals do not nest
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_to_user() {
        let s = Screen::Boot.transition(ScreenEvent::OpenUser(PageId(0)));
        assert_eq!(s, Screen::User(PageId(0)));
        assert_eq!(s.current_page(), Some(PageId(0)));
    }

    #[test]
    fn test_modal_restores_previous() {
        let s = Screen::User(PageId(3)).transition(ScreenEvent::OpenModal(Some(PageId(9))));
        assert_eq!(s.current_page(), Some(PageId(9)));
        assert_eq!(s.user_page(), Some(PageId(3)));
        assert!(s.is_modal());
        let s = s.transition(ScreenEvent::ExitModal);
        assert_eq!(s, Screen::User(PageId(3)));
    }

    #[test]
    fn test_modals_do_not_nest() {
        let s = Screen::User(PageId(1)).transition(ScreenEvent::OpenModal(None));
        assert_eq!(s.transition(ScreenEvent::OpenModal(Some(PageId(9)))), s);
    }

    #[test]
    fn test_exit_without_modal_is_ignored() {
        assert_eq!(
            Screen::User(PageId(2)).transition(ScreenEvent::ExitModal),
            Screen::User(PageId(2))
        );
        assert_eq!(Screen::Boot.transition(ScreenEvent::ExitModal), Screen::Boot);
    }

    #[test]
    fn test_modal_from_boot_exits_to_boot() {
        let s = Screen::Boot.transition(ScreenEvent::OpenModal(Some(PageId(4))));
        assert_eq!(s.transition(ScreenEvent::ExitModal), Screen::Boot);
    }
}
