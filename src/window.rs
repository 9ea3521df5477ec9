//! Window host port and lifecycle policy.
//! The capture bridge hides the window before grabbing the screen and shows it afterwards.
//! `TerminalWindow` is the host used by the CLI: it tracks visibility and gives the
//! terminal a moment to get out of the way before a capture.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::settings::Settings;

/// Host window-control channel. Fire-and-forget, no payload.
pub trait WindowHost {
    fn hide(&self);
    fn show(&self);
    fn set_always_on_top(&self, on_top: bool);
}

impl<W: WindowHost + ?Sized> WindowHost for Arc<W> {
    fn hide(&self) {
        (**self).hide()
    }

    fn show(&self) {
        (**self).show()
    }

    fn set_always_on_top(&self, on_top: bool) {
        (**self).set_always_on_top(on_top)
    }
}

pub struct TerminalWindow {
    visible: AtomicBool,
    always_on_top: AtomicBool,
    hide_settle: Duration,
}

impl TerminalWindow {
    pub fn new(hide_settle: Duration) -> Self {
        Self {
            visible: AtomicBool::new(true),
            always_on_top: AtomicBool::new(false),
            hide_settle,
        }
    }

    #[cfg(test)]
    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn is_always_on_top(&self) -> bool {
        self.always_on_top.load(Ordering::SeqCst)
    }
}

impl WindowHost for TerminalWindow {
    fn hide(&self) {
        self.visible.store(false, Ordering::SeqCst);
        log::debug!("Window hidden");
        if !self.hide_settle.is_zero() {
            thread::sleep(self.hide_settle);
        }
    }

    fn show(&self) {
        self.visible.store(true, Ordering::SeqCst);
        log::debug!("Window shown");
    }

    fn set_always_on_top(&self, on_top: bool) {
        self.always_on_top.store(on_top, Ordering::SeqCst);
        // Stacking is up to the terminal emulator.
        log::debug!("Always-on-top set to {on_top}");
    }
}

/// What closing the main window does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAction {
    Minimize,
    Quit,
}

pub fn close_action(settings: &Settings) -> CloseAction {
    if settings.minimize_on_close {
        CloseAction::Minimize
    } else {
        CloseAction::Quit
    }
}

/// Whether the app quits once every window is closed. macOS apps stay alive.
pub fn quit_on_all_closed(os: &str) -> bool {
    os != "macos"
}
