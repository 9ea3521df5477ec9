//! Global restore shortcut with graceful fallback.
//! Pressing it shows the main window regardless of focus.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use crate::window::WindowHost;

/// Label shown to the user for [`restore_hotkey`].
pub const RESTORE_SHORTCUT: &str = "Ctrl+Shift+A";

pub fn restore_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::CONTROL | Modifiers::SHIFT), Code::KeyA)
}

/// Whether hotkey events reach a thread that is not running the platform event loop.
/// Windows needs a message pump and macOS the main run loop; X11 has its own thread.
pub fn delivers_without_event_loop(os: &str) -> bool {
    os == "linux"
}

/// Only a key-down of our own hotkey restores the window.
pub fn is_restore_event(event: &GlobalHotKeyEvent, hotkey: &HotKey) -> bool {
    event.state == HotKeyState::Pressed && event.id == hotkey.id()
}

/// Restore presses forwarded by the listener thread.
pub struct RestoreSignal {
    presses: Receiver<()>,
}

impl RestoreSignal {
    pub fn channel() -> (Sender<()>, Self) {
        let (tx, presses) = mpsc::channel();
        (tx, Self { presses })
    }

    /// Blocks until a press arrives after the call, or until `timeout` runs out.
    /// Presses made while the window was still visible do not count.
    /// Returns `false` on timeout or when the listener is gone.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let stale = self.presses.try_iter().count();
        if stale > 0 {
            log::debug!("Ignoring {stale} restore press(es) made before minimizing");
        }
        match timeout {
            Some(timeout) => self.presses.recv_timeout(timeout).is_ok(),
            None => self.presses.recv().is_ok(),
        }
    }
}

/// A registered restore shortcut. Dropping it unregisters the hotkey.
pub struct RestoreShortcut {
    _manager: GlobalHotKeyManager,
    signal: RestoreSignal,
}

impl RestoreShortcut {
    /// Blocks until the shortcut is pressed. Returns `false` if the listener is gone.
    pub fn wait_for_restore(&self) -> bool {
        self.signal.wait(None)
    }
}

/// Registers the restore shortcut to show `window`. Returns `None` (after logging why)
/// when the platform refuses or cannot deliver events to a blocked shell; the caller
/// then restores on Enter.
pub fn register_restore_shortcut<W>(window: Arc<W>) -> Option<RestoreShortcut>
where
    W: WindowHost + Send + Sync + 'static,
{
    let os = std::env::consts::OS;
    if !delivers_without_event_loop(os) {
        log::info!("Global shortcut needs a platform event loop on {os}. Restoring on Enter.");
        return None;
    }

    let manager = match GlobalHotKeyManager::new() {
        Ok(m) => m,
        Err(e) => {
            log::warn!("Global hotkeys unavailable: {e}. Continuing without hotkey.");
            return None;
        }
    };

    let hotkey = restore_hotkey();
    if let Err(e) = manager.register(hotkey) {
        log::warn!(
            "Failed to register restore shortcut {RESTORE_SHORTCUT}: {e}. \
             Continuing without hotkey."
        );
        return None;
    }
    log::info!("Global restore shortcut registered: {RESTORE_SHORTCUT}");

    let (tx, signal) = RestoreSignal::channel();
    let receiver = GlobalHotKeyEvent::receiver();
    thread::spawn(move || {
        while let Ok(event) = receiver.recv() {
            if !is_restore_event(&event, &hotkey) {
                continue;
            }
            window.show();
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    Some(RestoreShortcut { _manager: manager, signal })
}
