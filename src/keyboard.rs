//! Interactive cancel key on a dedicated OS thread.
//!
//! [`EscapeWatcher`] puts the terminal into raw mode and polls crossterm
//! key events every 100 ms.  Esc (or Ctrl+C, which raw mode no longer turns
//! into SIGINT) cancels the shared [`CancellationToken`]; the poll loop
//! observes the token and stops.
//!
//! Dropping the watcher stops the thread, joins it and restores the
//! terminal.

use std::io::IsTerminal;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// `true` for the keys that stop watching the job.
pub fn is_cancel_key(key: &KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char('c') | KeyCode::Char('C') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Handle to the running key watcher.
pub struct EscapeWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EscapeWatcher {
    /// Start watching.  Returns `None` when stdin is not a terminal or raw
    /// mode is unavailable; the run then simply cannot be interrupted by key.
    pub fn start(cancel: CancellationToken) -> Option<Self> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        if let Err(e) = crossterm::terminal::enable_raw_mode() {
            log::warn!("cancel key unavailable: {e}");
            return None;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let spawned = std::thread::Builder::new()
            .name("escape-watcher".into())
            .spawn(move || watch_keys(&stop_clone, &cancel));

        match spawned {
            Ok(thread) => Some(Self {
                stop,
                thread: Some(thread),
            }),
            Err(e) => {
                let _ = crossterm::terminal::disable_raw_mode();
                log::warn!("could not spawn escape-watcher thread: {e}");
                None
            }
        }
    }
}

fn watch_keys(stop: &AtomicBool, cancel: &CancellationToken) {
    while !stop.load(Ordering::Relaxed) && !cancel.is_cancelled() {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) if is_cancel_key(&key) => {
                    log::debug!("cancel key pressed");
                    cancel.cancel();
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("escape-watcher: reading terminal event failed: {e}");
                    return;
                }
            },
            Ok(false) => {}
            Err(e) => {
                log::warn!("escape-watcher: polling terminal failed: {e}");
                return;
            }
        }
    }
}

impl Drop for EscapeWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn escape_cancels() {
        assert!(is_cancel_key(&press(KeyCode::Esc, KeyModifiers::NONE)));
    }

    #[test]
    fn ctrl_c_cancels() {
        assert!(is_cancel_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_cancel_key(&press(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn other_keys_and_releases_are_ignored() {
        assert!(!is_cancel_key(&press(KeyCode::Enter, KeyModifiers::NONE)));
        let mut release = press(KeyCode::Esc, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert!(!is_cancel_key(&release));
    }
}
