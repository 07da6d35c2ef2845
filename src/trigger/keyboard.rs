//! Keyboard-key trigger line backed by `rdev`.
//!
//! `rdev::listen` is a blocking OS-level call that never returns while the
//! process is alive, so it lives on its own `key-listener` thread. The
//! callback mirrors the watched key's state into an [`AtomicBool`] that the
//! debounce detector samples like any other line.
//!
//! # Shutdown caveat
//!
//! `rdev::listen` has no graceful shutdown API. Dropping [`KeyboardLine`]
//! sets a stop flag so the callback stops touching the level, but the OS
//! thread stays blocked in rdev until the process exits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc, Arc,
};
use std::time::Duration;

use super::line::{LevelReader, LineError};

/// How long `start` waits for rdev to report an immediate failure (no X
/// display, no input permission).
const STARTUP_GRACE: Duration = Duration::from_millis(200);

// ---------------------------------------------------------------------------
// KeyboardLine
// ---------------------------------------------------------------------------

/// A trigger line driven by one keyboard key.
pub struct KeyboardLine {
    pressed: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    _thread: std::thread::JoinHandle<()>,
}

impl KeyboardLine {
    /// Spawn the listener thread for `key_name` (see [`parse_key`]).
    pub fn start(key_name: &str) -> Result<Self, LineError> {
        let key = parse_key(key_name)
            .ok_or_else(|| LineError::Unavailable(format!("unknown key name {key_name:?}")))?;

        let pressed = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let (err_tx, err_rx) = mpsc::channel::<String>();

        let thread = {
            let pressed = Arc::clone(&pressed);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("key-listener".into())
                .spawn(move || {
                    let result = rdev::listen(move |event| {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        match event.event_type {
                            rdev::EventType::KeyPress(k) if k == key => {
                                pressed.store(true, Ordering::Relaxed);
                            }
                            rdev::EventType::KeyRelease(k) if k == key => {
                                pressed.store(false, Ordering::Relaxed);
                            }
                            _ => {}
                        }
                    });

                    if let Err(e) = result {
                        log::error!("trigger: rdev::listen exited with error: {e:?}");
                        let _ = err_tx.send(format!("{e:?}"));
                    }
                })
                .map_err(|e| LineError::Unavailable(format!("cannot spawn key listener: {e}")))?
        };

        if let Ok(reason) = err_rx.recv_timeout(STARTUP_GRACE) {
            return Err(LineError::Unavailable(format!("keyboard listener: {reason}")));
        }

        log::info!("trigger: listening for key {key_name}");
        Ok(Self {
            pressed,
            stop,
            _thread: thread,
        })
    }
}

impl LevelReader for KeyboardLine {
    fn is_asserted(&mut self) -> Result<bool, LineError> {
        Ok(self.pressed.load(Ordering::Relaxed))
    }

    fn backend(&self) -> &'static str {
        "keyboard"
    }
}

impl Drop for KeyboardLine {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name from a config string into an [`rdev::Key`].
///
/// Supports F1–F12, a few named keys, and single ASCII letters (either case).
///
/// ```
/// use book_reader::trigger::parse_key;
///
/// assert_eq!(parse_key("F9"),    Some(rdev::Key::F9));
/// assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
/// assert_eq!(parse_key("r"),     Some(rdev::Key::KeyR));
/// assert_eq!(parse_key("xyz"),   None);
/// ```
pub fn parse_key(key_str: &str) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match key_str {
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        "Space" => Key::Space,
        "Return" | "Enter" => Key::Return,
        "Escape" | "Esc" => Key::Escape,
        "Tab" => Key::Tab,
        "Pause" => Key::Pause,
        "ScrollLock" => Key::ScrollLock,
        s if s.len() == 1 => return letter_key(s.chars().next()?),
        _ => return None,
    };
    Some(key)
}

fn letter_key(c: char) -> Option<rdev::Key> {
    use rdev::Key;

    let key = match c.to_ascii_uppercase() {
        'A' => Key::KeyA,
        'B' => Key::KeyB,
        'C' => Key::KeyC,
        'D' => Key::KeyD,
        'E' => Key::KeyE,
        'F' => Key::KeyF,
        'G' => Key::KeyG,
        'H' => Key::KeyH,
        'I' => Key::KeyI,
        'J' => Key::KeyJ,
        'K' => Key::KeyK,
        'L' => Key::KeyL,
        'M' => Key::KeyM,
        'N' => Key::KeyN,
        'O' => Key::KeyO,
        'P' => Key::KeyP,
        'Q' => Key::KeyQ,
        'R' => Key::KeyR,
        'S' => Key::KeyS,
        'T' => Key::KeyT,
        'U' => Key::KeyU,
        'V' => Key::KeyV,
        'W' => Key::KeyW,
        'X' => Key::KeyX,
        'Y' => Key::KeyY,
        'Z' => Key::KeyZ,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_function_keys() {
        assert_eq!(parse_key("F1"), Some(rdev::Key::F1));
        assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
        assert_eq!(parse_key("F12"), Some(rdev::Key::F12));
    }

    #[test]
    fn parse_named_keys() {
        assert_eq!(parse_key("Space"), Some(rdev::Key::Space));
        assert_eq!(parse_key("Enter"), Some(rdev::Key::Return));
        assert_eq!(parse_key("Esc"), Some(rdev::Key::Escape));
    }

    #[test]
    fn parse_letters_case_insensitive() {
        assert_eq!(parse_key("a"), Some(rdev::Key::KeyA));
        assert_eq!(parse_key("Z"), Some(rdev::Key::KeyZ));
    }

    #[test]
    fn parse_unknown_key_returns_none() {
        assert_eq!(parse_key(""), None);
        assert_eq!(parse_key("7"), None);
        assert_eq!(parse_key("Ctrl+R"), None);
    }

    #[test]
    fn unknown_key_name_is_unavailable() {
        assert!(matches!(
            KeyboardLine::start("NotAKey"),
            Err(LineError::Unavailable(_))
        ));
    }
}
