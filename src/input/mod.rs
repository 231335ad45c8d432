//! Keyboard injection into the focused window.
//!
//! This module provides:
//! - Key names as found in config.json (`Key`)
//! - The `KeyboardSink` seam: keys, chords and typed characters, with no
//!   notion of a target window
//! - The fixed reply sequence (`inject`)
//! - A `SendInput` backend (`SendInputKeyboard`, Windows only)
//!
//! Nothing here activates, raises or looks up a window. Events go to
//! whatever window the OS currently routes keyboard input to.

#[cfg(windows)]
pub mod sendinput;

#[cfg(windows)]
pub use sendinput::SendInputKeyboard;

use anyhow::{anyhow, Result};
use std::time::Duration;

/// A single physical key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// A key identified by the character it types on the active layout.
    Char(char),
    Enter,
    Backspace,
    Tab,
    Space,
    Escape,
    Control,
    Shift,
    Alt,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// F1 to F24.
    Function(u8),
}

impl Key {
    /// Parses a key name such as `t`, `enter`, `f2` or `/`.
    pub fn parse(name: &str) -> Result<Key> {
        let name = name.trim();
        let lower = name.to_ascii_lowercase();

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Ok(Key::Char(c.to_ascii_lowercase()));
        }

        let key = match lower.as_str() {
            "" => return Err(anyhow!("Key name is empty")),
            "enter" | "return" => Key::Enter,
            "backspace" => Key::Backspace,
            "tab" => Key::Tab,
            "space" => Key::Space,
            "esc" | "escape" => Key::Escape,
            "ctrl" | "control" => Key::Control,
            "shift" => Key::Shift,
            "alt" => Key::Alt,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" | "page up" => Key::PageUp,
            "pagedown" | "page down" => Key::PageDown,
            "insert" => Key::Insert,
            "delete" | "del" => Key::Delete,
            other => match other.strip_prefix('f').map(str::parse::<u8>) {
                Some(Ok(n)) if (1..=24).contains(&n) => Key::Function(n),
                _ => return Err(anyhow!("Unknown key name: {:?}", name)),
            },
        };

        Ok(key)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::Enter => write!(f, "enter"),
            Key::Backspace => write!(f, "backspace"),
            Key::Tab => write!(f, "tab"),
            Key::Space => write!(f, "space"),
            Key::Escape => write!(f, "esc"),
            Key::Control => write!(f, "ctrl"),
            Key::Shift => write!(f, "shift"),
            Key::Alt => write!(f, "alt"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
            Key::Home => write!(f, "home"),
            Key::End => write!(f, "end"),
            Key::PageUp => write!(f, "page up"),
            Key::PageDown => write!(f, "page down"),
            Key::Insert => write!(f, "insert"),
            Key::Delete => write!(f, "delete"),
            Key::Function(n) => write!(f, "f{}", n),
        }
    }
}

/// Synthetic keyboard that delivers to the OS input focus.
pub trait KeyboardSink: Send {
    /// Presses and releases one key.
    fn send_key(&mut self, key: Key) -> Result<()>;

    /// Presses `keys` in order, then releases them in reverse.
    fn send_chord(&mut self, keys: &[Key]) -> Result<()>;

    /// Sends key-up for each of `keys` without pressing them first.
    fn release_keys(&mut self, keys: &[Key]) -> Result<()>;

    /// Types one character independent of the keyboard layout.
    fn type_char(&mut self, c: char) -> Result<()>;

    /// Types `text` one character at a time.
    fn type_text(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            self.type_char(c)?;
        }
        Ok(())
    }
}

/// Modifiers released before typing. A held Shift would otherwise turn the
/// select-all into Ctrl+Shift+A and change the case of typed letters.
pub const MODIFIERS: [Key; 3] = [Key::Shift, Key::Control, Key::Alt];

/// Pauses between the steps of the reply sequence, giving the game a frame
/// or two to open and clear its chat box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionTiming {
    pub after_chat_key: Duration,
    pub after_select_all: Duration,
    pub after_clear: Duration,
    pub before_submit: Duration,
}

impl Default for InjectionTiming {
    fn default() -> Self {
        Self {
            after_chat_key: Duration::from_millis(100),
            after_select_all: Duration::from_millis(20),
            after_clear: Duration::from_millis(20),
            before_submit: Duration::from_millis(30),
        }
    }
}

impl InjectionTiming {
    /// No pauses at all.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            after_chat_key: Duration::ZERO,
            after_select_all: Duration::ZERO,
            after_clear: Duration::ZERO,
            before_submit: Duration::ZERO,
        }
    }
}

/// Types `command` into the game's chat:
/// modifier release, chat key, Ctrl+A, Backspace, the command, Enter.
///
/// Runs to completion or to the first failing step; partially typed input
/// is cleared by the Ctrl+A/Backspace of the next attempt. Modifiers the
/// user is physically holding are released and stay released.
pub fn inject(
    keyboard: &mut dyn KeyboardSink,
    chat_key: Key,
    command: &str,
    timing: &InjectionTiming,
) -> Result<()> {
    keyboard.release_keys(&MODIFIERS)?;

    keyboard.send_key(chat_key)?;
    pause(timing.after_chat_key);

    keyboard.send_chord(&[Key::Control, Key::Char('a')])?;
    pause(timing.after_select_all);

    keyboard.send_key(Key::Backspace)?;
    pause(timing.after_clear);

    keyboard.type_text(command)?;
    pause(timing.before_submit);

    keyboard.send_key(Key::Enter)
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
