//! Keyboard simulation with `SendInput`.
//!
//! `SendInput` injects into the system input stream, the same path a
//! physical keyboard takes, so the events land in whichever window has
//! keyboard focus. No window handle is involved and the foreground window
//! is never changed.

use anyhow::{anyhow, Result};

use windows::Win32::UI::Input::KeyboardAndMouse::{
    MapVirtualKeyW, SendInput, VkKeyScanW, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT,
    KEYBD_EVENT_FLAGS, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE,
    MAPVK_VK_TO_VSC, VIRTUAL_KEY, VK_BACK, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE,
    VK_F1, VK_HOME, VK_INSERT, VK_LEFT, VK_MENU, VK_NEXT, VK_PRIOR, VK_RETURN, VK_RIGHT,
    VK_SHIFT, VK_SPACE, VK_TAB, VK_UP,
};

use super::{Key, KeyboardSink};

/// Keyboard backed by `SendInput`.
#[derive(Default)]
pub struct SendInputKeyboard;

impl KeyboardSink for SendInputKeyboard {
    fn send_key(&mut self, key: Key) -> Result<()> {
        let vk = virtual_key(key)?;
        send(&[key_input(key, vk, false), key_input(key, vk, true)])
    }

    fn send_chord(&mut self, keys: &[Key]) -> Result<()> {
        let mut inputs = Vec::with_capacity(keys.len() * 2);
        for &key in keys {
            inputs.push(key_input(key, virtual_key(key)?, false));
        }
        for &key in keys.iter().rev() {
            inputs.push(key_input(key, virtual_key(key)?, true));
        }
        send(&inputs)
    }

    fn release_keys(&mut self, keys: &[Key]) -> Result<()> {
        let mut inputs = Vec::with_capacity(keys.len());
        for &key in keys {
            inputs.push(key_input(key, virtual_key(key)?, true));
        }
        send(&inputs)
    }

    fn type_char(&mut self, c: char) -> Result<()> {
        // KEYEVENTF_UNICODE posts the character itself (VK_PACKET), so the
        // text is the same whatever layout the user has active.
        let mut units = [0u16; 2];
        let mut inputs = Vec::with_capacity(4);
        for &unit in c.encode_utf16(&mut units).iter() {
            inputs.push(unicode_input(unit, false));
            inputs.push(unicode_input(unit, true));
        }
        send(&inputs)
    }
}

/// Maps a key to its Windows virtual-key code.
fn virtual_key(key: Key) -> Result<VIRTUAL_KEY> {
    let vk = match key {
        Key::Char(c) if c.is_ascii_alphanumeric() => VIRTUAL_KEY(c.to_ascii_uppercase() as u16),
        Key::Char(c) => {
            // Low byte is the VK on the active layout, high byte the shift state
            let scan = if (c as u32) > 0xFFFF {
                -1
            } else {
                unsafe { VkKeyScanW(c as u16) }
            };
            if scan == -1 {
                return Err(anyhow!("No key produces {:?} on the current layout", c));
            }
            VIRTUAL_KEY((scan as u16) & 0xFF)
        }
        Key::Enter => VK_RETURN,
        Key::Backspace => VK_BACK,
        Key::Tab => VK_TAB,
        Key::Space => VK_SPACE,
        Key::Escape => VK_ESCAPE,
        Key::Control => VK_CONTROL,
        Key::Shift => VK_SHIFT,
        Key::Alt => VK_MENU,
        Key::Up => VK_UP,
        Key::Down => VK_DOWN,
        Key::Left => VK_LEFT,
        Key::Right => VK_RIGHT,
        Key::Home => VK_HOME,
        Key::End => VK_END,
        Key::PageUp => VK_PRIOR,
        Key::PageDown => VK_NEXT,
        Key::Insert => VK_INSERT,
        Key::Delete => VK_DELETE,
        Key::Function(n) => VIRTUAL_KEY(VK_F1.0 + (n.clamp(1, 24) as u16 - 1)),
    };
    Ok(vk)
}

/// Navigation keys live on the extended part of the keyboard.
fn is_extended(key: Key) -> bool {
    matches!(
        key,
        Key::Up
            | Key::Down
            | Key::Left
            | Key::Right
            | Key::Home
            | Key::End
            | Key::PageUp
            | Key::PageDown
            | Key::Insert
            | Key::Delete
    )
}

fn key_input(key: Key, vk: VIRTUAL_KEY, key_up: bool) -> INPUT {
    // Games reading raw input look at the scan code, not the VK
    let scan = unsafe { MapVirtualKeyW(vk.0 as u32, MAPVK_VK_TO_VSC) } as u16;

    let mut flags = KEYBD_EVENT_FLAGS::default();
    if key_up {
        flags = flags | KEYEVENTF_KEYUP;
    }
    if is_extended(key) {
        flags = flags | KEYEVENTF_EXTENDEDKEY;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                ..Default::default()
            },
        },
    }
}

fn unicode_input(unit: u16, key_up: bool) -> INPUT {
    let mut flags = KEYEVENTF_UNICODE;
    if key_up {
        flags = flags | KEYEVENTF_KEYUP;
    }

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: unit,
                dwFlags: flags,
                ..Default::default()
            },
        },
    }
}

fn send(inputs: &[INPUT]) -> Result<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(anyhow!(
            "SendInput delivered {} of {} events (input blocked by a higher-integrity window?)",
            sent,
            inputs.len()
        ));
    }
    Ok(())
}
