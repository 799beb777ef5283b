//! Keycodes, modifier bits, and the symbolic scalars shared by every device.
//!
//! Every reading in the engine is an `i64`. Devices and event records agree on
//! a small set of symbolic values (see [`symbol`]) so that one predicate can be
//! tested against a polled keyboard table or a queued key press alike: a key
//! that is down reads [`symbol::PRESSED`] in both worlds.
//!
//! # Example
//!
//! ```
//! use cue_events::keys::Keycode;
//!
//! assert_eq!(Keycode::from_name("a"), Some(Keycode::from_char('a')));
//! assert_eq!(Keycode::from_name("<ESC>"), Some(Keycode::ESCAPE));
//! assert_eq!(Keycode::SPACE.name(), " ");
//! assert_eq!(Keycode::ANY_KEY.name(), "<anykey>");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Symbolic scalars
// ---------------------------------------------------------------------------

/// Symbolic integer values shared by devices, records and predicates.
pub mod symbol {
    /// No meaningful reading (unmatched key, unsupported channel).
    pub const UNKNOWN: i64 = 0;
    pub const UP: i64 = 1;
    pub const DOWN: i64 = 2;
    pub const LEFT: i64 = 3;
    pub const RIGHT: i64 = 4;
    /// A key or button is down.
    pub const PRESSED: i64 = 5;
    /// A key or button is up.
    pub const RELEASED: i64 = 6;
    pub const MOVEMENT: i64 = 7;
    pub const TIMEOUT: i64 = 8;
    pub const EQUALS: i64 = 9;
    pub const DIFFERS: i64 = 10;
    /// Channel selecting the width of a window-resize record.
    pub const WINDOW_WIDTH: i64 = 11;
    /// Channel selecting the height of a window-resize record.
    pub const WINDOW_HEIGHT: i64 = 12;
    pub const TEXT_INPUT: i64 = 13;
}

// ---------------------------------------------------------------------------
// KeyState
// ---------------------------------------------------------------------------

/// Up/down state of a key or mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyState {
    #[default]
    Unknown,
    Pressed,
    Released,
}

impl KeyState {
    /// The symbolic scalar for this state.
    pub fn as_scalar(self) -> i64 {
        match self {
            KeyState::Unknown => symbol::UNKNOWN,
            KeyState::Pressed => symbol::PRESSED,
            KeyState::Released => symbol::RELEASED,
        }
    }

    /// Script marker used in mouse-button result lists.
    pub fn marker(self) -> &'static str {
        match self {
            KeyState::Pressed => "<pressed>",
            KeyState::Released | KeyState::Unknown => "<released>",
        }
    }
}

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Modifier keys held while a key event was produced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u16 {
        const LSHIFT = 0x0001;
        const RSHIFT = 0x0002;
        const LCTRL = 0x0040;
        const RCTRL = 0x0080;
        const LALT = 0x0100;
        const RALT = 0x0200;
        const LMETA = 0x0400;
        const RMETA = 0x0800;
        const NUM = 0x1000;
        const CAPS = 0x2000;
        const MODE = 0x4000;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const META = Self::LMETA.bits() | Self::RMETA.bits();
    }
}

impl Modifiers {
    /// True when at least one key of each of shift, ctrl and alt is held.
    pub fn has_shift_ctrl_alt(self) -> bool {
        self.intersects(Modifiers::SHIFT)
            && self.intersects(Modifiers::CTRL)
            && self.intersects(Modifiers::ALT)
    }
}

// ---------------------------------------------------------------------------
// Keycode
// ---------------------------------------------------------------------------

/// Layout-independent key identity.
///
/// Printable keys use their lowercase ASCII value; special keys use the
/// platform's extended range. [`Keycode::ANY_KEY`] is a sentinel channel that
/// matches every key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Keycode(pub i64);

const EXT: i64 = 1 << 30;

impl Keycode {
    pub const UNKNOWN: Keycode = Keycode(0);
    pub const BACKSPACE: Keycode = Keycode(8);
    pub const TAB: Keycode = Keycode(9);
    pub const RETURN: Keycode = Keycode(13);
    pub const ESCAPE: Keycode = Keycode(27);
    pub const SPACE: Keycode = Keycode(32);
    pub const BACKSLASH: Keycode = Keycode(92);
    pub const DELETE: Keycode = Keycode(127);
    /// Matches any key when used as a channel.
    pub const ANY_KEY: Keycode = Keycode(1000);

    pub const CAPSLOCK: Keycode = Keycode(EXT | 57);
    pub const F1: Keycode = Keycode(EXT | 58);
    pub const F2: Keycode = Keycode(EXT | 59);
    pub const F3: Keycode = Keycode(EXT | 60);
    pub const F4: Keycode = Keycode(EXT | 61);
    pub const F5: Keycode = Keycode(EXT | 62);
    pub const F6: Keycode = Keycode(EXT | 63);
    pub const F7: Keycode = Keycode(EXT | 64);
    pub const F8: Keycode = Keycode(EXT | 65);
    pub const F9: Keycode = Keycode(EXT | 66);
    pub const F10: Keycode = Keycode(EXT | 67);
    pub const F11: Keycode = Keycode(EXT | 68);
    pub const F12: Keycode = Keycode(EXT | 69);
    pub const SCROLLLOCK: Keycode = Keycode(EXT | 71);
    pub const PAUSE: Keycode = Keycode(EXT | 72);
    pub const INSERT: Keycode = Keycode(EXT | 73);
    pub const HOME: Keycode = Keycode(EXT | 74);
    pub const PAGEUP: Keycode = Keycode(EXT | 75);
    pub const END: Keycode = Keycode(EXT | 77);
    pub const PAGEDOWN: Keycode = Keycode(EXT | 78);
    pub const RIGHT: Keycode = Keycode(EXT | 79);
    pub const LEFT: Keycode = Keycode(EXT | 80);
    pub const DOWN: Keycode = Keycode(EXT | 81);
    pub const UP: Keycode = Keycode(EXT | 82);
    pub const NUMLOCK: Keycode = Keycode(EXT | 83);
    pub const KP_ENTER: Keycode = Keycode(EXT | 88);
    pub const LCTRL: Keycode = Keycode(EXT | 224);
    pub const LSHIFT: Keycode = Keycode(EXT | 225);
    pub const LALT: Keycode = Keycode(EXT | 226);
    pub const RCTRL: Keycode = Keycode(EXT | 228);
    pub const RSHIFT: Keycode = Keycode(EXT | 229);
    pub const RALT: Keycode = Keycode(EXT | 230);

    /// Keycode for a printable character. Uppercase letters map to their
    /// lowercase key.
    pub fn from_char(c: char) -> Keycode {
        Keycode(c.to_ascii_lowercase() as i64)
    }

    /// The channel id this key is tested on.
    pub fn channel(self) -> i64 {
        self.0
    }

    /// Translate a script key name into a keycode.
    ///
    /// Single printable characters map to themselves; bracketed names such as
    /// `"<return>"` or `"<F1>"` are matched case-insensitively. Returns `None`
    /// for names that do not denote a key.
    pub fn from_name(name: &str) -> Option<Keycode> {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.clone().next()) {
            if c.is_ascii_graphic() || c == ' ' {
                return Some(Keycode::from_char(c));
            }
        }

        let lowered = name.to_ascii_lowercase();
        if lowered == "<space>" {
            return Some(Keycode::SPACE);
        }
        if lowered == "<escape>" {
            return Some(Keycode::ESCAPE);
        }
        if lowered == "<back>" {
            return Some(Keycode::BACKSPACE);
        }
        NAMED_KEYS
            .iter()
            .find(|(_, n)| *n == lowered)
            .map(|(code, _)| *code)
    }

    /// Script name for this key.
    ///
    /// Printable keys translate to the character itself, special keys to a
    /// bracketed name. Codes with no known name translate to `"<unknown>"`.
    pub fn name(self) -> String {
        if let Some((_, n)) = NAMED_KEYS.iter().find(|(code, _)| *code == self) {
            return (*n).to_owned();
        }
        match u8::try_from(self.0) {
            Ok(b) if b == b' ' || b.is_ascii_graphic() => (b as char).to_string(),
            _ => "<unknown>".to_owned(),
        }
    }

    /// Script name honouring the shift modifier for letters.
    pub fn name_with(self, modifiers: Modifiers) -> String {
        let name = self.name();
        if modifiers.intersects(Modifiers::SHIFT) && name.len() == 1 {
            name.to_ascii_uppercase()
        } else {
            name
        }
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

const NAMED_KEYS: &[(Keycode, &str)] = &[
    (Keycode::UNKNOWN, "<unknown>"),
    (Keycode::ANY_KEY, "<anykey>"),
    (Keycode::BACKSPACE, "<backspace>"),
    (Keycode::TAB, "<tab>"),
    (Keycode::RETURN, "<return>"),
    (Keycode::KP_ENTER, "<return>"),
    (Keycode::ESCAPE, "<esc>"),
    (Keycode::DELETE, "<delete>"),
    (Keycode::PAUSE, "<pause>"),
    (Keycode::UP, "<up>"),
    (Keycode::DOWN, "<down>"),
    (Keycode::RIGHT, "<right>"),
    (Keycode::LEFT, "<left>"),
    (Keycode::INSERT, "<insert>"),
    (Keycode::HOME, "<home>"),
    (Keycode::END, "<end>"),
    (Keycode::PAGEUP, "<pageup>"),
    (Keycode::PAGEDOWN, "<pagedown>"),
    (Keycode::F1, "<f1>"),
    (Keycode::F2, "<f2>"),
    (Keycode::F3, "<f3>"),
    (Keycode::F4, "<f4>"),
    (Keycode::F5, "<f5>"),
    (Keycode::F6, "<f6>"),
    (Keycode::F7, "<f7>"),
    (Keycode::F8, "<f8>"),
    (Keycode::F9, "<f9>"),
    (Keycode::F10, "<f10>"),
    (Keycode::F11, "<f11>"),
    (Keycode::F12, "<f12>"),
    (Keycode::NUMLOCK, "<numlock>"),
    (Keycode::CAPSLOCK, "<capslock>"),
    (Keycode::SCROLLLOCK, "<scrolllock>"),
    (Keycode::RSHIFT, "<rshift>"),
    (Keycode::LSHIFT, "<lshift>"),
    (Keycode::RCTRL, "<rctrl>"),
    (Keycode::LCTRL, "<lctrl>"),
    (Keycode::RALT, "<ralt>"),
    (Keycode::LALT, "<lalt>"),
];
