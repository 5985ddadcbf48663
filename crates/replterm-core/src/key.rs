#![forbid(unsafe_code)]

//! Normalized key events and the line editor's key-dispatch policy.
//!
//! The web host forwards `KeyboardEvent.key` strings plus a modifier bitset.
//! This module turns them into a [`KeyEvent`] and decides which of them the
//! line editor consumes ([`EditorIntent::from_key`]). Everything the editor
//! does not consume is left to the host's default handling (copy shortcuts,
//! function keys, browser navigation).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier keys held during a key event.
    ///
    /// Encoded as a compact `u8` bitset (`mods`) in replay traces.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

/// Key codes the terminal distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    /// A single printable character.
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function key (F1-F24).
    F(u8),
    /// Anything the normalizer does not recognize (`"Dead"`, `"Shift"`, ...).
    Unidentified(Box<str>),
}

impl KeyCode {
    /// Normalize a DOM `KeyboardEvent.key` value.
    ///
    /// Single-character keys map to [`KeyCode::Char`] (the DOM already applied
    /// shift), named keys map to their variants, and everything else is
    /// [`KeyCode::Unidentified`].
    #[must_use]
    pub fn from_dom_key(dom_key: &str) -> Self {
        let mut chars = dom_key.chars();
        if let Some(first) = chars.next()
            && chars.next().is_none()
        {
            return Self::Char(first);
        }

        match dom_key {
            "Enter" => Self::Enter,
            "Escape" | "Esc" => Self::Escape,
            "Backspace" => Self::Backspace,
            "Tab" => Self::Tab,
            "Delete" | "Del" => Self::Delete,
            "Home" => Self::Home,
            "End" => Self::End,
            "PageUp" => Self::PageUp,
            "PageDown" => Self::PageDown,
            "ArrowUp" | "Up" => Self::Up,
            "ArrowDown" | "Down" => Self::Down,
            "ArrowLeft" | "Left" => Self::Left,
            "ArrowRight" | "Right" => Self::Right,
            "Spacebar" => Self::Char(' '),
            other => match parse_function_key(other) {
                Some(n) => Self::F(n),
                None => Self::Unidentified(other.into()),
            },
        }
    }
}

fn parse_function_key(s: &str) -> Option<u8> {
    let rest = s.strip_prefix('F')?;
    rest.parse::<u8>().ok().filter(|n| (1..=24).contains(n))
}

/// A key press delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    #[serde(default, with = "mods_bits")]
    pub mods: Modifiers,
}

mod mods_bits {
    use super::Modifiers;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mods: &Modifiers, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(mods.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Modifiers, D::Error> {
        u8::deserialize(d).map(Modifiers::from_bits_truncate)
    }
}

impl KeyEvent {
    /// Key event without modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            mods: Modifiers::empty(),
        }
    }

    /// Builder-style modifier setter.
    #[must_use]
    pub const fn with_mods(mut self, mods: Modifiers) -> Self {
        self.mods = mods;
        self
    }

    /// Build from the DOM `key` string and modifier flags.
    #[must_use]
    pub fn from_dom(dom_key: &str, mods: Modifiers) -> Self {
        Self {
            code: KeyCode::from_dom_key(dom_key),
            mods,
        }
    }

    /// Shorthand for a printable character.
    #[must_use]
    pub const fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }
}

/// What the line editor does in response to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorIntent {
    Insert(char),
    Backspace,
    Delete,
    CaretLeft,
    CaretRight,
    CaretHome,
    CaretEnd,
    HistoryBack,
    HistoryForward,
    Commit,
}

impl EditorIntent {
    /// Key-dispatch policy.
    ///
    /// Ctrl/Meta chords are never consumed so host shortcuts (copy, paste,
    /// tab switching) keep working. Alt and Shift are allowed through because
    /// the DOM key value already reflects them.
    #[must_use]
    pub fn from_key(key: &KeyEvent) -> Option<Self> {
        if key.mods.intersects(Modifiers::CTRL | Modifiers::META) {
            return None;
        }
        let intent = match key.code {
            KeyCode::Char(c) if !c.is_control() => Self::Insert(c),
            KeyCode::Enter => Self::Commit,
            KeyCode::Backspace => Self::Backspace,
            KeyCode::Delete => Self::Delete,
            KeyCode::Left => Self::CaretLeft,
            KeyCode::Right => Self::CaretRight,
            KeyCode::Home => Self::CaretHome,
            KeyCode::End => Self::CaretEnd,
            KeyCode::Up => Self::HistoryBack,
            KeyCode::Down => Self::HistoryForward,
            _ => return None,
        };
        Some(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn map_dom_key_specials() {
        assert_eq!(KeyCode::from_dom_key("Enter"), KeyCode::Enter);
        assert_eq!(KeyCode::from_dom_key("ArrowLeft"), KeyCode::Left);
        assert_eq!(KeyCode::from_dom_key("ArrowUp"), KeyCode::Up);
        assert_eq!(KeyCode::from_dom_key("F12"), KeyCode::F(12));
        assert_eq!(KeyCode::from_dom_key("a"), KeyCode::Char('a'));
        assert_eq!(KeyCode::from_dom_key("é"), KeyCode::Char('é'));
        assert_eq!(KeyCode::from_dom_key("Spacebar"), KeyCode::Char(' '));
    }

    #[test]
    fn unknown_keys_are_unidentified() {
        assert_eq!(
            KeyCode::from_dom_key("Shift"),
            KeyCode::Unidentified("Shift".into())
        );
        assert_eq!(
            KeyCode::from_dom_key("F99"),
            KeyCode::Unidentified("F99".into())
        );
    }

    #[test]
    fn named_keys_dispatch_to_intents() {
        let cases = [
            ("Enter", EditorIntent::Commit),
            ("Backspace", EditorIntent::Backspace),
            ("Delete", EditorIntent::Delete),
            ("ArrowLeft", EditorIntent::CaretLeft),
            ("ArrowRight", EditorIntent::CaretRight),
            ("ArrowUp", EditorIntent::HistoryBack),
            ("ArrowDown", EditorIntent::HistoryForward),
            ("Home", EditorIntent::CaretHome),
            ("End", EditorIntent::CaretEnd),
            ("x", EditorIntent::Insert('x')),
        ];
        for (dom, intent) in cases {
            let key = KeyEvent::from_dom(dom, Modifiers::empty());
            assert_eq!(EditorIntent::from_key(&key), Some(intent), "{dom}");
        }
    }

    #[test]
    fn ctrl_and_meta_chords_are_ignored() {
        let copy = KeyEvent::char('c').with_mods(Modifiers::CTRL);
        assert_eq!(EditorIntent::from_key(&copy), None);
        let mac_copy = KeyEvent::char('c').with_mods(Modifiers::META);
        assert_eq!(EditorIntent::from_key(&mac_copy), None);
        let ctrl_enter = KeyEvent::new(KeyCode::Enter).with_mods(Modifiers::CTRL);
        assert_eq!(EditorIntent::from_key(&ctrl_enter), None);
    }

    #[test]
    fn shift_and_alt_chars_are_inserted() {
        let upper = KeyEvent::char('A').with_mods(Modifiers::SHIFT);
        assert_eq!(EditorIntent::from_key(&upper), Some(EditorIntent::Insert('A')));
        let alt = KeyEvent::char('ß').with_mods(Modifiers::ALT);
        assert_eq!(EditorIntent::from_key(&alt), Some(EditorIntent::Insert('ß')));
    }

    #[test]
    fn other_keys_fall_through() {
        for dom in ["F5", "Tab", "Escape", "PageUp", "Dead", "Shift"] {
            let key = KeyEvent::from_dom(dom, Modifiers::empty());
            assert_eq!(EditorIntent::from_key(&key), None, "{dom}");
        }
    }

    #[test]
    fn key_event_json_roundtrip_is_stable() {
        let ev = KeyEvent::char('q').with_mods(Modifiers::SHIFT | Modifiers::ALT);
        let json = serde_json::to_string(&ev).expect("serialize");
        let back: KeyEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ev, back);
    }

    proptest! {
        #[test]
        fn single_char_keys_always_normalize_to_char(c in any::<char>()) {
            let s = c.to_string();
            prop_assert_eq!(KeyCode::from_dom_key(&s), KeyCode::Char(c));
        }
    }
}
