//! Per-line coherence states.
//!
//! Four states with their hardware 2-bit encodings. A line that is not
//! resident in a directory is implicitly `Invalid`.

use std::fmt;

use serde::Serialize;

/// MESI state of one line in one agent's cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum CoherenceState {
    /// Not present.
    #[default]
    Invalid = 0b00,
    /// Sole clean copy.
    Exclusive = 0b01,
    /// Dirty, sole copy.
    Modified = 0b10,
    /// Clean copy that peers may also hold.
    Shared = 0b11,
}

impl CoherenceState {
    /// All states, in encoding order.
    pub const ALL: [Self; 4] = [Self::Invalid, Self::Exclusive, Self::Modified, Self::Shared];

    /// Returns the 2-bit encoding.
    #[inline]
    pub const fn encoding(self) -> u8 {
        self as u8
    }

    /// Decodes a 2-bit state; the upper bits are ignored.
    pub const fn from_encoding(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Invalid,
            0b01 => Self::Exclusive,
            0b10 => Self::Modified,
            _ => Self::Shared,
        }
    }

    /// Returns `true` unless the state is `Invalid`.
    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Invalid)
    }

    /// Returns `true` for `Exclusive` and `Modified`, the single-holder states.
    #[inline]
    pub const fn is_owner(self) -> bool {
        matches!(self, Self::Exclusive | Self::Modified)
    }

    /// Returns `true` if the line holds data memory has not seen.
    #[inline]
    pub const fn is_dirty(self) -> bool {
        matches!(self, Self::Modified)
    }

    /// Single-letter form used in compact traces.
    pub const fn letter(self) -> char {
        match self {
            Self::Invalid => 'I',
            Self::Exclusive => 'E',
            Self::Modified => 'M',
            Self::Shared => 'S',
        }
    }
}

impl fmt::Display for CoherenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "INVALID",
            Self::Exclusive => "EXCLUSIVE",
            Self::Modified => "MODIFIED",
            Self::Shared => "SHARED",
        })
    }
}
