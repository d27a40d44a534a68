/*!
The [`Keywords`] and [`Opcode`] types.
*/

use core::{fmt, ops};

/**
A bitmask used to group events for enablement.

A listener with [`Keywords::NONE`] receives events regardless of their keywords.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keywords(u64);

impl Keywords {
    pub const NONE: Keywords = Keywords(0);
    pub const ALL: Keywords = Keywords(u64::MAX);

    pub const fn new(bits: u64) -> Self {
        Keywords(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: Keywords) -> bool {
        self.0 & other.0 != 0
    }

    /**
    The keywords an event is gated with.

    Events that don't declare any keywords are checked as if they declared all of them.
    */
    pub const fn or_all(self) -> Keywords {
        if self.is_none() {
            Keywords::ALL
        } else {
            self
        }
    }
}

impl From<u64> for Keywords {
    fn from(bits: u64) -> Self {
        Keywords(bits)
    }
}

impl ops::BitOr for Keywords {
    type Output = Keywords;

    fn bitor(self, rhs: Keywords) -> Keywords {
        Keywords(self.0 | rhs.0)
    }
}

impl ops::BitAnd for Keywords {
    type Output = Keywords;

    fn bitand(self, rhs: Keywords) -> Keywords {
        Keywords(self.0 & rhs.0)
    }
}

impl fmt::Debug for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Display for Keywords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/**
The operation an event represents within its task.
*/
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Opcode(u8);

impl Opcode {
    pub const INFO: Opcode = Opcode(0);
    pub const START: Opcode = Opcode(1);
    pub const STOP: Opcode = Opcode(2);
    pub const DATA_COLLECTION_START: Opcode = Opcode(3);
    pub const DATA_COLLECTION_STOP: Opcode = Opcode(4);
    pub const EXTENSION: Opcode = Opcode(5);
    pub const REPLY: Opcode = Opcode(6);
    pub const RESUME: Opcode = Opcode(7);
    pub const SUSPEND: Opcode = Opcode(8);
    pub const SEND: Opcode = Opcode(9);
    pub const RECEIVE: Opcode = Opcode(240);

    pub const fn new(value: u8) -> Self {
        Opcode(value)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        Opcode(value)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
