//! Addresses in the live address space of the debuggee.

use std::fmt;

/// An address as seen in the debuggee's memory, after relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RelocatedAddress(pub u64);

impl RelocatedAddress {
    pub const fn new(address: u64) -> Self {
        Self(address)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Address `offset` bytes further, saturating at the top of the space.
    pub fn offset(self, offset: u64) -> Self {
        Self(self.0.saturating_add(offset))
    }
}

impl From<u64> for RelocatedAddress {
    fn from(address: u64) -> Self {
        Self(address)
    }
}

impl fmt::Display for RelocatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::LowerHex for RelocatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
