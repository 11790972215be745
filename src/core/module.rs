//! Modules loaded into the debuggee's address space.

use super::RelocatedAddress;

/// One loaded module: executable or shared library.
///
/// Identity inside the process model is by reference (`Arc::ptr_eq`), not by
/// value. Two reports of the same file at the same base are distinct
/// modules until the session resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryModule {
    name: String,
    path: String,
    base_address: RelocatedAddress,
    size: u64,
}

impl MemoryModule {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        base_address: RelocatedAddress,
        size: u64,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            base_address,
            size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn base_address(&self) -> RelocatedAddress {
        self.base_address
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last address still owned by the module (`base + size`, inclusive).
    pub fn end_address(&self) -> RelocatedAddress {
        self.base_address.offset(self.size)
    }

    pub fn contains(&self, address: RelocatedAddress) -> bool {
        self.base_address <= address && address <= self.end_address()
    }
}
