//! Session configuration

/// Tunables of a [`DebuggerSession`](crate::debug::DebuggerSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Expect the 4-byte authentication magic before the first packet
    pub expect_authentication: bool,
    /// Largest argument payload accepted from the debug client, in bytes
    pub max_packet_size: u32,
    /// Ask for fresh registers after replies that suspend threads without
    /// carrying register values (halt, suspend thread)
    pub refresh_registers_on_suspend: bool,
    /// Treat the unload of a never-loaded module as an error
    pub strict_module_unload: bool,
}

impl SessionConfig {
    pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_authentication(mut self, expect: bool) -> Self {
        self.expect_authentication = expect;
        self
    }

    pub fn with_max_packet_size(mut self, bytes: u32) -> Self {
        self.max_packet_size = bytes;
        self
    }

    pub fn with_register_refresh(mut self, refresh: bool) -> Self {
        self.refresh_registers_on_suspend = refresh;
        self
    }

    pub fn with_strict_module_unload(mut self, strict: bool) -> Self {
        self.strict_module_unload = strict;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expect_authentication: true,
            max_packet_size: Self::DEFAULT_MAX_PACKET_SIZE,
            refresh_registers_on_suspend: true,
            strict_module_unload: false,
        }
    }
}
