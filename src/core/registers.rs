//! Register snapshots reported by the debug client.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

/// Special meaning of a register within one snapshot.
///
/// A register is never both program counter and stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RegisterRole {
    #[default]
    General,
    ProgramCounter,
    StackPointer,
}

/// Value of one register plus the bytes of memory it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    name: String,
    value: BigUint,
    memory: Box<[u8]>,
    role: RegisterRole,
}

impl RegisterValue {
    pub fn new(name: impl Into<String>, value: BigUint, memory: &[u8], role: RegisterRole) -> Self {
        Self {
            name: name.into(),
            value,
            memory: memory.into(),
            role,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// Value truncated to 64 bits; `None` for wider values.
    pub fn value_u64(&self) -> Option<u64> {
        self.value.to_u64()
    }

    /// Snapshot of the memory the register pointed to when it was read.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn role(&self) -> RegisterRole {
        self.role
    }

    pub fn is_pc(&self) -> bool {
        self.role == RegisterRole::ProgramCounter
    }

    pub fn is_sp(&self) -> bool {
        self.role == RegisterRole::StackPointer
    }
}

/// All register values of a single thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRegisters {
    tid: u64,
    registers: Vec<RegisterValue>,
}

impl ThreadRegisters {
    pub fn new(tid: u64, registers: Vec<RegisterValue>) -> Self {
        Self { tid, registers }
    }

    pub fn tid(&self) -> u64 {
        self.tid
    }

    pub fn registers(&self) -> &[RegisterValue] {
        &self.registers
    }

    pub fn into_registers(self) -> Vec<RegisterValue> {
        self.registers
    }

    pub fn program_counter(&self) -> Option<&RegisterValue> {
        self.registers.iter().find(|r| r.is_pc())
    }

    pub fn stack_pointer(&self) -> Option<&RegisterValue> {
        self.registers.iter().find(|r| r.is_sp())
    }

    pub fn get(&self, name: &str) -> Option<&RegisterValue> {
        self.registers
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }
}

/// Register values of every thread contained in one reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterValues {
    threads: Vec<ThreadRegisters>,
}

impl RegisterValues {
    pub fn new(threads: Vec<ThreadRegisters>) -> Self {
        Self { threads }
    }

    pub fn threads(&self) -> &[ThreadRegisters] {
        &self.threads
    }

    pub fn thread(&self, tid: u64) -> Option<&ThreadRegisters> {
        self.threads.iter().find(|t| t.tid == tid)
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

impl IntoIterator for RegisterValues {
    type Item = ThreadRegisters;
    type IntoIter = std::vec::IntoIter<ThreadRegisters>;

    fn into_iter(self) -> Self::IntoIter {
        self.threads.into_iter()
    }
}

impl<'a> IntoIterator for &'a RegisterValues {
    type Item = &'a ThreadRegisters;
    type IntoIter = std::slice::Iter<'a, ThreadRegisters>;

    fn into_iter(self) -> Self::IntoIter {
        self.threads.iter()
    }
}
