//! Threads of the debuggee and their run state.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{RegisterValue, RelocatedAddress};
use crate::listener::ListenerProvider;

/// Run state of a single thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadState {
    Running,
    Suspended,
}

impl ThreadState {
    /// Decode the wire encoding (0 = running, 1 = suspended).
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Running),
            1 => Some(Self::Suspended),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::Running => 0,
            Self::Suspended => 1,
        }
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("Running"),
            Self::Suspended => f.write_str("Suspended"),
        }
    }
}

/// Change notifications of a [`TargetProcessThread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEvent {
    StateChanged { old: ThreadState, new: ThreadState },
    RegistersChanged,
    InstructionPointerChanged { old: Option<RelocatedAddress> },
}

impl ThreadEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "thread state change",
            Self::RegistersChanged => "register change",
            Self::InstructionPointerChanged { .. } => "instruction pointer change",
        }
    }
}

/// Observer of a single thread.
pub trait ThreadListener: Send + Sync {
    fn handle(&self, thread: &TargetProcessThread, event: &ThreadEvent);
}

impl<F> ThreadListener for F
where
    F: Fn(&TargetProcessThread, &ThreadEvent) + Send + Sync,
{
    fn handle(&self, thread: &TargetProcessThread, event: &ThreadEvent) {
        self(thread, event)
    }
}

#[derive(Debug)]
struct ThreadInner {
    state: ThreadState,
    registers: Arc<[RegisterValue]>,
    current_address: Option<RelocatedAddress>,
}

/// One thread of the target process.
///
/// State, register snapshot and instruction pointer sit behind one lock so
/// readers on other threads never see a running thread with a stale
/// instruction pointer.
pub struct TargetProcessThread {
    tid: u64,
    inner: RwLock<ThreadInner>,
    listeners: ListenerProvider<dyn ThreadListener>,
}

impl TargetProcessThread {
    pub fn new(tid: u64, state: ThreadState) -> Self {
        Self {
            tid,
            inner: RwLock::new(ThreadInner {
                state,
                registers: Arc::from(Vec::new()),
                current_address: None,
            }),
            listeners: ListenerProvider::new(),
        }
    }

    pub fn tid(&self) -> u64 {
        self.tid
    }

    pub fn state(&self) -> ThreadState {
        self.read().state
    }

    /// Current instruction pointer; `None` while the thread runs.
    pub fn current_address(&self) -> Option<RelocatedAddress> {
        self.read().current_address
    }

    /// Last known register snapshot.
    pub fn registers(&self) -> Arc<[RegisterValue]> {
        Arc::clone(&self.read().registers)
    }

    pub fn set_state(&self, state: ThreadState) {
        let old = {
            let mut inner = self.write();
            if inner.state == state {
                return;
            }
            let old = inner.state;
            inner.state = state;
            if state == ThreadState::Running {
                inner.current_address = None;
            }
            old
        };
        log::debug!("Thread {} changed state {} -> {}", self.tid, old, state);
        self.notify(ThreadEvent::StateChanged { old, new: state });
    }

    /// Always notifies, even if the address did not change.
    pub fn set_current_address(&self, address: Option<RelocatedAddress>) {
        let old = std::mem::replace(&mut self.write().current_address, address);
        self.notify(ThreadEvent::InstructionPointerChanged { old });
    }

    pub fn set_register_values(&self, registers: Vec<RegisterValue>) {
        self.write().registers = Arc::from(registers);
        self.notify(ThreadEvent::RegistersChanged);
    }

    pub fn add_listener(&self, listener: &Arc<dyn ThreadListener>) {
        self.listeners.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ThreadListener>) {
        self.listeners.remove_listener(listener);
    }

    fn notify(&self, event: ThreadEvent) {
        self.listeners
            .notify(event.kind(), |listener| listener.handle(self, &event));
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ThreadInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ThreadInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for TargetProcessThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("TargetProcessThread")
            .field("tid", &self.tid)
            .field("state", &inner.state)
            .field("current_address", &inner.current_address)
            .finish()
    }
}

impl fmt::Display for TargetProcessThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread {} ({})", self.tid, self.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RegisterRole;
    use num_bigint::BigUint;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<ThreadEvent>>>, Arc<dyn ThreadListener>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn ThreadListener> =
            Arc::new(move |_: &TargetProcessThread, e: &ThreadEvent| sink.lock().unwrap().push(e.clone()));
        (events, listener)
    }

    #[test]
    fn running_clears_instruction_pointer() {
        let thread = TargetProcessThread::new(7, ThreadState::Suspended);
        thread.set_current_address(Some(RelocatedAddress(0x401000)));
        assert_eq!(thread.current_address(), Some(RelocatedAddress(0x401000)));

        thread.set_state(ThreadState::Running);
        assert_eq!(thread.current_address(), None);
    }

    #[test]
    fn unchanged_state_does_not_notify() {
        let thread = TargetProcessThread::new(1, ThreadState::Running);
        let (events, listener) = recorder();
        thread.add_listener(&listener);

        thread.set_state(ThreadState::Running);
        thread.set_state(ThreadState::Suspended);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ThreadEvent::StateChanged {
                old: ThreadState::Running,
                new: ThreadState::Suspended
            }]
        );
    }

    #[test]
    fn current_address_always_notifies_with_previous_value() {
        let thread = TargetProcessThread::new(1, ThreadState::Suspended);
        let (events, listener) = recorder();
        thread.add_listener(&listener);

        thread.set_current_address(Some(RelocatedAddress(0x10)));
        thread.set_current_address(Some(RelocatedAddress(0x10)));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            ThreadEvent::InstructionPointerChanged {
                old: Some(RelocatedAddress(0x10))
            }
        );
    }

    #[test]
    fn register_snapshot_is_replaced() {
        let thread = TargetProcessThread::new(1, ThreadState::Suspended);
        let before = thread.registers();
        thread.set_register_values(vec![RegisterValue::new(
            "eax",
            BigUint::from(1u8),
            &[],
            RegisterRole::General,
        )]);
        assert!(before.is_empty());
        assert_eq!(thread.registers()[0].name(), "eax");
    }

    #[test]
    fn thread_state_codes() {
        assert_eq!(ThreadState::from_code(0), Some(ThreadState::Running));
        assert_eq!(ThreadState::from_code(1), Some(ThreadState::Suspended));
        assert_eq!(ThreadState::from_code(2), None);
    }
}
