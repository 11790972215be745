//! Process model - single source of truth for one debuggee
//!
//! Every mutation happens under the internal lock and is followed by a
//! notification once the lock has been released, so listeners are free to
//! query the manager again.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::{
    DebuggerException, Memory, MemoryMap, MemoryModule, RelocatedAddress, TargetInformation,
    TargetProcessThread,
};
use crate::error::ProcessError;
use crate::listener::ListenerProvider;

/// Change notifications of a [`ProcessManager`].
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    ModuleAdded(Arc<MemoryModule>),
    ModuleRemoved(Arc<MemoryModule>),
    ThreadAdded(Arc<TargetProcessThread>),
    ThreadRemoved(Arc<TargetProcessThread>),
    ActiveThreadChanged {
        old: Option<Arc<TargetProcessThread>>,
        new: Option<Arc<TargetProcessThread>>,
    },
    MemoryMapChanged(MemoryMap),
    TargetInformationChanged(Arc<TargetInformation>),
    Attached,
    Detached,
    ExceptionRaised(DebuggerException),
}

impl ProcessEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModuleAdded(_) => "module added",
            Self::ModuleRemoved(_) => "module removed",
            Self::ThreadAdded(_) => "thread added",
            Self::ThreadRemoved(_) => "thread removed",
            Self::ActiveThreadChanged { .. } => "active thread change",
            Self::MemoryMapChanged(_) => "memory map change",
            Self::TargetInformationChanged(_) => "target information change",
            Self::Attached => "attach",
            Self::Detached => "detach",
            Self::ExceptionRaised(_) => "exception",
        }
    }
}

/// Observer of a [`ProcessManager`].
pub trait ProcessManagerListener: Send + Sync {
    fn handle(&self, event: &ProcessEvent);
}

impl<F> ProcessManagerListener for F
where
    F: Fn(&ProcessEvent) + Send + Sync,
{
    fn handle(&self, event: &ProcessEvent) {
        self(event)
    }
}

#[derive(Debug, Default)]
struct ProcessState {
    threads: Vec<Arc<TargetProcessThread>>,
    modules: Vec<Arc<MemoryModule>>,
    /// Modules by base address; kept in step with `modules`.
    module_index: BTreeMap<RelocatedAddress, Vec<Arc<MemoryModule>>>,
    memory_map: MemoryMap,
    target_information: Option<Arc<TargetInformation>>,
    attached: bool,
    active_thread: Option<Arc<TargetProcessThread>>,
}

/// Aggregate root of the target process model.
#[derive(Debug, Default)]
pub struct ProcessManager {
    state: RwLock<ProcessState>,
    memory: Mutex<Memory>,
    listeners: ListenerProvider<dyn ProcessManagerListener>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: &Arc<dyn ProcessManagerListener>) {
        self.listeners.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ProcessManagerListener>) {
        self.listeners.remove_listener(listener);
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    /// Track a newly loaded module.
    pub fn add_module(&self, module: Arc<MemoryModule>) -> Result<(), ProcessError> {
        {
            let mut state = self.write();
            if state.modules.iter().any(|m| Arc::ptr_eq(m, &module)) {
                let error = ProcessError::DuplicateModule {
                    name: module.name().to_string(),
                };
                log::error!("{}", error);
                return Err(error);
            }
            state.modules.push(Arc::clone(&module));
            state
                .module_index
                .entry(module.base_address())
                .or_default()
                .push(Arc::clone(&module));
        }
        log::debug!("Module {} loaded at {}", module.name(), module.base_address());
        self.notify(ProcessEvent::ModuleAdded(module));
        Ok(())
    }

    /// Stop tracking a module that was previously added.
    pub fn remove_module(&self, module: &Arc<MemoryModule>) -> Result<(), ProcessError> {
        {
            let mut state = self.write();
            let Some(pos) = state.modules.iter().position(|m| Arc::ptr_eq(m, module)) else {
                let error = ProcessError::UnknownModule {
                    name: module.name().to_string(),
                };
                log::error!("{}", error);
                return Err(error);
            };
            state.modules.remove(pos);
            let base = module.base_address();
            if let Some(at_base) = state.module_index.get_mut(&base) {
                at_base.retain(|m| !Arc::ptr_eq(m, module));
                if at_base.is_empty() {
                    state.module_index.remove(&base);
                }
            }
        }
        log::debug!("Module {} unloaded", module.name());
        self.notify(ProcessEvent::ModuleRemoved(Arc::clone(module)));
        Ok(())
    }

    /// Announce the unload of a module this manager never saw loaded.
    ///
    /// Some debug clients report such unloads while the process is being
    /// created. Nothing is removed; listeners are still told.
    pub fn remove_non_existing_module(&self, module: Arc<MemoryModule>) {
        log::warn!(
            "Debug client unloaded module {} which was never loaded",
            module.name()
        );
        self.notify(ProcessEvent::ModuleRemoved(module));
    }

    /// Module whose range `[base, base + size]` contains `address`.
    pub fn module_at(&self, address: RelocatedAddress) -> Option<Arc<MemoryModule>> {
        let state = self.read();
        let (_, candidates) = state.module_index.range(..=address).next_back()?;
        candidates.iter().find(|m| m.contains(address)).cloned()
    }

    /// Tracked module with the given base address and name.
    pub fn find_module(&self, base: RelocatedAddress, name: &str) -> Option<Arc<MemoryModule>> {
        self.read()
            .module_index
            .get(&base)
            .and_then(|at_base| at_base.iter().find(|m| m.name() == name).cloned())
    }

    pub fn modules(&self) -> Vec<Arc<MemoryModule>> {
        self.read().modules.clone()
    }

    // ------------------------------------------------------------------
    // Threads
    // ------------------------------------------------------------------

    pub fn add_thread(&self, thread: Arc<TargetProcessThread>) {
        {
            let mut state = self.write();
            if !state.threads.iter().any(|t| Arc::ptr_eq(t, &thread)) {
                state.threads.push(Arc::clone(&thread));
            }
        }
        log::debug!("Thread {} created", thread.tid());
        self.notify(ProcessEvent::ThreadAdded(thread));
    }

    pub fn remove_thread(&self, thread: &Arc<TargetProcessThread>) {
        self.write().threads.retain(|t| !Arc::ptr_eq(t, thread));
        log::debug!("Thread {} closed", thread.tid());
        self.notify(ProcessEvent::ThreadRemoved(Arc::clone(thread)));
    }

    /// Thread with the given id; `None` if it is not (or no longer) known.
    pub fn thread(&self, tid: u64) -> Option<Arc<TargetProcessThread>> {
        self.read().threads.iter().find(|t| t.tid() == tid).cloned()
    }

    pub fn threads(&self) -> Vec<Arc<TargetProcessThread>> {
        self.read().threads.clone()
    }

    pub fn active_thread(&self) -> Option<Arc<TargetProcessThread>> {
        self.read().active_thread.clone()
    }

    /// Change the thread that receives step and breakpoint focus.
    pub fn set_active_thread(
        &self,
        thread: Option<Arc<TargetProcessThread>>,
    ) -> Result<(), ProcessError> {
        let old = {
            let mut state = self.write();
            let unchanged = match (&state.active_thread, &thread) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                return Ok(());
            }
            if let Some(t) = &thread {
                if !state.threads.iter().any(|known| Arc::ptr_eq(known, t)) {
                    let error = ProcessError::UnknownThread { tid: t.tid() };
                    log::error!("{}", error);
                    return Err(error);
                }
            }
            std::mem::replace(&mut state.active_thread, thread.clone())
        };
        self.notify(ProcessEvent::ActiveThreadChanged { old, new: thread });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Process-wide state
    // ------------------------------------------------------------------

    pub fn memory_map(&self) -> MemoryMap {
        self.read().memory_map.clone()
    }

    pub fn set_memory_map(&self, memory_map: MemoryMap) {
        self.write().memory_map = memory_map.clone();
        self.notify(ProcessEvent::MemoryMapChanged(memory_map));
    }

    pub fn target_information(&self) -> Option<Arc<TargetInformation>> {
        self.read().target_information.clone()
    }

    pub fn set_target_information(&self, information: TargetInformation) {
        let information = Arc::new(information);
        self.write().target_information = Some(Arc::clone(&information));
        self.notify(ProcessEvent::TargetInformationChanged(information));
    }

    pub fn is_attached(&self) -> bool {
        self.read().attached
    }

    /// Notifies on every call, even if the value is unchanged.
    pub fn set_attached(&self, attached: bool) {
        self.write().attached = attached;
        if attached {
            log::info!("Debugger attached to target process");
            self.notify(ProcessEvent::Attached);
        } else {
            log::info!("Debugger detached from target process");
            self.notify(ProcessEvent::Detached);
        }
    }

    pub fn add_exception_event(&self, exception: DebuggerException) {
        log::info!(
            "Target raised exception {} ({:#x})",
            exception.name,
            exception.code
        );
        self.notify(ProcessEvent::ExceptionRaised(exception));
    }

    /// Simulated byte store of the debuggee's memory.
    pub fn memory(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget everything learned about the running process.
    ///
    /// Target information survives; it belongs to the debug client, not
    /// the process.
    pub fn reset(&self) {
        self.memory().clear();
        self.set_memory_map(MemoryMap::empty());
        // Clearing the focus cannot fail.
        let _ = self.set_active_thread(None);

        for thread in self.threads() {
            self.remove_thread(&thread);
        }
        for module in self.modules() {
            if let Err(e) = self.remove_module(&module) {
                log::warn!("{}", e);
            }
        }
        self.set_attached(false);
    }

    fn notify(&self, event: ProcessEvent) {
        self.listeners
            .notify(event.kind(), |listener| listener.handle(&event));
    }

    fn read(&self) -> RwLockReadGuard<'_, ProcessState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ProcessState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ThreadState;

    fn module(name: &str, base: u64, size: u64) -> Arc<MemoryModule> {
        Arc::new(MemoryModule::new(name, format!("C:\\{name}"), base.into(), size))
    }

    #[test]
    fn module_index_follows_add_and_remove() {
        let manager = ProcessManager::new();
        let kernel = module("kernel32.dll", 0x7000_0000, 0x1000);
        manager.add_module(Arc::clone(&kernel)).unwrap();

        assert!(manager.module_at(0x7000_0800.into()).is_some());
        manager.remove_module(&kernel).unwrap();
        assert!(manager.module_at(0x7000_0800.into()).is_none());
        assert!(manager.modules().is_empty());
    }

    #[test]
    fn equal_but_distinct_modules_are_both_tracked() {
        let manager = ProcessManager::new();
        let a = module("a.dll", 0x1000, 0x10);
        let b = module("a.dll", 0x1000, 0x10);
        manager.add_module(Arc::clone(&a)).unwrap();
        manager.add_module(Arc::clone(&b)).unwrap();
        assert_eq!(manager.modules().len(), 2);

        manager.remove_module(&a).unwrap();
        let left = manager.module_at(0x1008.into()).unwrap();
        assert!(Arc::ptr_eq(&left, &b));
    }

    #[test]
    fn active_thread_must_be_known() {
        let manager = ProcessManager::new();
        let stray = Arc::new(TargetProcessThread::new(99, ThreadState::Running));
        assert_eq!(
            manager.set_active_thread(Some(stray)),
            Err(ProcessError::UnknownThread { tid: 99 })
        );
        assert!(manager.set_active_thread(None).is_ok());
    }

    #[test]
    fn reset_clears_process_but_keeps_target_information() {
        let manager = ProcessManager::new();
        manager.set_target_information(TargetInformation::new(
            std::num::NonZeroU32::new(32).unwrap(),
            Vec::new(),
            Default::default(),
        ));
        let thread = Arc::new(TargetProcessThread::new(1, ThreadState::Suspended));
        manager.add_thread(Arc::clone(&thread));
        manager.set_active_thread(Some(thread)).unwrap();
        manager.add_module(module("a.exe", 0x400000, 0x1000)).unwrap();
        manager.set_attached(true);
        manager.memory().store(0x400000, &[0x4d, 0x5a]);

        manager.reset();

        assert!(manager.threads().is_empty());
        assert!(manager.modules().is_empty());
        assert!(manager.active_thread().is_none());
        assert!(!manager.is_attached());
        assert_eq!(manager.memory().size(), 0);
        assert!(manager.target_information().is_some());
    }
}
