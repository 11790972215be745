//! Integration tests for the process model and its listeners
//!
//! Run with: cargo test --test process_manager

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use navidbg::core::{
        MemoryModule, RelocatedAddress, TargetProcessThread, ThreadEvent, ThreadListener,
        ThreadState,
    };
    use navidbg::{ProcessError, ProcessEvent, ProcessManager, ProcessManagerListener};

    fn module(name: &str, base: u64, size: u64) -> Arc<MemoryModule> {
        Arc::new(MemoryModule::new(name, format!("C:\\{name}"), RelocatedAddress(base), size))
    }

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, Arc<dyn ProcessManagerListener>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn ProcessManagerListener> =
            Arc::new(move |event: &ProcessEvent| sink.lock().unwrap().push(event.kind()));
        (events, listener)
    }

    fn explode(_: &ProcessEvent) {
        panic!("listener failure");
    }

    #[test]
    fn modules_are_unique_by_identity() {
        let manager = ProcessManager::new();
        let kernel = module("kernel32.dll", 0x7000_0000, 0x1000);

        manager.add_module(Arc::clone(&kernel)).unwrap();
        assert!(matches!(
            manager.add_module(Arc::clone(&kernel)),
            Err(ProcessError::DuplicateModule { .. })
        ));
        assert_eq!(manager.modules().len(), 1);

        manager.remove_module(&kernel).unwrap();
        assert!(matches!(
            manager.remove_module(&kernel),
            Err(ProcessError::UnknownModule { .. })
        ));
    }

    #[test]
    fn module_lookup_by_address() {
        let manager = ProcessManager::new();
        manager.add_module(module("a.dll", 0x1000, 0x100)).unwrap();
        manager.add_module(module("b.dll", 0x4000, 0x200)).unwrap();

        assert_eq!(manager.module_at(RelocatedAddress(0x1000)).unwrap().name(), "a.dll");
        // End address is inclusive.
        assert_eq!(manager.module_at(RelocatedAddress(0x1100)).unwrap().name(), "a.dll");
        assert!(manager.module_at(RelocatedAddress(0x1101)).is_none());
        assert!(manager.module_at(RelocatedAddress(0x0fff)).is_none());
        assert_eq!(manager.module_at(RelocatedAddress(0x4150)).unwrap().name(), "b.dll");
        assert!(manager.module_at(RelocatedAddress(0x9000)).is_none());
    }

    #[test]
    fn removing_unknown_module_only_notifies() {
        let manager = ProcessManager::new();
        let (events, listener) = recorder();
        manager.add_listener(&listener);

        manager.remove_non_existing_module(module("ghost.dll", 0x1000, 0x10));

        assert!(manager.modules().is_empty());
        assert_eq!(*events.lock().unwrap(), vec!["module removed"]);
    }

    #[test]
    fn running_thread_has_no_instruction_pointer() {
        let thread = TargetProcessThread::new(1, ThreadState::Suspended);
        thread.set_current_address(Some(RelocatedAddress(0x401000)));
        assert_eq!(thread.current_address(), Some(RelocatedAddress(0x401000)));

        thread.set_state(ThreadState::Running);
        assert_eq!(thread.state(), ThreadState::Running);
        assert_eq!(thread.current_address(), None);
    }

    #[test]
    fn thread_state_change_notifies_once() {
        let thread = TargetProcessThread::new(1, ThreadState::Running);
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&changes);
        let listener: Arc<dyn ThreadListener> =
            Arc::new(move |_: &TargetProcessThread, event: &ThreadEvent| {
                if let ThreadEvent::StateChanged { .. } = event {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });
        thread.add_listener(&listener);

        thread.set_state(ThreadState::Suspended);
        thread.set_state(ThreadState::Suspended);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_the_others() {
        let manager = ProcessManager::new();
        let panicking: Arc<dyn ProcessManagerListener> = Arc::new(explode);
        let (events, recording) = recorder();
        manager.add_listener(&panicking);
        manager.add_listener(&recording);

        manager.add_thread(Arc::new(TargetProcessThread::new(7, ThreadState::Running)));

        assert!(manager.thread(7).is_some());
        assert_eq!(*events.lock().unwrap(), vec!["thread added"]);
    }

    #[test]
    fn dropped_listener_is_not_notified() {
        let manager = ProcessManager::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener: Arc<dyn ProcessManagerListener> = Arc::new(move |_: &ProcessEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        manager.add_listener(&listener);

        manager.set_attached(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(listener);
        manager.set_attached(false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attached_flag_notifies_even_when_unchanged() {
        let manager = ProcessManager::new();
        let (events, listener) = recorder();
        manager.add_listener(&listener);

        manager.set_attached(true);
        manager.set_attached(true);
        manager.set_attached(false);

        assert_eq!(*events.lock().unwrap(), vec!["attach", "attach", "detach"]);
    }

    #[test]
    fn active_thread_must_be_known() {
        let manager = ProcessManager::new();
        let stranger = Arc::new(TargetProcessThread::new(99, ThreadState::Suspended));
        assert!(matches!(
            manager.set_active_thread(Some(stranger)),
            Err(ProcessError::UnknownThread { tid: 99 })
        ));

        let thread = Arc::new(TargetProcessThread::new(1, ThreadState::Suspended));
        manager.add_thread(Arc::clone(&thread));
        manager.set_active_thread(Some(Arc::clone(&thread))).unwrap();
        assert_eq!(manager.active_thread().map(|t| t.tid()), Some(1));
    }

    #[test]
    fn listener_may_query_manager_during_notification() {
        let manager = Arc::new(ProcessManager::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&manager);
        let counter = Arc::clone(&seen);
        let listener: Arc<dyn ProcessManagerListener> = Arc::new(move |event: &ProcessEvent| {
            if let (ProcessEvent::ModuleAdded(_), Some(manager)) = (event, weak.upgrade()) {
                counter.store(manager.modules().len(), Ordering::SeqCst);
            }
        });
        manager.add_listener(&listener);

        manager.add_module(module("a.dll", 0x1000, 0x10)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
