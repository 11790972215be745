//! Shared application state
//!
//! The process model being inspected and where its replies come from.

use std::fs::File;
use std::io::{self, BufReader};
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::SessionConfig;
use crate::core::ProcessManager;
use crate::debug::{DebugEvent, DebugEventListener, DebuggerSession, SessionState};
use crate::error::SessionError;

/// Shared application state
pub struct AppState {
    /// Process model shown by the REPL
    pub process: Arc<ProcessManager>,
    /// Session settings used for new replays and connections
    pub config: SessionConfig,
    /// Replay file or remote address the model was built from
    pub source: Option<String>,
    /// Number of replies applied so far
    replies: Arc<AtomicUsize>,
    /// Reader thread of a live connection
    reader: Option<JoinHandle<()>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl AppState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            process: Arc::new(ProcessManager::new()),
            config,
            source: None,
            replies: Arc::new(AtomicUsize::new(0)),
            reader: None,
        }
    }

    pub fn reply_count(&self) -> usize {
        self.replies.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Build a fresh process model from a recorded reply stream.
    ///
    /// Commands the session would send in response go nowhere.
    pub fn replay(&mut self, path: impl AsRef<Path>) -> Result<SessionState, SessionError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let mut session = DebuggerSession::new(io::sink(), self.config.clone());
        let _counter = self.count_replies(&session);

        let result = session.run(&mut reader);
        self.process = session.process();
        self.source = Some(path.display().to_string());
        log::info!("Replayed {} replies from {}", self.reply_count(), path.display());
        result.map(|()| session.state())
    }

    /// Connect to a debug client and apply its replies on a reader thread.
    pub fn connect(&mut self, address: &str) -> Result<(), SessionError> {
        let stream = TcpStream::connect(address)?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut session = DebuggerSession::new(stream, self.config.clone());
        let counter = self.count_replies(&session);

        self.process = session.process();
        self.source = Some(address.to_string());

        let handle = thread::Builder::new()
            .name("debug-client-reader".into())
            .spawn(move || {
                // Keeps the counting listener registered for the connection's lifetime.
                let _counter = counter;
                if let Err(e) = session.run(&mut reader) {
                    log::error!("Debug connection failed: {}", e);
                }
            })?;
        self.reader = Some(handle);
        log::info!("Connected to debug client at {}", address);
        Ok(())
    }

    fn count_replies<W: io::Write>(&mut self, session: &DebuggerSession<W>) -> Arc<dyn DebugEventListener> {
        self.replies = Arc::new(AtomicUsize::new(0));
        let replies = Arc::clone(&self.replies);
        let listener: Arc<dyn DebugEventListener> = Arc::new(move |event: &DebugEvent| {
            if let DebugEvent::ReplyReceived { .. } = event {
                replies.fetch_add(1, Ordering::Relaxed);
            }
        });
        session.add_listener(&listener);
        listener
    }
}
