//! Scripted in-memory connector for tests.
//!
//! [`MockConnector`] replays a script of connection outcomes (accept, refuse,
//! hang) and records every link it hands out.  Each link is observable
//! through a [`MockLink`] handle: the frames written to it, whether it was
//! closed, and a switch that makes its next write fail.

use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use super::transport::{ConnectError, Connector, SendError, Transport};

/// What the next connection attempt should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Hand out a working link.
    Accept,
    /// Fail immediately, as if the peer refused.
    Refuse,
    /// Never complete; the caller's timeout must fire.
    Hang,
}

/// Observation handle for one link handed out by [`MockConnector`].
#[derive(Clone, Default)]
pub struct MockLink {
    frames: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MockLink {
    /// Frames written so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().expect("lock poisoned").clone()
    }

    /// Returns `true` once the link has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes every subsequent write on this link fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

struct MockTransport {
    link: MockLink,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&mut self, frame: String) -> Result<(), SendError> {
        if self.link.fail_writes.load(Ordering::SeqCst) {
            return Err(SendError::WriteFailed("injected write failure".to_string()));
        }
        self.link.frames.lock().expect("lock poisoned").push(frame);
        Ok(())
    }

    async fn close(&mut self) {
        self.link.closed.store(true, Ordering::SeqCst);
    }
}

struct Shared {
    script: Mutex<VecDeque<ScriptedOutcome>>,
    fallback: ScriptedOutcome,
    attempts: AtomicU32,
    links: Mutex<Vec<MockLink>>,
    urls: Mutex<Vec<String>>,
}

/// A [`Connector`] driven by a script of outcomes.
///
/// Clones share state, so a test keeps one handle while the connection
/// manager owns another.
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    /// Creates a connector that runs `script` first, then uses `fallback`
    /// for every later attempt.
    pub fn scripted(script: &[ScriptedOutcome], fallback: ScriptedOutcome) -> Self {
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(script.iter().copied().collect()),
                fallback,
                attempts: AtomicU32::new(0),
                links: Mutex::new(Vec::new()),
                urls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a connector that accepts every attempt.
    pub fn accepting() -> Self {
        Self::scripted(&[], ScriptedOutcome::Accept)
    }

    /// Creates a connector that refuses every attempt.
    pub fn refusing() -> Self {
        Self::scripted(&[], ScriptedOutcome::Refuse)
    }

    /// Number of connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// URLs requested, in order.
    pub fn urls(&self) -> Vec<String> {
        self.shared.urls.lock().expect("lock poisoned").clone()
    }

    /// Every link handed out so far.
    pub fn links(&self) -> Vec<MockLink> {
        self.shared.links.lock().expect("lock poisoned").clone()
    }

    /// The most recently handed-out link, if any.
    pub fn last_link(&self) -> Option<MockLink> {
        self.shared.links.lock().expect("lock poisoned").last().cloned()
    }

    /// Number of links that have not been closed.
    pub fn open_links(&self) -> usize {
        self.links().iter().filter(|l| !l.is_closed()).count()
    }

    /// All frames written on every link, in link order.
    pub fn all_frames(&self) -> Vec<String> {
        self.links().iter().flat_map(MockLink::frames).collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, ConnectError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        self.shared
            .urls
            .lock()
            .expect("lock poisoned")
            .push(url.to_string());
        let outcome = self
            .shared
            .script
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(self.shared.fallback);

        match outcome {
            ScriptedOutcome::Accept => {
                let link = MockLink::default();
                self.shared
                    .links
                    .lock()
                    .expect("lock poisoned")
                    .push(link.clone());
                Ok(Box::new(MockTransport { link }))
            }
            ScriptedOutcome::Refuse => Err(ConnectError::Failed {
                url: url.to_string(),
                reason: "connection refused (scripted)".to_string(),
            }),
            ScriptedOutcome::Hang => std::future::pending().await,
        }
    }
}
