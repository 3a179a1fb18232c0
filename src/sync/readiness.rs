use std::fmt;
use tokio::sync::watch;

use crate::core::{MapError, Result};

/// Lifecycle of a persistent collection.
///
/// `Unstarted → SchemaReady → (Hydrating) → Ready`. Lazy collections skip
/// `Hydrating`. Once `Ready`, the state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unstarted,
    SchemaReady,
    Hydrating,
    Ready,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unstarted => "unstarted",
            Self::SchemaReady => "schema-ready",
            Self::Hydrating => "hydrating",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

/// Owner side of the state machine.
pub(crate) struct StateCell {
    tx: watch::Sender<SyncState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncState::Unstarted);
        Self { tx }
    }

    pub(crate) fn get(&self) -> SyncState {
        *self.tx.borrow()
    }

    /// Move to `next`. Returns false if nothing changed; `Ready` is terminal.
    pub(crate) fn advance(&self, next: SyncState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == SyncState::Ready || *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    pub(crate) fn subscribe(&self) -> Readiness {
        Readiness {
            rx: self.tx.subscribe(),
        }
    }
}

/// A handle for awaiting readiness of a collection.
///
/// Cheap to clone; any number of tasks may wait on it. Waiting after the
/// collection became ready returns immediately.
///
/// If `init` fails, the collection never becomes ready and `wait` keeps
/// waiting until the collection itself is dropped. Callers that cannot rely on
/// `init` eventually succeeding should watch `init`'s result as well.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<SyncState>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow() == SyncState::Ready
    }

    pub fn state(&self) -> SyncState {
        *self.rx.borrow()
    }

    /// Wait until the collection is ready.
    ///
    /// Fails only if the collection is dropped before it became ready.
    pub async fn wait(&self) -> Result<()> {
        let mut rx = self.rx.clone();
        rx.wait_for(|state| *state == SyncState::Ready)
            .await
            .map(|_| ())
            .map_err(|_| MapError::NotReady("collection dropped before becoming ready".into()))
    }
}
