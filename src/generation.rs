//! Per-mount generation counter.
//!
//! A view takes a [`GenerationToken`] when it mounts and checks it after
//! every await. Advancing the [`Generation`] (unmount, teardown) makes all
//! outstanding tokens stale, so late responses are dropped instead of
//! being applied to a view that is gone.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct Generation {
    tx: Arc<watch::Sender<u64>>,
}

impl Generation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    /// Token for the current generation.
    pub fn token(&self) -> GenerationToken {
        GenerationToken {
            mounted: self.current(),
            rx: self.tx.subscribe(),
        }
    }

    /// Invalidate every token handed out so far.
    pub fn advance(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct GenerationToken {
    mounted: u64,
    rx: watch::Receiver<u64>,
}

impl GenerationToken {
    pub fn is_current(&self) -> bool {
        *self.rx.borrow() == self.mounted
    }

    /// Run `apply` only if this token is still current.
    ///
    /// [`Generation::advance`] waits for a running `apply` to finish, so once
    /// `advance` returns no stale `apply` can start or be in progress. Keep
    /// `apply` short and never advance from inside it.
    pub fn run_if_current<R>(&self, apply: impl FnOnce() -> R) -> Option<R> {
        let generation = self.rx.borrow();
        (*generation == self.mounted).then(apply)
    }

    /// Resolves once the generation has moved past this token.
    pub async fn superseded(&mut self) {
        while self.is_current() {
            if self.rx.changed().await.is_err() {
                // Every owner is gone; nothing can mount this generation again.
                return;
            }
        }
    }
}
