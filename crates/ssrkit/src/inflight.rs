// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! At most one concurrent build per output folder.
//!
//! The first caller for a key starts the work; everyone who arrives while
//! it runs awaits the same shared future. The entry is dropped once the
//! work settles, so the next caller after that starts a fresh build.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::error::{Result, SsrError};

type SharedRun = Shared<BoxFuture<'static, std::result::Result<(), Arc<SsrError>>>>;

/// Map of running builds keyed by output folder.
#[derive(Default)]
pub struct InFlight {
    running: Mutex<HashMap<PathBuf, SharedRun>>,
}

impl std::fmt::Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight")
            .field("running", &self.len())
            .finish()
    }
}

impl InFlight {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<PathBuf, SharedRun>>> {
        self.running
            .lock()
            .map_err(|_| SsrError::Cache("Failed to acquire in-flight build lock".to_string()))
    }

    /// Runs `start()` for `key` unless a run for `key` is already in
    /// progress, in which case its result is awaited instead.
    ///
    /// The caller that started the run gets its error back unchanged when
    /// nobody else is waiting; otherwise errors arrive as
    /// [`SsrError::Shared`].
    pub async fn run<F>(&self, key: &Path, start: F) -> Result<()>
    where
        F: FnOnce() -> BoxFuture<'static, Result<()>>,
    {
        let run = {
            let mut running = self.lock()?;
            match running.get(key) {
                Some(existing) => {
                    tracing::debug!(key = %key.display(), "joining in-flight build");
                    existing.clone()
                }
                None => {
                    let run = start().map(|r| r.map_err(Arc::new)).boxed().shared();
                    running.insert(key.to_path_buf(), run.clone());
                    run
                }
            }
        };

        let result = run.clone().await;

        {
            let mut running = self.lock()?;
            if running.get(key).is_some_and(|current| current.ptr_eq(&run)) {
                running.remove(key);
            }
        }
        drop(run);

        result.map_err(|shared| Arc::try_unwrap(shared).unwrap_or_else(SsrError::Shared))
    }

    /// True while a run for `key` is in progress.
    pub fn is_running(&self, key: &Path) -> bool {
        self.lock().map(|r| r.contains_key(key)).unwrap_or(false)
    }

    /// Number of runs in progress.
    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// True when nothing is running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted(counter: &Arc<AtomicUsize>, fail: bool) -> BoxFuture<'static, Result<()>> {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if fail {
                Err(SsrError::Build {
                    messages: vec!["boom".into()],
                })
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let inflight = InFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = Path::new("/dist/Index");

        let (a, b, c) = tokio::join!(
            inflight.run(key, || counted(&counter, false)),
            inflight.run(key, || counted(&counter, false)),
            inflight.run(key, || counted(&counter, false)),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let inflight = InFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            inflight.run(Path::new("/dist/A"), || counted(&counter, false)),
            inflight.run(Path::new("/dist/B"), || counted(&counter, false)),
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn settled_runs_are_forgotten() {
        let inflight = InFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = Path::new("/dist/Index");

        inflight.run(key, || counted(&counter, false)).await.unwrap();
        inflight.run(key, || counted(&counter, false)).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_reach_every_waiter() {
        let inflight = InFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let key = Path::new("/dist/Broken");

        let (a, b) = tokio::join!(
            inflight.run(key, || counted(&counter, true)),
            inflight.run(key, || counted(&counter, true)),
        );
        assert!(a.unwrap_err().is_build());
        assert!(b.unwrap_err().is_build());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }
}
