//! Fault injection for exercising failure paths.

use crate::backend::SnapshotBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// Which backend steps should fail on their next invocation.
///
/// Each flag is consumed by the first call it applies to, so a test can
/// arrange "the next commit fails, the one after succeeds".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FaultPlan {
    /// Fail the next `stage`.
    pub fail_stage: bool,
    /// Fail the next `commit` before it reaches the wrapped backend.
    pub fail_commit: bool,
    /// Let the next `commit` reach the wrapped backend, then report failure.
    pub fail_after_commit: bool,
    /// Fail every `commit` until cleared.
    pub fail_all_commits: bool,
    /// Fail the next `load`.
    pub fail_load: bool,
}

/// Wraps another backend and fails steps according to a shared [`FaultPlan`].
///
/// The plan lives behind an `Arc`, so a test keeps a handle from
/// [`FaultInjectingBackend::plan_handle`] after the backend has been moved
/// into a store.
#[derive(Debug)]
pub struct FaultInjectingBackend<B> {
    inner: B,
    plan: Arc<Mutex<FaultPlan>>,
}

impl<B: SnapshotBackend> FaultInjectingBackend<B> {
    /// Wraps `inner` with an empty plan.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            plan: Arc::new(Mutex::new(FaultPlan::default())),
        }
    }

    /// Returns a handle for changing the plan later.
    pub fn plan_handle(&self) -> Arc<Mutex<FaultPlan>> {
        Arc::clone(&self.plan)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: SnapshotBackend> SnapshotBackend for FaultInjectingBackend<B> {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        {
            let mut plan = self.plan.lock();
            if plan.fail_load {
                plan.fail_load = false;
                return Err(StorageError::Injected { step: "load" });
            }
        }
        self.inner.load()
    }

    fn stage(&mut self, data: &[u8]) -> StorageResult<()> {
        {
            let mut plan = self.plan.lock();
            if plan.fail_stage {
                plan.fail_stage = false;
                return Err(StorageError::Injected { step: "stage" });
            }
        }
        self.inner.stage(data)
    }

    fn commit(&mut self) -> StorageResult<()> {
        {
            let mut plan = self.plan.lock();
            if plan.fail_after_commit {
                plan.fail_after_commit = false;
                drop(plan);
                self.inner.commit()?;
                return Err(StorageError::Injected { step: "commit" });
            }
            if plan.fail_all_commits {
                return Err(StorageError::Injected { step: "commit" });
            }
            if plan.fail_commit {
                plan.fail_commit = false;
                return Err(StorageError::Injected { step: "commit" });
            }
        }
        self.inner.commit()
    }

    fn discard(&mut self) -> StorageResult<()> {
        self.inner.discard()
    }

    fn has_staged(&self) -> bool {
        self.inner.has_staged()
    }
}
