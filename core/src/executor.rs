//! Executors that run callback deliveries.
//!
//! # Design
//! An `Executor` accepts a unit of work and runs it at some later point,
//! possibly on another thread. The shim owns no threads of its own; the
//! caller picks where results are delivered by picking the executor.
//! `InlineExecutor` runs work on the submitting thread and is meant for
//! deterministic tests. `TokioExecutor` hands work to a tokio runtime.

use std::sync::Arc;

use tokio::runtime::{Handle, TryCurrentError};

/// A unit of work submitted to an `Executor`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted tasks. Must accept submissions from several threads at once.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task)
    }
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Submits tasks to a tokio runtime.
///
/// Each task runs as a spawned future on one of the runtime's async worker
/// threads. Resuming a continuation is cheap, but a callback that blocks,
/// for instance by calling `Call::execute`, stalls that worker. Blocking work
/// belongs on `tokio::task::spawn_blocking`.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime the caller is currently running in.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Executor for TokioExecutor {
    fn execute(&self, task: Task) {
        // Detached: delivery is observed through the task's own side effects.
        drop(self.handle.spawn(async move { task() }));
    }
}
