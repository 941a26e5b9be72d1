//! Thread naming for the node runtime.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::{Builder, Runtime};

/// Hands out thread names of the form `<prefix>-<n>`.
#[derive(Debug, Clone)]
pub struct NamedThreadFactory {
    prefix: String,
    counter: Arc<AtomicUsize>,
}

impl NamedThreadFactory {
    /// Factory naming threads `<prefix>-<n>`, counting from 0.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next thread name, `<prefix>-<n>`.
    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }

    /// Spawn a named OS thread.
    pub fn spawn<F, T>(&self, f: F) -> io::Result<thread::JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        thread::Builder::new().name(self.next_name()).spawn(f)
    }

    /// Multi-threaded tokio runtime whose worker and blocking threads are
    /// named by this factory.
    pub fn build_runtime(&self, worker_threads: usize) -> io::Result<Runtime> {
        let factory = self.clone();
        Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name_fn(move || factory.next_name())
            .enable_all()
            .build()
    }
}
