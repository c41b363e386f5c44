//! Shared helpers for the integration tests.

use std::sync::{Arc, Mutex};

use engine_core::world::World;

/// Installs a test-friendly `tracing` subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Errors captured by a world's sink, shared with the test body.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<Vec<anyhow::Error>>>);

impl ErrorLog {
    /// A world whose sink appends to this log.
    pub fn world(&self) -> World {
        let log = self.clone();
        World::with_error_sink(move |err| log.push(err))
    }

    fn push(&self, err: anyhow::Error) {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).push(err);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the captured errors, leaving the log empty.
    pub fn drain(&self) -> Vec<anyhow::Error> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(|p| p.into_inner()))
    }
}

/// Call recorder for systems; entries are compared as sets.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn record(&self, entry: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(entry.into());
    }

    /// Recorded entries, sorted.
    pub fn sorted(&self) -> Vec<String> {
        let mut calls = self.0.lock().unwrap_or_else(|p| p.into_inner()).clone();
        calls.sort();
        calls
    }
}

/// Sorts expected entries so they can be compared with [`Calls::sorted`].
pub fn sorted<S: AsRef<str>, const N: usize>(entries: [S; N]) -> Vec<String> {
    let mut out: Vec<String> = entries.iter().map(|s| s.as_ref().to_string()).collect();
    out.sort();
    out
}
