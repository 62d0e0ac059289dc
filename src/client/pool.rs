//! Credential pool with failure-driven rotation.

use crate::models::{ExamForgeError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered pool of interchangeable service credentials.
///
/// The key list is read-only after construction; the rotation cursor is the
/// only mutable state. The cursor advances on failure, never on success, so a
/// healthy credential keeps serving until it degrades.
///
/// The cursor is advanced with relaxed atomics and may race across concurrent
/// logical calls. Credential identity is a load-spreading hint, not a
/// reservation, so the race is tolerated.
#[derive(Debug)]
pub struct CredentialPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    /// Build a pool from an ordered key list. Fails on an empty list.
    pub fn new(keys: Vec<String>) -> Result<Self> {
        if keys.is_empty() {
            return Err(ExamForgeError::EmptyCredentialPool);
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The credential the cursor currently points at.
    pub fn current(&self) -> &str {
        &self.keys[self.cursor.load(Ordering::Relaxed) % self.keys.len()]
    }

    /// Advance the cursor to the next credential, wrapping around.
    pub fn advance(&self) {
        self.cursor.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of credentials in the pool.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total attempts allowed for one logical call.
    pub fn attempt_bound(&self) -> usize {
        2 * self.keys.len()
    }
}
