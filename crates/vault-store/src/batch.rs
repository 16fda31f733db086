//! Per-item outcome of multi-file operations.
//!
//! Batches are not atomic: each item commits in its own transaction, so a
//! failure partway through leaves the earlier items committed.

use crate::error::StoreError;

#[derive(Debug)]
pub struct BatchFailure<E = StoreError> {
    /// File name for uploads, id for deletes.
    pub item: String,
    pub error: E,
}

#[derive(Debug)]
pub struct BatchReport<T, E = StoreError> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure<E>>,
}

impl<T, E> BatchReport<T, E> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record(&mut self, item: impl Into<String>, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => self.succeeded.push(value),
            Err(error) => self.failed.push(BatchFailure {
                item: item.into(),
                error,
            }),
        }
    }

    /// True when every item committed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T, E> Default for BatchReport<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
