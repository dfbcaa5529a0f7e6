// src/engine/result.rs

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::outcome::Outcome;

#[derive(Debug)]
struct ResultState {
    outcomes: Vec<Outcome>,
    successful: bool,
}

/// Outcomes of one executor run, in the order they were appended, plus an
/// aggregate success flag (true until a failed outcome is pushed).
///
/// Shared by every worker of a parallel run; all access goes through one
/// lock.
#[derive(Debug)]
pub struct ExecutionResult {
    state: Mutex<ResultState>,
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self {
            state: Mutex::new(ResultState {
                outcomes: Vec::new(),
                successful: true,
            }),
        }
    }
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: impl Into<Outcome>) {
        let outcome = outcome.into();
        let mut state = self.lock();
        state.successful &= outcome.is_successful();
        state.outcomes.push(outcome);
    }

    pub fn is_successful(&self) -> bool {
        self.lock().successful
    }

    pub fn is_failed(&self) -> bool {
        !self.is_successful()
    }

    pub fn len(&self) -> usize {
        self.lock().outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the outcomes appended so far.
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.lock().outcomes.clone()
    }

    pub fn failed_outcomes(&self) -> Vec<Outcome> {
        self.lock()
            .outcomes
            .iter()
            .filter(|o| o.is_failed())
            .cloned()
            .collect()
    }

    pub fn into_outcomes(self) -> Vec<Outcome> {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .outcomes
    }

    fn lock(&self) -> MutexGuard<'_, ResultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FromIterator<Outcome> for ExecutionResult {
    fn from_iter<T: IntoIterator<Item = Outcome>>(iter: T) -> Self {
        let result = ExecutionResult::new();
        for outcome in iter {
            result.push(outcome);
        }
        result
    }
}
