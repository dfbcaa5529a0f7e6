// src/vars.rs

//! Named, lazily computed values shared by commands and scripts.
//!
//! A variable is either a literal string or a thunk evaluated against the
//! set itself, so variables can refer to each other (`release_dir =
//! "/srv/%{app}/releases"`). Thunks run at most once per definition; the
//! result is memoized until the set is modified.
//!
//! One thread at a time evaluates thunks. Others asking for an unmemoized
//! value wait for it, then read the memoized result. Nested lookups from
//! inside a thunk re-enter on the evaluating thread.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, LazyLock, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use regex::{Captures, Regex};
use tracing::{trace, warn};

use crate::errors::{HostrunError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is a valid regex")
});

pub type Thunk = Arc<dyn Fn(&VariableSet) -> Result<String> + Send + Sync>;

#[derive(Clone)]
pub enum Variable {
    Literal(String),
    Thunk(Thunk),
}

impl Variable {
    pub fn thunk<F>(f: F) -> Self
    where
        F: Fn(&VariableSet) -> Result<String> + Send + Sync + 'static,
    {
        Variable::Thunk(Arc::new(f))
    }

    /// A thunk that expands `%{name}` placeholders in `template`.
    pub fn template(template: impl Into<String>) -> Self {
        let template = template.into();
        Variable::thunk(move |vars| vars.interpolate(&template))
    }

    /// Literal unless `value` contains a placeholder.
    pub fn from_config(value: impl Into<String>) -> Self {
        let value = value.into();
        if PLACEHOLDER.is_match(&value) {
            Variable::template(value)
        } else {
            Variable::Literal(value)
        }
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variable::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Variable::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::Literal(value.to_string())
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::Literal(value)
    }
}

#[derive(Default)]
struct Evaluation {
    owner: Option<ThreadId>,
    /// Names `owner` is evaluating, innermost last.
    stack: Vec<String>,
}

#[derive(Default)]
pub struct VariableSet {
    definitions: BTreeMap<String, Variable>,
    cache: Mutex<HashMap<String, String>>,
    evaluation: Mutex<Evaluation>,
    evaluation_done: Condvar,
}

impl std::fmt::Debug for VariableSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.definitions.iter()).finish()
    }
}

impl Clone for VariableSet {
    fn clone(&self) -> Self {
        Self {
            definitions: self.definitions.clone(),
            cache: Mutex::new(lock(&self.cache).clone()),
            evaluation: Mutex::default(),
            evaluation_done: Condvar::new(),
        }
    }
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) `name`. Clears memoized values, since other
    /// thunks may depend on it.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Variable>) {
        self.definitions.insert(name.into(), value.into());
        lock(&self.cache).clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<String> {
        if let Some(value) = lock(&self.cache).get(name) {
            return Ok(value.clone());
        }

        let thunk = match self.definitions.get(name) {
            None => return Err(HostrunError::VariableNotFound(name.to_string())),
            Some(Variable::Literal(value)) => return Ok(value.clone()),
            Some(Variable::Thunk(thunk)) => Arc::clone(thunk),
        };

        let _turn = self.begin_evaluation(name)?;
        if let Some(value) = lock(&self.cache).get(name) {
            return Ok(value.clone());
        }
        trace!(variable = name, "evaluating thunk");
        let value = thunk(self)?;
        lock(&self.cache).insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Wait until no other thread is evaluating, then push `name` onto the
    /// evaluation stack. Fails if `name` is already on it.
    fn begin_evaluation(&self, name: &str) -> Result<EvaluationTurn<'_>> {
        let me = thread::current().id();
        let mut state = lock(&self.evaluation);
        while state.owner.is_some_and(|owner| owner != me) {
            state = self
                .evaluation_done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.stack.iter().any(|pending| pending == name) {
            return Err(HostrunError::VariableCycle(name.to_string()));
        }
        state.owner = Some(me);
        state.stack.push(name.to_string());
        Ok(EvaluationTurn { set: self })
    }

    /// Expand every `%{name}` in `template`; any unresolvable name is an
    /// error.
    pub fn interpolate(&self, template: &str) -> Result<String> {
        let mut failure = None;
        let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            match self.get(&caps[1]) {
                Ok(value) => value,
                Err(err) => {
                    failure.get_or_insert(err);
                    String::new()
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Like [`interpolate`](Self::interpolate), but placeholders that cannot
    /// be resolved are logged and left in place.
    pub fn interpolate_lenient(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match self.get(&caps[1]) {
                Ok(value) => value,
                Err(err) => {
                    warn!(variable = &caps[1], error = %err, "leaving placeholder unexpanded");
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

/// Pops the evaluation stack on drop, including when a thunk panics.
struct EvaluationTurn<'a> {
    set: &'a VariableSet,
}

impl Drop for EvaluationTurn<'_> {
    fn drop(&mut self) {
        let mut state = lock(&self.set.evaluation);
        state.stack.pop();
        if state.stack.is_empty() {
            state.owner = None;
            drop(state);
            self.set.evaluation_done.notify_all();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
