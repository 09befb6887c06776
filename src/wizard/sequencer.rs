//! StepSequencer — fixed traversal order and the navigation rule.
//!
//! Moving backward (or staying) is always allowed; moving forward requires
//! the step being left to be valid.

use std::collections::HashMap;

use serde::Serialize;

use super::step::{Step, StepKey};
use crate::error::SequencerError;

/// What follows a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "step", rename_all = "snake_case")]
pub enum Next {
    Step(StepKey),
    /// The step was the last one; only submission remains.
    Terminal,
}

/// Ordered, duplicate-free list of steps.
#[derive(Debug, Clone)]
pub struct StepSequencer {
    steps: Vec<Step>,
    ordinals: HashMap<StepKey, usize>,
}

impl StepSequencer {
    /// Build from `(key, label)` pairs; insertion order is traversal order.
    pub fn new<I, K, L>(steps: I) -> Result<Self, SequencerError>
    where
        I: IntoIterator<Item = (K, L)>,
        K: Into<StepKey>,
        L: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut ordinals = HashMap::new();
        for (ordinal, (key, label)) in steps.into_iter().enumerate() {
            let key = key.into();
            if ordinals.insert(key.clone(), ordinal).is_some() {
                return Err(SequencerError::DuplicateStep(key.to_string()));
            }
            ordered.push(Step {
                key,
                label: label.into(),
                ordinal,
            });
        }
        if ordered.is_empty() {
            return Err(SequencerError::Empty);
        }
        Ok(Self {
            steps: ordered,
            ordinals,
        })
    }

    /// Step keys in traversal order.
    pub fn order(&self) -> Vec<StepKey> {
        self.steps.iter().map(|s| s.key.clone()).collect()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.ordinals.contains_key(key)
    }

    pub fn ordinal(&self, key: &str) -> Option<usize> {
        self.ordinals.get(key).copied()
    }

    pub fn step(&self, key: &str) -> Option<&Step> {
        self.ordinal(key).map(|i| &self.steps[i])
    }

    pub fn first(&self) -> &StepKey {
        &self.steps[0].key
    }

    pub fn last(&self) -> &StepKey {
        &self.steps[self.steps.len() - 1].key
    }

    pub fn is_last(&self, key: &str) -> bool {
        self.last().as_str() == key
    }

    /// Whether the user may go from `from` to `to`.
    ///
    /// Unknown steps are never navigable.
    pub fn can_navigate(&self, from: &str, to: &str, is_from_valid: bool) -> bool {
        match (self.ordinal(from), self.ordinal(to)) {
            (Some(from), Some(to)) => to <= from || is_from_valid,
            _ => false,
        }
    }

    /// The step after `key`, or [`Next::Terminal`] for the last step.
    /// `None` for unknown keys.
    pub fn next(&self, key: &str) -> Option<Next> {
        let ordinal = self.ordinal(key)?;
        Some(match self.steps.get(ordinal + 1) {
            Some(step) => Next::Step(step.key.clone()),
            None => Next::Terminal,
        })
    }

    /// Where a resumed wizard starts: the last step in order that has a
    /// saved draft, else the first step.
    pub fn resume_point<'a, I>(&self, saved: I) -> &StepKey
    where
        I: IntoIterator<Item = &'a str>,
    {
        saved
            .into_iter()
            .filter_map(|key| self.ordinal(key))
            .max()
            .map(|i| &self.steps[i].key)
            .unwrap_or_else(|| self.first())
    }
}
