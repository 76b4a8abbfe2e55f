// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target labels — one per kernel endpoint.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Label identifying one kernel endpoint: the local host, a named network
/// namespace, or a remote host. All table keys are namespaced by target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(SmolStr);

impl Target {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(SmolStr::new(label.as_ref()))
    }

    /// The default target: the host kernel.
    pub fn localhost() -> Self {
        Self(SmolStr::new_static("localhost"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::localhost()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Target {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Target {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Target {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
