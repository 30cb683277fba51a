//! Named execution priorities.
//!
//! Lower values run first. Any `i32` is a valid order; these names are the
//! conventional anchors plugins use so they can slot in before or after
//! each other without coordinating exact numbers.

use serde::{Deserialize, Serialize};

/// Conventional ordering anchors for hook callbacks and registry items.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Runs before everything else.
    Highest,
    /// Runs early.
    High,
    /// The default.
    #[default]
    Neutral,
    /// Runs late.
    Low,
    /// Runs after everything else.
    Lowest,
}

impl Priority {
    /// Returns the numeric order for this priority.
    pub fn value(self) -> i32 {
        match self {
            Self::Highest => -1000,
            Self::High => -500,
            Self::Neutral => 0,
            Self::Low => 500,
            Self::Lowest => 1000,
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> i32 {
        priority.value()
    }
}

impl From<Priority> for Option<i32> {
    fn from(priority: Priority) -> Option<i32> {
        Some(priority.value())
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}
