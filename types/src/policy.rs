use std::fmt;

use serde::{Deserialize, Serialize};

/// How a gather combines member failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatherPolicy {
    /// Wait for every member, then fail with the earliest failure if any.
    #[default]
    AllOrFirstError,
    /// Return on the first failure; remaining members keep running detached.
    FirstErrorFast,
}

impl GatherPolicy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllOrFirstError => "all_or_first_error",
            Self::FirstErrorFast => "first_error_fast",
        }
    }
}

impl fmt::Display for GatherPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
