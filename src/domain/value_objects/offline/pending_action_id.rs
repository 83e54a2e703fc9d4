use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingActionId(i64);

impl PendingActionId {
    pub fn new(value: i64) -> Result<Self, String> {
        if value <= 0 {
            return Err("Pending action id must be positive".to_string());
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for PendingActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<PendingActionId> for i64 {
    fn from(id: PendingActionId) -> Self {
        id.0
    }
}
