//! Resume state for a long-running backfill, persisted per trigger name so
//! a multi-tick harvest can pick up where it left off.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillCursor {
    pub year: i32,
    pub month: u32,
    pub page: u32,
}

impl BackfillCursor {
    /// Advances to the next calendar month, resetting the page.
    pub fn next_month(self) -> Self {
        let (year, month) = if self.month >= 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Self { year, month, page: 0 }
    }

    /// Advances to the next page within the same month.
    pub fn next_page(self) -> Self {
        Self { page: self.page + 1, ..self }
    }
}
