//! Recent handling failures kept for `/error`

use std::collections::VecDeque;
use std::fmt::Write;

/// Records kept per session; older ones are dropped
pub const ERROR_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub timestamp: String,
    pub error: String,
    pub trace: String,
    pub message_text: Option<String>,
}

#[derive(Debug, Default)]
pub struct ErrorLog {
    records: VecDeque<ErrorRecord>,
}

impl ErrorLog {
    pub fn push(&mut self, record: ErrorRecord) {
        if self.records.len() == ERROR_LOG_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// The most recent `limit` records, oldest first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &ErrorRecord> {
        let skip = self.records.len().saturating_sub(limit);
        self.records.iter().skip(skip)
    }

    /// Human-readable rendering of the most recent `limit` records
    pub fn describe(&self, limit: usize) -> String {
        let mut out = String::new();
        for record in self.recent(limit) {
            let _ = write!(
                out,
                "\nError: {}\nTimestamp: {}\nOriginal message: {}\nTraceback: {}\n",
                record.error,
                record.timestamp,
                record.message_text.as_deref().unwrap_or("-"),
                record.trace
            );
        }
        out
    }
}
