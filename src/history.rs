/// Processing history
///
/// Every operation applied to an experiment is recorded in order with a
/// timestamp, the typed operation and a human-readable description. The
/// history can be exported as text or JSON.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::pipeline::processing::ProcessingOp;

/// One recorded operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// 1-based position in the session
    pub sequence: usize,
    pub timestamp: DateTime<Local>,
    pub operation: ProcessingOp,
    pub description: String,
}

impl LogEntry {
    pub fn to_text(&self) -> String {
        format!(
            "[{:03}] {} | {}{}",
            self.sequence,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.operation,
            if self.description.is_empty() {
                String::new()
            } else {
                format!("\n      {}", self.description)
            }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLog {
    pub session_id: String,
    pub session_start: DateTime<Local>,
    pub source: String,
    pub software_version: String,
    pub entries: Vec<LogEntry>,
}

impl ProcessingLog {
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            session_start: Local::now(),
            source: String::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            entries: Vec::new(),
        }
    }

    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
    }

    pub fn add_entry(&mut self, operation: ProcessingOp, description: &str) {
        let seq = self.entries.len() + 1;
        log::info!("[{:03}] {}", seq, operation);
        self.entries.push(LogEntry {
            sequence: seq,
            timestamp: Local::now(),
            operation,
            description: description.to_string(),
        });
    }

    pub fn pop_entry(&mut self) -> Option<LogEntry> {
        self.entries.pop()
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_text(&self) -> String {
        let rule = "═".repeat(63);
        let mut out = String::new();
        out.push_str(&format!("{}\n  NMR Processing History\n{}\n", rule, rule));
        out.push_str(&format!("  Session ID:  {}\n", self.session_id));
        out.push_str(&format!(
            "  Started:     {}\n",
            self.session_start.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("  Source:      {}\n", self.source));
        out.push_str(&format!("  Software:    open-nmr v{}\n", self.software_version));
        out.push_str(&format!("  Operations:  {}\n", self.entries.len()));
        out.push_str(&format!("{}\n\n", "─".repeat(63)));

        for entry in &self.entries {
            out.push_str(&entry.to_text());
            out.push_str("\n\n");
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_text(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for ProcessingLog {
    fn default() -> Self {
        Self::new()
    }
}
