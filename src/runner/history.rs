use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

/// Maximum number of history entries
pub const HISTORY_LIMIT: usize = 50;

/// Terminal name recorded for commands run in the default session
pub const DEFAULT_TERMINAL_LABEL: &str = "default";

/// One executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub command: String,
    /// Named session, or `"default"`
    pub terminal_name: String,
    pub timestamp: DateTime<Utc>,
    /// How many times this command had run, including this one
    pub execution_count: u32,
}

/// Per-command execution statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStats {
    pub count: u32,
    pub last_executed: DateTime<Utc>,
}

/// Bounded newest-first history plus per-command statistics
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: VecDeque<ExecutionRecord>,
    stats: HashMap<String, CommandStats>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution and return the stored record
    pub fn record(
        &mut self,
        command: &str,
        terminal_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> ExecutionRecord {
        let stats = self
            .stats
            .entry(command.to_string())
            .and_modify(|s| {
                s.count += 1;
                s.last_executed = now;
            })
            .or_insert(CommandStats {
                count: 1,
                last_executed: now,
            });

        let record = ExecutionRecord {
            command: command.to_string(),
            terminal_name: terminal_name
                .unwrap_or(DEFAULT_TERMINAL_LABEL)
                .to_string(),
            timestamp: now,
            execution_count: stats.count,
        };

        self.entries.push_front(record.clone());
        self.entries.truncate(HISTORY_LIMIT);
        record
    }

    pub fn stats(&self, command: &str) -> Option<CommandStats> {
        self.stats.get(command).copied()
    }

    /// Newest first
    pub fn entries(&self) -> Vec<ExecutionRecord> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats.clear();
    }
}

/// "5 seconds ago", "1 minute ago", "3 days ago"
pub fn format_time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    if seconds < 60 {
        return plural(seconds, "second");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return plural(minutes, "minute");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return plural(hours, "hour");
    }
    plural(hours / 24, "day")
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}
