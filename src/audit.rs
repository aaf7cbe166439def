//! Append-only audit trail of the holding phase.
//!
//! One CSV line per holding iteration: local date, local time, current and
//! goal temperature at two decimal places. Write failures are logged and
//! swallowed; the audit trail is diagnostics, not safety.

use chrono::Local;
use log::warn;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn record(&self, current_temp_c: f64, goal_temp_c: f64) {
        let now = Local::now();
        let line = format!(
            "{},{},{:.2},{:.2}\n",
            now.format("%Y-%m-%d"),
            now.format("%H:%M:%S%.6f"),
            current_temp_c,
            goal_temp_c
        );

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));

        if let Err(e) = result {
            warn!("Failed to append audit record to {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_records_are_appended_with_two_decimals() {
        let path = std::env::temp_dir().join(format!("wort-audit-test-{}", std::process::id()));
        let _ = fs::remove_file(&path);

        let audit = AuditLog::new(path.clone());
        audit.record(64.12345, 65.0);
        audit.record(64.9, 65.0);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(",64.12,65.00"), "line: {}", lines[0]);
        assert!(lines[1].ends_with(",64.90,65.00"), "line: {}", lines[1]);
        assert_eq!(lines[0].split(',').count(), 4);

        fs::remove_file(path).unwrap();
    }
}
