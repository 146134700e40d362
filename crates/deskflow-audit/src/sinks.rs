// crates/deskflow-audit/src/sinks.rs
// ============================================================================
// Module: Audit Sinks
// Description: JSONL audit sinks for stderr, files, and tests.
// Purpose: Route audit events to a destination without redesign.
// Dependencies: deskflow-core, serde_json
// ============================================================================

//! ## Overview
//! Concrete [`AuditSink`] destinations. Every sink writes one JSON object per
//! line and never fails the request path: a sink that cannot write drops the
//! event silently. Deployments that need durable audit trails point the file
//! sink at persistent storage; the stderr sink suits container logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use deskflow_core::AuditEvent;
use deskflow_core::interfaces::AuditSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests assert on known-good values")]

    use deskflow_core::AgentName;
    use deskflow_core::AuditDecision;
    use deskflow_core::RunAuditParams;
    use deskflow_core::TraceId;

    use super::*;

    fn sample_event() -> AuditEvent {
        AuditEvent::run_summary(RunAuditParams {
            trace_id: TraceId::new("df-0-1"),
            actor: "user-1".to_string(),
            agent: AgentName::new("helpdesk"),
            decision: AuditDecision::Ok,
            reason: None,
            used_tools: Vec::new(),
        })
    }

    #[test]
    fn file_sink_appends_one_json_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&sample_event());
        sink.record(&sample_event());
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["event"], "agent_run");
        }
    }

    #[test]
    fn noop_sink_accepts_events() {
        NoopAuditSink.record(&sample_event());
    }
}
