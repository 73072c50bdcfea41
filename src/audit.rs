// ==============================================================================
// audit.rs - Audit Trail for Genetic Data Operations
// ==============================================================================
// Description: Typed audit events for family store and analysis operations
// Author: Matt Barham
// Created: 2025-10-31
// Modified: 2026-02-09
// Version: 2.0.0
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Dataset events
    KnowledgeBaseLoaded,

    // Processing events
    VariantsIngested,
    AnalysisCompleted,

    // Family store events
    MemberAdded,
    MemberDeactivated,
    ComparisonCreated,
    ComparisonRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Member or dataset the event refers to
    pub resource: Option<String>,
    pub result: String,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let (severity, result) = match event_type {
            AuditEventType::ComparisonRejected => (LogSeverity::Warning, "rejected"),
            AuditEventType::MemberDeactivated => (LogSeverity::Warning, "success"),
            _ => (LogSeverity::Info, "success"),
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            resource,
            result: result.to_string(),
            details,
            severity,
        }
    }

    /// Write the event to the `audit` tracing target
    pub fn emit(&self) {
        let details = self.details.to_string();
        match self.severity {
            LogSeverity::Info => info!(
                target: "audit",
                event_type = ?self.event_type,
                resource = self.resource.as_deref().unwrap_or("-"),
                result = %self.result,
                "{}", details
            ),
            LogSeverity::Warning => warn!(
                target: "audit",
                event_type = ?self.event_type,
                resource = self.resource.as_deref().unwrap_or("-"),
                result = %self.result,
                "{}", details
            ),
            LogSeverity::Error => error!(
                target: "audit",
                event_type = ?self.event_type,
                resource = self.resource.as_deref().unwrap_or("-"),
                result = %self.result,
                "{}", details
            ),
        }
    }
}

/// In-memory, append-only audit trail
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    events: Vec<AuditEvent>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit and record an event
    pub fn record(
        &mut self,
        event_type: AuditEventType,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> &AuditEvent {
        let event = AuditEvent::new(event_type, resource, details);
        event.emit();
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn events_of(&self, event_type: AuditEventType) -> impl Iterator<Item = &AuditEvent> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_by_event_type() {
        let added = AuditEvent::new(AuditEventType::MemberAdded, Some("m1".into()), json!({}));
        assert_eq!(added.severity, LogSeverity::Info);
        assert_eq!(added.result, "success");

        let rejected = AuditEvent::new(
            AuditEventType::ComparisonRejected,
            Some("m1".into()),
            json!({"reason": "not found"}),
        );
        assert_eq!(rejected.severity, LogSeverity::Warning);
        assert_eq!(rejected.result, "rejected");
    }

    #[test]
    fn test_trail_is_append_only() {
        let mut trail = AuditTrail::new();
        trail.record(AuditEventType::MemberAdded, Some("a".into()), json!({}));
        trail.record(AuditEventType::MemberAdded, Some("b".into()), json!({}));
        trail.record(AuditEventType::ComparisonCreated, None, json!({"similarity": 87.5}));

        assert_eq!(trail.len(), 3);
        assert_eq!(trail.events_of(AuditEventType::MemberAdded).count(), 2);
        assert_eq!(trail.events()[2].details["similarity"], 87.5);
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(AuditEventType::KnowledgeBaseLoaded, None, json!({"entries": 22}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "knowledge_base_loaded");
        assert_eq!(value["severity"], "info");
    }
}
