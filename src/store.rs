// ==============================================================================
// store.rs - Family Member Store
// ==============================================================================
// Description: Explicit in-memory store of family members and comparisons
// Author: Matt Barham
// Created: 2026-01-27
// Modified: 2026-02-09
// Version: 1.0.0
// ==============================================================================
// Each store is an independent value owned by the caller. Nothing is global,
// so separate engines (per test, per tenant) never see each other's members.
// Deactivation is soft: the member stays resolvable for comparison history.
// ==============================================================================

use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::audit::{AuditEvent, AuditEventType, AuditTrail};
use crate::family::Comparison;
use crate::models::Individual;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Family member already exists: {0}")]
    DuplicateMember(String),

    #[error("Family member not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct FamilyStore {
    members: BTreeMap<String, Individual>,
    comparisons: Vec<Comparison>,
    audit: AuditTrail,
}

impl FamilyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, member: Individual) -> Result<(), StoreError> {
        if self.members.contains_key(&member.id) {
            return Err(StoreError::DuplicateMember(member.id));
        }

        self.audit.record(
            AuditEventType::MemberAdded,
            Some(member.id.clone()),
            json!({
                "display_name": member.demographics.display_name,
                "variants": member.variants.len(),
            }),
        );
        self.members.insert(member.id.clone(), member);
        Ok(())
    }

    /// Soft-deactivate a member. Deactivating twice is a no-op.
    pub fn deactivate_member(&mut self, member_id: &str) -> Result<(), StoreError> {
        let member = self
            .members
            .get_mut(member_id)
            .ok_or_else(|| StoreError::NotFound(member_id.to_string()))?;

        if member.active {
            member.deactivate();
            self.audit.record(
                AuditEventType::MemberDeactivated,
                Some(member_id.to_string()),
                json!({}),
            );
        }
        Ok(())
    }

    /// Look up a member, active or not
    pub fn member(&self, member_id: &str) -> Option<&Individual> {
        self.members.get(member_id)
    }

    pub fn active_members(&self) -> impl Iterator<Item = &Individual> {
        self.members.values().filter(|m| m.active)
    }

    pub fn record_comparison(&mut self, comparison: Comparison) -> &Comparison {
        self.audit.record(
            AuditEventType::ComparisonCreated,
            Some(comparison.id.to_string()),
            json!({
                "member1_id": comparison.member1_id,
                "member2_id": comparison.member2_id,
                "similarity_score": comparison.similarity_score,
            }),
        );
        self.comparisons.push(comparison);
        &self.comparisons[self.comparisons.len() - 1]
    }

    /// Record a comparison request that could not be served
    pub fn record_rejection(&mut self, member1_id: &str, member2_id: &str, reason: &str) {
        self.audit.record(
            AuditEventType::ComparisonRejected,
            None,
            json!({
                "member1_id": member1_id,
                "member2_id": member2_id,
                "reason": reason,
            }),
        );
    }

    /// Record an event that is not tied to a store mutation
    pub fn record_event(&mut self, event_type: AuditEventType, resource: Option<String>, details: serde_json::Value) {
        self.audit.record(event_type, resource, details);
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    pub fn comparisons_for<'a>(&'a self, member_id: &'a str) -> impl Iterator<Item = &'a Comparison> + 'a {
        self.comparisons.iter().filter(move |c| c.involves(member_id))
    }

    pub fn audit_events(&self) -> &[AuditEvent] {
        self.audit.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Demographics;
    use chrono::Utc;
    use uuid::Uuid;

    fn member(id: &str) -> Individual {
        Individual::new(
            id,
            Demographics {
                display_name: id.to_uppercase(),
                ..Demographics::default()
            },
            Vec::new(),
        )
    }

    fn comparison(a: &str, b: &str) -> Comparison {
        Comparison {
            id: Uuid::new_v4(),
            member1_id: a.to_string(),
            member2_id: b.to_string(),
            common_variants: Vec::new(),
            inherited_traits: Vec::new(),
            risk_comparison: Vec::new(),
            similarity_score: 100.0,
            recommendations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = FamilyStore::new();
        store.add_member(member("mother")).unwrap();
        store.add_member(member("son")).unwrap();

        assert_eq!(store.member("son").unwrap().demographics.display_name, "SON");
        assert!(store.member("father").is_none());
        assert_eq!(store.active_members().count(), 2);
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut store = FamilyStore::new();
        store.add_member(member("a")).unwrap();
        assert_eq!(
            store.add_member(member("a")),
            Err(StoreError::DuplicateMember("a".to_string()))
        );
    }

    #[test]
    fn test_deactivation_keeps_history() {
        let mut store = FamilyStore::new();
        store.add_member(member("a")).unwrap();
        store.add_member(member("b")).unwrap();
        store.record_comparison(comparison("a", "b"));

        store.deactivate_member("a").unwrap();
        store.deactivate_member("a").unwrap();

        assert!(!store.member("a").unwrap().active);
        assert_eq!(store.active_members().count(), 1);
        assert_eq!(store.comparisons_for("a").count(), 1);
        assert_eq!(
            store.deactivate_member("zzz"),
            Err(StoreError::NotFound("zzz".to_string()))
        );

        let deactivations = store
            .audit_events()
            .iter()
            .filter(|e| e.event_type == AuditEventType::MemberDeactivated)
            .count();
        assert_eq!(deactivations, 1);
    }

    #[test]
    fn test_stores_are_independent() {
        let mut first = FamilyStore::new();
        let second = FamilyStore::new();
        first.add_member(member("a")).unwrap();

        assert!(first.member("a").is_some());
        assert!(second.member("a").is_none());
        assert!(second.audit_events().is_empty());
    }
}
