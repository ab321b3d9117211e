//! # Storage Collaborator
//!
//! [`GovernanceRepository`] is the narrow, tenant-scoped interface the
//! scheduler needs from persistence. The ledger and decision store behind
//! it are append-only.
//!
//! `check_and_set_idempotent` must be atomic: of any number of concurrent
//! callers presenting the same key, exactly one sees `true`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use gov_core::{GovernableSpan, LawDecisionSpan, LedgerEvent};
use parking_lot::Mutex;

use crate::error::StorageError;

/// Tenant-scoped storage used by the scheduler.
#[async_trait]
pub trait GovernanceRepository: Send + Sync {
    /// Active governable spans for the tenant.
    async fn fetch_active(&self, tenant_id: &str) -> Result<Vec<GovernableSpan>, StorageError>;

    /// Atomically claim `key`. Returns `true` if this call claimed it,
    /// `false` if it was already claimed.
    async fn check_and_set_idempotent(&self, tenant_id: &str, key: &str) -> Result<bool, StorageError>;

    /// Persist a decision.
    async fn store_decision(&self, tenant_id: &str, decision: &LawDecisionSpan) -> Result<(), StorageError>;

    /// Append a ledger event.
    async fn append_event(&self, tenant_id: &str, event: &LedgerEvent) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct Store {
    spans: BTreeMap<String, Vec<GovernableSpan>>,
    claimed: BTreeSet<(String, String)>,
    decisions: BTreeMap<String, Vec<LawDecisionSpan>>,
    events: BTreeMap<String, Vec<LedgerEvent>>,
}

/// In-process repository for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active span under its own `tenant_id`.
    pub fn seed(&self, span: GovernableSpan) {
        self.seed_for(span.tenant_id.clone(), span);
    }

    /// Add an active span under `tenant_id`, whatever the span claims.
    pub fn seed_for(&self, tenant_id: impl Into<String>, span: GovernableSpan) {
        self.store
            .lock()
            .spans
            .entry(tenant_id.into())
            .or_default()
            .push(span);
    }

    /// Ledger events appended for the tenant, in order.
    pub fn events(&self, tenant_id: &str) -> Vec<LedgerEvent> {
        self.store
            .lock()
            .events
            .get(tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Incident events appended for the tenant.
    pub fn incidents(&self, tenant_id: &str) -> Vec<LedgerEvent> {
        self.events(tenant_id)
            .into_iter()
            .filter(LedgerEvent::is_incident)
            .collect()
    }

    /// Decisions stored for the tenant, in order.
    pub fn decisions(&self, tenant_id: &str) -> Vec<LawDecisionSpan> {
        self.store
            .lock()
            .decisions
            .get(tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of claimed idempotency keys for the tenant.
    pub fn claimed_count(&self, tenant_id: &str) -> usize {
        self.store
            .lock()
            .claimed
            .iter()
            .filter(|(t, _)| t == tenant_id)
            .count()
    }
}

#[async_trait]
impl GovernanceRepository for InMemoryRepository {
    async fn fetch_active(&self, tenant_id: &str) -> Result<Vec<GovernableSpan>, StorageError> {
        Ok(self
            .store
            .lock()
            .spans
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn check_and_set_idempotent(&self, tenant_id: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .store
            .lock()
            .claimed
            .insert((tenant_id.to_string(), key.to_string())))
    }

    async fn store_decision(&self, tenant_id: &str, decision: &LawDecisionSpan) -> Result<(), StorageError> {
        self.store
            .lock()
            .decisions
            .entry(tenant_id.to_string())
            .or_default()
            .push(decision.clone());
        Ok(())
    }

    async fn append_event(&self, tenant_id: &str, event: &LedgerEvent) -> Result<(), StorageError> {
        self.store
            .lock()
            .events
            .entry(tenant_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }
}
