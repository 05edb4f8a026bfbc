//! Injection-key correlation.
//!
//! Keys are registered before a payload is planted and looked up when a
//! fire arrives. Entries never expire.

use std::sync::Arc;

use xsshunter_core::{RecordOutcome, NO_CORRELATED_REQUEST};

use crate::db::{Database, DbError};

#[derive(Clone)]
pub struct CorrelationIndex {
    db: Arc<Database>,
}

impl CorrelationIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn record(
        &self,
        owner_id: &str,
        injection_key: &str,
        request_text: &str,
    ) -> Result<RecordOutcome, DbError> {
        let outcome = self.db.record_injection(owner_id, injection_key, request_text)?;
        if outcome == RecordOutcome::Conflict {
            tracing::info!(owner_id, injection_key, "Injection key reused");
        }
        Ok(outcome)
    }

    pub fn resolve(&self, injection_key: &str) -> Result<Option<String>, DbError> {
        self.db.resolve_injection(injection_key)
    }

    /// Best-effort lookup for the ingestion path. Misses and lookup errors
    /// both produce the sentinel text.
    pub fn resolve_or_sentinel(&self, injection_key: &str) -> String {
        if injection_key.is_empty() {
            return NO_CORRELATED_REQUEST.to_string();
        }
        match self.resolve(injection_key) {
            Ok(Some(request)) => request,
            Ok(None) => NO_CORRELATED_REQUEST.to_string(),
            Err(e) => {
                tracing::warn!(injection_key, error = %e, "Correlation lookup failed");
                NO_CORRELATED_REQUEST.to_string()
            }
        }
    }
}
