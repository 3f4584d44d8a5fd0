//! Vellum Test Utilities
//!
//! Shared test infrastructure for the Vellum workspace:
//! - Sample record types covering the interesting declarations
//! - Proptest generators for record metadata and entities
//! - Fixtures for services and units of work
//! - Assertions for Vellum-specific error shapes

pub use vellum_core::{
    ActorId, AuditPolicy, CollectionOptions, ConfigError, EntityId, Filter, IndexDeclaration,
    Query, Record, RecordMeta, StorageError, Timestamp, VellumError, VellumResult,
};
pub use vellum_storage::{InMemoryDocumentStore, MemoryCache, PersistenceServices, UnitOfWork};

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// SAMPLE RECORDS
// ============================================================================

/// Minimal record: one string value, no indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntity {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub value: String,
}

impl SampleEntity {
    /// A sample with no id or audit fields set.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            value: value.into(),
        }
    }
}

impl Record for SampleEntity {
    fn collection_name() -> &'static str {
        "SampleEntity"
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

/// Record with a unique email index and a sparse unique loyalty number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loyalty_number: Option<String>,
}

impl Customer {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            email: email.into(),
            name: name.into(),
            loyalty_number: None,
        }
    }
}

impl Record for Customer {
    fn collection_name() -> &'static str {
        "Customer"
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn indexes() -> Vec<IndexDeclaration> {
        vec![
            IndexDeclaration::ascending("email").unique(),
            IndexDeclaration::ascending("loyalty_number").unique().sparse(),
        ]
    }
}

/// Reference data: small, rarely changing, usually configured never-evict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub code: String,
    pub name: String,
}

impl Country {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::default(),
            code: code.into(),
            name: name.into(),
        }
    }
}

impl Record for Country {
    fn collection_name() -> &'static str {
        "Country"
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn cache_duration() -> Option<Duration> {
        Some(Duration::from_secs(3600))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for record metadata and sample records.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate an actor that may be absent or nil.
    pub fn arb_actor() -> impl Strategy<Value = Option<ActorId>> {
        prop_oneof![
            Just(None),
            Just(Some(Uuid::nil())),
            arb_uuid().prop_map(Some),
        ]
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    /// Generate metadata with any combination of fields already set.
    pub fn arb_record_meta() -> impl Strategy<Value = RecordMeta> {
        (
            prop_oneof![Just(Uuid::nil()), arb_uuid()],
            arb_actor(),
            proptest::option::of(arb_timestamp()),
            arb_actor(),
            proptest::option::of(arb_timestamp()),
        )
            .prop_map(
                |(id, created_by, created_at, last_modified_by, last_modified_at)| RecordMeta {
                    id,
                    created_by,
                    created_at,
                    last_modified_by,
                    last_modified_at,
                    is_deleted: false,
                },
            )
    }

    pub fn arb_sample_entity() -> impl Strategy<Value = SampleEntity> {
        (arb_record_meta(), "[a-zA-Z0-9 ]{0,24}")
            .prop_map(|(meta, value)| SampleEntity { meta, value })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Ready-made services and records.

    use super::*;
    use std::sync::Arc;

    /// In-memory services plus a handle on their store for inspection.
    pub fn in_memory_services(
        options: CollectionOptions,
    ) -> VellumResult<(PersistenceServices, InMemoryDocumentStore)> {
        let store = InMemoryDocumentStore::new();
        let services =
            PersistenceServices::from_parts(Arc::new(store.clone()), Arc::new(MemoryCache::new()), options)?;
        Ok((services, store))
    }

    /// `count` sample entities with values `Value 0`, `Value 1`, ...
    pub fn sample_entities(count: usize) -> Vec<SampleEntity> {
        (0..count)
            .map(|i| SampleEntity::new(format!("Value {}", i)))
            .collect()
    }

    pub fn countries() -> Vec<Country> {
        vec![
            Country::new("DE", "Germany"),
            Country::new("FR", "France"),
            Country::new("NL", "Netherlands"),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Vellum error shapes.

    use super::*;

    pub fn assert_connection_failed<T: std::fmt::Debug>(result: &VellumResult<T>) {
        assert!(
            matches!(
                result,
                Err(VellumError::Storage(StorageError::ConnectionFailed { .. }))
            ),
            "Expected ConnectionFailed, got {:?}",
            result
        );
    }

    pub fn assert_duplicate_key<T: std::fmt::Debug>(result: &VellumResult<T>, index: &str) {
        match result {
            Err(VellumError::Storage(StorageError::DuplicateKey { index: actual, .. })) => {
                assert_eq!(actual, index, "Duplicate key on unexpected index");
            }
            other => panic!("Expected DuplicateKey on {}, got {:?}", index, other),
        }
    }

    pub fn assert_config_error<T: std::fmt::Debug>(result: &VellumResult<T>) {
        assert!(
            matches!(result, Err(VellumError::Config(_))),
            "Expected Config error, got {:?}",
            result
        );
    }
}
