//! Versioned schema snapshots
//!
//! The published model is an immutable `Arc<SchemaSnapshot>`. Readers clone
//! the `Arc` once per request and keep that snapshot for the whole request;
//! a rebuild replaces the pointer in a single write.

use super::{SchemaBuilder, SchemaModel, SchemaSource};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct SchemaSnapshot {
    pub version: u64,
    pub built_at: DateTime<Utc>,
    pub model: SchemaModel,
}

pub struct SchemaRegistry {
    current: RwLock<Arc<SchemaSnapshot>>,
    /// Serialises rebuilders; readers never take it
    rebuild_lock: Mutex<()>,
    next_version: AtomicU64,
}

impl SchemaRegistry {
    pub fn new(model: SchemaModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(SchemaSnapshot {
                version: 1,
                built_at: Utc::now(),
                model,
            })),
            rebuild_lock: Mutex::new(()),
            next_version: AtomicU64::new(2),
        }
    }

    /// Introspect `source` and publish the result as the first snapshot.
    pub fn from_source(builder: &SchemaBuilder, source: &dyn SchemaSource) -> Result<Self> {
        Ok(Self::new(builder.build(source)?))
    }

    /// The snapshot published at the time of the call
    pub fn current(&self) -> Arc<SchemaSnapshot> {
        // A poisoned lock still guards a fully-formed Arc
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Publish an already-built model.
    pub fn publish(&self, model: SchemaModel) -> Arc<SchemaSnapshot> {
        let _rebuild = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.swap(model)
    }

    /// Rebuild from `source` and swap the new snapshot in. On failure the
    /// previous snapshot stays published.
    pub fn rebuild(&self, builder: &SchemaBuilder, source: &dyn SchemaSource) -> Result<Arc<SchemaSnapshot>> {
        let _rebuild = self.rebuild_lock.lock().unwrap_or_else(|e| e.into_inner());
        let model = builder.build(source)?;
        Ok(self.swap(model))
    }

    fn swap(&self, model: SchemaModel) -> Arc<SchemaSnapshot> {
        let snapshot = Arc::new(SchemaSnapshot {
            version: self.next_version.fetch_add(1, Ordering::SeqCst),
            built_at: Utc::now(),
            model,
        });
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::clone(&snapshot);
        drop(guard);
        info!(
            "Published schema snapshot v{} ({} tables)",
            snapshot.version,
            snapshot.model.table_count()
        );
        snapshot
    }
}
