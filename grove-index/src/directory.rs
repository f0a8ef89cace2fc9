//! Canonical location registry.

use std::sync::Arc;

use grove_core::{
    EntityType, GroveError, GroveResult, Location, LocationRecord, StorageError, WildcardPath,
    MAX_DEPTH,
};
use grove_storage::GroveStore;

/// Get-or-create registry of [`LocationRecord`]s.
#[derive(Clone)]
pub struct LocationDirectory {
    store: Arc<dyn GroveStore>,
}

impl LocationDirectory {
    pub fn new(store: Arc<dyn GroveStore>) -> Self {
        Self { store }
    }

    /// Idempotent get-or-create for a dotted path.
    pub async fn declare(&self, path: &str) -> GroveResult<LocationRecord> {
        let location = Location::parse(path)?;
        self.declare_location(&location).await
    }

    /// Get-or-create from a full label tuple. Stray gaps are rejected.
    pub async fn declare_labels(
        &self,
        labels: [Option<String>; MAX_DEPTH],
    ) -> GroveResult<LocationRecord> {
        let location = Location::from_labels(labels)?;
        self.declare_location(&location).await
    }

    /// Get-or-create for an already parsed location.
    ///
    /// Two callers racing on the same path both get the winner's row.
    pub async fn declare_location(&self, location: &Location) -> GroveResult<LocationRecord> {
        if let Some(record) = self.store.location_find(location).await? {
            return Ok(record);
        }
        match self.store.location_insert(location).await {
            Ok(record) => {
                tracing::debug!(path = %location, id = %record.id, "location declared");
                Ok(record)
            }
            Err(GroveError::Storage(StorageError::UniqueViolation { .. })) => self
                .store
                .location_find(location)
                .await?
                .ok_or_else(|| GroveError::not_found(EntityType::Location, location.path())),
            Err(e) => Err(e),
        }
    }

    pub async fn find(&self, path: &str) -> GroveResult<Option<LocationRecord>> {
        let location = Location::parse(path)?;
        self.store.location_find(&location).await
    }

    /// Compile a pattern into the constraint set readers push down to the
    /// store. Does not scan anything.
    pub fn by_path(&self, pattern: &str) -> GroveResult<WildcardPath> {
        Ok(WildcardPath::compile(pattern)?)
    }
}
