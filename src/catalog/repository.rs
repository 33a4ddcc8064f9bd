//! Repository seam between the metadata sink and the database.
//!
//! The sink depends on this trait rather than on [`GazetteCatalog`] so tests
//! can inject failing or recording implementations.

use async_trait::async_trait;

use super::{CatalogError, GazetteCatalog, NewGazette};

/// Data-access contract for persisting gazette rows.
#[async_trait]
pub trait GazetteRepository: Send + Sync {
    /// Persists one row in its own transaction, returning its id.
    async fn insert_gazette(&self, gazette: &NewGazette) -> Result<i64, CatalogError>;
}

#[async_trait]
impl GazetteRepository for GazetteCatalog {
    async fn insert_gazette(&self, gazette: &NewGazette) -> Result<i64, CatalogError> {
        GazetteCatalog::insert_gazette(self, gazette).await
    }
}
