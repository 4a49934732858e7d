//! Vendor reference store.
//!
//! `VendorStore` is the seam the match engine and the webhook handler see;
//! `PgVendorStore` is the production implementation: one conjunctive trigram
//! query through the resilient executor.

pub mod executor;

use async_trait::async_trait;
use futures::FutureExt;

use crate::error::StoreError;
use crate::matching::MatchCriteria;

use self::executor::{PgBackend, ResilientExecutor, Sleeper, TokioSleeper};

/// One reference-dataset row reduced to what matching needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct VendorRecord {
    pub id: String,
    pub name: String,
    pub address1: Option<String>,
    pub city: Option<String>,
    #[sqlx(rename = "taxid1")]
    pub tax_id: Option<String>,
}

#[async_trait]
pub trait VendorStore: Send + Sync {
    /// All rows satisfying the conjunction of the supplied criteria, in
    /// store-returned order. Empty criteria fields bypass their clause.
    async fn find_vendors(&self, criteria: &MatchCriteria)
        -> Result<Vec<VendorRecord>, StoreError>;
}

/// Each clause is vacuously true when its input is the empty string, so
/// supplying more fields narrows the result set monotonically. The similarity
/// cutoff is bound as a parameter rather than relying on the server-side
/// pg_trgm default.
const FIND_VENDORS_SQL: &str = r#"
SELECT id, name, address1, city, taxid1 FROM vendor_data
    WHERE ($1 = '' OR (taxid1 IS NULL OR taxid1 = $1))
        AND ($2 = '' OR similarity(UPPER(name), UPPER($2)) >= $4)
        AND ($3 = '' OR similarity(UPPER(CONCAT(address1, ' ', address2, ' ', address3, ' ', city, ' ', zipcode)), UPPER($3)) >= $4)
"#;

pub struct PgVendorStore<S: Sleeper = TokioSleeper> {
    executor: ResilientExecutor<PgBackend, S>,
    similarity_threshold: f32,
}

impl<S: Sleeper> PgVendorStore<S> {
    pub fn new(executor: ResilientExecutor<PgBackend, S>, similarity_threshold: f32) -> Self {
        Self {
            executor,
            similarity_threshold,
        }
    }
}

#[async_trait]
impl<S: Sleeper> VendorStore for PgVendorStore<S> {
    async fn find_vendors(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<Vec<VendorRecord>, StoreError> {
        let threshold = self.similarity_threshold;
        self.executor
            .run(move |conn| {
                let criteria = criteria.clone();
                async move {
                    sqlx::query_as::<_, VendorRecord>(FIND_VENDORS_SQL)
                        .bind(criteria.tax_id)
                        .bind(criteria.name)
                        .bind(criteria.address)
                        .bind(threshold)
                        .fetch_all(&mut *conn)
                        .await
                }
                .boxed()
            })
            .await
    }
}
