//! Fuzzy match engine: criteria, candidates and outcome assembly.

use serde::Serialize;

use crate::error::StoreError;
use crate::store::{VendorRecord, VendorStore};

/// Fixed marker pre-populated when no candidate qualifies.
pub const NO_MATCH_SENTINEL: &str = "---";
pub const VENDOR_NOT_FOUND_MESSAGE: &str = "Vendor not found.";

/// Normalized inputs for one matching query, derived once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    /// Tax identifier with whitespace stripped.
    pub tax_id: String,
    pub name: String,
    /// Concatenation of address lines, city and postal code as extracted.
    pub address: String,
}

impl MatchCriteria {
    /// True when no identifying information was supplied at all.
    pub fn is_empty(&self) -> bool {
        self.tax_id.is_empty() && self.name.is_empty() && self.address.is_empty()
    }
}

/// A possible vendor match offered to the end user. The exported `value` is
/// the record's tax id; the label is what gets displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorCandidate {
    pub value: String,
    pub label: String,
}

impl VendorCandidate {
    pub fn sentinel() -> Self {
        Self {
            value: NO_MATCH_SENTINEL.to_string(),
            label: NO_MATCH_SENTINEL.to_string(),
        }
    }
}

impl From<&VendorRecord> for VendorCandidate {
    fn from(record: &VendorRecord) -> Self {
        let label = format!(
            "{}, {}, {} ({})",
            record.name,
            record.address1.as_deref().unwrap_or_default(),
            record.city.as_deref().unwrap_or_default(),
            record.id,
        );
        Self {
            value: record.tax_id.clone().unwrap_or_default(),
            label,
        }
    }
}

/// Result of one matching query. `options` is never empty: a no-match carries
/// exactly one sentinel entry plus the user-visible error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub selected_value: String,
    pub options: Vec<VendorCandidate>,
    pub error_message: Option<String>,
}

impl MatchOutcome {
    fn no_match() -> Self {
        Self {
            selected_value: NO_MATCH_SENTINEL.to_string(),
            options: vec![VendorCandidate::sentinel()],
            error_message: Some(VENDOR_NOT_FOUND_MESSAGE.to_string()),
        }
    }
}

/// Runs the conjunctive fuzzy query and shapes the outcome.
pub struct MatchEngine<S> {
    store: S,
}

impl<S: VendorStore> MatchEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn match_vendor(&self, criteria: &MatchCriteria) -> Result<MatchOutcome, StoreError> {
        let records = self.store.find_vendors(criteria).await?;
        // With every clause vacuously true an all-empty query matches every
        // row; that is never reported as a match.
        if records.is_empty() || criteria.is_empty() {
            return Ok(MatchOutcome::no_match());
        }
        let options: Vec<VendorCandidate> = records.iter().map(VendorCandidate::from).collect();
        Ok(MatchOutcome {
            selected_value: options[0].value.clone(),
            options,
            error_message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn bernhard() -> VendorRecord {
        VendorRecord {
            id: "2416".to_string(),
            name: "Bernhard Group".to_string(),
            address1: Some("Brandenburgische Strasse 55".to_string()),
            city: Some("Knittelsheim".to_string()),
            tax_id: Some("DE757038244".to_string()),
        }
    }

    struct FixedStore(Vec<VendorRecord>);

    #[async_trait]
    impl VendorStore for FixedStore {
        async fn find_vendors(
            &self,
            _criteria: &MatchCriteria,
        ) -> Result<Vec<VendorRecord>, StoreError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn label_concatenates_name_address_city_and_id() {
        let candidate = VendorCandidate::from(&bernhard());
        assert_eq!(
            candidate.label,
            "Bernhard Group, Brandenburgische Strasse 55, Knittelsheim (2416)"
        );
        assert_eq!(candidate.value, "DE757038244");
    }

    #[test]
    fn null_columns_render_as_empty() {
        let record = VendorRecord {
            id: "9".to_string(),
            name: "Acme".to_string(),
            address1: None,
            city: None,
            tax_id: None,
        };
        let candidate = VendorCandidate::from(&record);
        assert_eq!(candidate.label, "Acme, ,  (9)");
        assert_eq!(candidate.value, "");
    }

    #[tokio::test]
    async fn first_candidate_is_selected() {
        let engine = MatchEngine::new(FixedStore(vec![bernhard()]));
        let outcome = engine
            .match_vendor(&MatchCriteria {
                name: "Bernhard".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.selected_value, "DE757038244");
        assert_eq!(outcome.options.len(), 1);
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn empty_criteria_yield_sentinel_even_when_rows_come_back() {
        // An all-empty query passes every vacuous clause and the store
        // returns the whole table; the engine must still report no match.
        let engine = MatchEngine::new(FixedStore(vec![bernhard()]));
        let outcome = engine.match_vendor(&MatchCriteria::default()).await.unwrap();

        assert_eq!(outcome.selected_value, NO_MATCH_SENTINEL);
        assert_eq!(outcome.options, vec![VendorCandidate::sentinel()]);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some(VENDOR_NOT_FOUND_MESSAGE)
        );
    }

    #[tokio::test]
    async fn zero_rows_yield_sentinel() {
        let engine = MatchEngine::new(FixedStore(Vec::new()));
        let outcome = engine
            .match_vendor(&MatchCriteria {
                name: "NotExist".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.selected_value, NO_MATCH_SENTINEL);
        assert_eq!(outcome.options.len(), 1);
        assert!(outcome.error_message.is_some());
    }
}
