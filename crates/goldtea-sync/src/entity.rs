//! # Entity Bindings
//!
//! Ties each domain record to its collection and describes how the caches
//! and the coordinator treat it.
//!
//! ```text
//! ┌──────────┬───────────────┬──────────────────────────┬─────────────────────┐
//! │ Record   │ Document id   │ Logical key (dedup)      │ Listing order       │
//! ├──────────┼───────────────┼──────────────────────────┼─────────────────────┤
//! │ Village  │ trimmed name  │ name                     │ name, no case       │
//! │ Pricing  │ Mix_100gm     │ tea_type + package       │ key, no case        │
//! │ Customer │ Rampur_Asha   │ village + customer_name  │ customer_name       │
//! │ Sale     │ random uuid   │ none                     │ date, newest first  │
//! │ Note     │ random uuid   │ none                     │ updated, newest     │
//! └──────────┴───────────────┴──────────────────────────┴─────────────────────┘
//! ```
//!
//! Records with a logical key always write to the canonical id derived from
//! it. Documents sharing the key under any other id are legacy duplicates:
//! listings drop them, and the coordinator deletes them after a successful
//! canonical write.

use serde::de::DeserializeOwned;
use serde::Serialize;

use goldtea_core::identity;
use goldtea_core::{Collection, Customer, Filter, Note, OrderBy, Pricing, Sale, Village};

/// A record stored as one document in one collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    /// Id the record is written under.
    fn document_id(&self) -> String;

    /// Adopts the id of the document the record was read from.
    fn with_document_id(self, _id: &str) -> Self {
        self
    }
}

/// Records whose id derives from a logical key.
pub trait CanonicalEntity: Entity {
    /// The logical key; equal to the canonical document id.
    fn logical_key(&self) -> String;

    /// Filters selecting every stored document that shares the logical key.
    fn reconcile_filters(&self) -> Vec<Filter>;

    /// Case-insensitive listing sort key.
    fn sort_key(&self) -> String;

    /// Field the full listing is requested in order of.
    fn listing_order() -> OrderBy;
}

/// Records listed newest first through a cursor.
pub trait TimelineEntity: Entity {
    fn timeline_order() -> OrderBy;
}

// =============================================================================
// Village
// =============================================================================

impl Entity for Village {
    const COLLECTION: Collection = Collection::Villages;

    fn document_id(&self) -> String {
        self.canonical_id()
    }
}

impl CanonicalEntity for Village {
    fn logical_key(&self) -> String {
        identity::village_id(&self.name)
    }

    fn reconcile_filters(&self) -> Vec<Filter> {
        vec![Filter::eq("name", self.name.as_str())]
    }

    fn sort_key(&self) -> String {
        self.name.to_lowercase()
    }

    fn listing_order() -> OrderBy {
        OrderBy::asc("name")
    }
}

// =============================================================================
// Pricing
// =============================================================================

impl Entity for Pricing {
    const COLLECTION: Collection = Collection::Pricing;

    fn document_id(&self) -> String {
        self.pricing_key()
    }
}

impl CanonicalEntity for Pricing {
    fn logical_key(&self) -> String {
        self.pricing_key()
    }

    fn reconcile_filters(&self) -> Vec<Filter> {
        vec![
            Filter::eq("tea_type", self.tea_type.as_str()),
            Filter::eq("package", self.package.as_str()),
        ]
    }

    fn sort_key(&self) -> String {
        self.pricing_key().to_lowercase()
    }

    fn listing_order() -> OrderBy {
        OrderBy::asc("package")
    }
}

// =============================================================================
// Customer
// =============================================================================

impl Entity for Customer {
    const COLLECTION: Collection = Collection::Customers;

    fn document_id(&self) -> String {
        self.canonical_id()
    }
}

impl CanonicalEntity for Customer {
    fn logical_key(&self) -> String {
        self.canonical_id()
    }

    fn reconcile_filters(&self) -> Vec<Filter> {
        vec![
            Filter::eq("village", self.village.as_str()),
            Filter::eq("customer_name", self.customer_name.as_str()),
        ]
    }

    fn sort_key(&self) -> String {
        self.customer_name.to_lowercase()
    }

    fn listing_order() -> OrderBy {
        OrderBy::asc("customer_name")
    }
}

// =============================================================================
// Sale
// =============================================================================

impl Entity for Sale {
    const COLLECTION: Collection = Collection::Sales;

    fn document_id(&self) -> String {
        self.id.clone()
    }

    fn with_document_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }
}

impl TimelineEntity for Sale {
    fn timeline_order() -> OrderBy {
        OrderBy::desc("date")
    }
}

// =============================================================================
// Note
// =============================================================================

impl Entity for Note {
    const COLLECTION: Collection = Collection::Notes;

    fn document_id(&self) -> String {
        self.id.clone()
    }

    fn with_document_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }
}

impl TimelineEntity for Note {
    fn timeline_order() -> OrderBy {
        OrderBy::desc("updated_at")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use goldtea_core::Money;

    #[test]
    fn test_canonical_ids() {
        let now = Utc::now();
        assert_eq!(Village::new("  Rampur ", "Monday", now).document_id(), "Rampur");
        assert_eq!(
            Pricing::new("Mix", "100gm", Money::from_rupees(40), now).document_id(),
            "Mix_100gm"
        );
        assert_eq!(
            Customer::new("Rampur", "Asha Devi", now).document_id(),
            "Rampur_Asha_Devi"
        );
    }

    #[test]
    fn test_document_id_is_adopted_on_read() {
        let note = Note::new("t", "c", Utc::now()).with_document_id("from-store");
        assert_eq!(note.id, "from-store");
        assert_eq!(Note::COLLECTION, Collection::Notes);
    }

    #[test]
    fn test_reconcile_filters_match_legacy_body() {
        let pricing = Pricing::new("Mix", "100gm", Money::from_rupees(40), Utc::now());
        let legacy = serde_json::json!({ "tea_type": "Mix", "package": "100gm", "rate": 3500 });
        assert!(pricing.reconcile_filters().iter().all(|f| f.matches(&legacy)));
    }
}
