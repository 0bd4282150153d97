//! # Record Types
//!
//! The five record kinds kept in the document store.
//!
//! ## Identity Schemes
//! ```text
//! ┌──────────┬──────────────────────────────┬──────────────────────────────┐
//! │ Record   │ Document id                  │ Ordering                     │
//! ├──────────┼──────────────────────────────┼──────────────────────────────┤
//! │ Sale     │ random UUID (sale_id)        │ date DESC (paginated)        │
//! │ Village  │ trimmed name                 │ name, case-insensitive       │
//! │ Pricing  │ "{tea_type}_{package}"       │ pricing key, case-insensitive│
//! │ Customer │ sanitized "{village}_{name}" │ name, case-insensitive       │
//! │ Note     │ random UUID (note_id)        │ updated_at DESC (paginated)  │
//! └──────────┴──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! All timestamps are stored as epoch milliseconds so the document store can
//! range-filter and order them numerically.

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::identity;
use crate::money::Money;

/// Stand-in for audit timestamps that older documents were written without.
fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

// =============================================================================
// Payment Status
// =============================================================================

/// Whether a sale still has money owing.
///
/// Always derived from the balance: `Paid` when `balance <= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentStatus {
    Paid,
    #[default]
    Pending,
}

impl PaymentStatus {
    pub fn from_balance(balance: Money) -> Self {
        if balance.paise() <= 0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Pending => "Pending",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded tea sale.
///
/// ## Derived Fields
/// ```text
/// total_amount ──┐
///                ├──► balance = total_amount − amount_paid
/// amount_paid ───┘        │
///                         ▼
///              payment_status = Paid if balance ≤ 0 else Pending
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    #[serde(rename = "sale_id", default)]
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub date: DateTime<Utc>,
    /// Weekday name of `date`, e.g. "Monday".
    #[serde(default)]
    pub day: String,
    pub village: String,
    pub customer_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub tea_type: String,
    #[serde(default)]
    pub packaging: String,
    pub rate: Money,
    pub quantity: f64,
    pub total_amount: Money,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub amount_paid: Money,
    #[serde(default)]
    pub balance: Money,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub updated_at: DateTime<Utc>,
}

/// Input for recording a new sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub date: DateTime<Utc>,
    pub village: String,
    pub customer_name: String,
    pub brand: String,
    pub tea_type: String,
    pub packaging: String,
    pub rate: Money,
    pub quantity: f64,
    /// Overrides `rate × quantity` when the seller typed a total by hand.
    pub total_amount: Option<Money>,
    /// `None` means paid in full; `Some(x)` means `x` was paid up front.
    pub amount_paid: Option<Money>,
}

impl Sale {
    /// Builds a sale with a fresh id and every derived field filled in.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use goldtea_core::{Money, NewSale, PaymentStatus, Sale};
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
    /// let sale = Sale::from_new(
    ///     NewSale {
    ///         date: now,
    ///         village: "Rampur".into(),
    ///         customer_name: "Asha".into(),
    ///         brand: "GoldTea".into(),
    ///         tea_type: "Mix".into(),
    ///         packaging: "250gm".into(),
    ///         rate: Money::from_rupees(120),
    ///         quantity: 2.0,
    ///         total_amount: None,
    ///         amount_paid: Some(Money::from_rupees(100)),
    ///     },
    ///     now,
    /// );
    /// assert_eq!(sale.day, "Monday");
    /// assert_eq!(sale.balance, Money::from_rupees(140));
    /// assert_eq!(sale.payment_status, PaymentStatus::Pending);
    /// ```
    pub fn from_new(input: NewSale, now: DateTime<Utc>) -> Self {
        let total = input
            .total_amount
            .unwrap_or_else(|| input.rate.multiply_quantity(input.quantity));
        let paid = input.amount_paid.unwrap_or(total);
        let balance = total - paid;

        Sale {
            id: Uuid::new_v4().to_string(),
            day: weekday_name(input.date.weekday()).to_string(),
            date: input.date,
            village: input.village.trim().to_string(),
            customer_name: input.customer_name.trim().to_string(),
            brand: input.brand,
            tea_type: input.tea_type,
            packaging: input.packaging,
            rate: input.rate,
            quantity: input.quantity,
            total_amount: total,
            payment_status: PaymentStatus::from_balance(balance),
            amount_paid: paid,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records a further payment against the outstanding balance.
    ///
    /// The amount must be positive and no larger than the current balance.
    pub fn apply_payment(&mut self, amount: Money, now: DateTime<Utc>) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "amount must be positive".to_string(),
            });
        }
        if amount > self.balance {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("{} exceeds outstanding balance {}", amount, self.balance),
            });
        }

        self.amount_paid += amount;
        self.recompute_balance();
        self.touch(now);
        Ok(())
    }

    /// Re-derives `balance` and `payment_status` from total and paid.
    pub fn recompute_balance(&mut self) {
        self.balance = self.total_amount - self.amount_paid;
        self.payment_status = PaymentStatus::from_balance(self.balance);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Key used to group a sale under one customer in reports.
    pub fn customer_key(&self) -> String {
        format!("{}|{}", self.customer_name, self.village)
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

// =============================================================================
// Village
// =============================================================================

/// A village on the sales route, visited on a fixed market day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Village {
    pub name: String,
    #[serde(default)]
    pub day: String,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub added_on: DateTime<Utc>,
}

impl Village {
    pub fn new(name: &str, day: &str, now: DateTime<Utc>) -> Self {
        Village {
            name: name.trim().to_string(),
            day: day.trim().to_string(),
            added_on: now,
        }
    }

    pub fn canonical_id(&self) -> String {
        identity::village_id(&self.name)
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// The rate for one tea type in one package size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Pricing {
    /// Package size, e.g. "100gm" or "1kg".
    pub package: String,
    #[serde(default)]
    pub tea_type: String,
    pub rate: Money,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub updated_on: DateTime<Utc>,
}

impl Pricing {
    pub fn new(tea_type: &str, package: &str, rate: Money, now: DateTime<Utc>) -> Self {
        Pricing {
            package: package.trim().to_string(),
            tea_type: tea_type.trim().to_string(),
            rate,
            updated_on: now,
        }
    }

    /// The composite key this record is stored under, e.g. "Mix_100gm".
    pub fn pricing_key(&self) -> String {
        identity::pricing_key(&self.tea_type, &self.package)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer known for autocomplete, created as a side effect of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub village: String,
    pub customer_name: String,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub added_on: DateTime<Utc>,
}

impl Customer {
    pub fn new(village: &str, customer_name: &str, now: DateTime<Utc>) -> Self {
        Customer {
            village: village.trim().to_string(),
            customer_name: customer_name.trim().to_string(),
            added_on: now,
        }
    }

    pub fn canonical_id(&self) -> String {
        identity::customer_id(&self.village, &self.customer_name)
    }
}

// =============================================================================
// Note
// =============================================================================

/// A free-form note, listed by most recent edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Note {
    #[serde(rename = "note_id", default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "epoch", with = "chrono::serde::ts_milliseconds")]
    #[ts(type = "number")]
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: &str, content: &str, now: DateTime<Utc>) -> Self {
        Note {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 30, 0).unwrap()
    }

    fn new_sale(amount_paid: Option<Money>) -> NewSale {
        NewSale {
            date: at(5),
            village: " Rampur ".to_string(),
            customer_name: "Asha".to_string(),
            brand: "GoldTea".to_string(),
            tea_type: "Barik".to_string(),
            packaging: "500gm".to_string(),
            rate: Money::from_rupees(200),
            quantity: 1.5,
            total_amount: None,
            amount_paid,
        }
    }

    #[test]
    fn test_from_new_paid_in_full() {
        let sale = Sale::from_new(new_sale(None), at(5));
        assert!(!sale.id.is_empty());
        assert_eq!(sale.day, "Tuesday");
        assert_eq!(sale.village, "Rampur");
        assert_eq!(sale.total_amount, Money::from_rupees(300));
        assert_eq!(sale.amount_paid, sale.total_amount);
        assert!(sale.balance.is_zero());
        assert_eq!(sale.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_from_new_partial_payment() {
        let sale = Sale::from_new(new_sale(Some(Money::from_rupees(50))), at(5));
        assert_eq!(sale.balance, Money::from_rupees(250));
        assert_eq!(sale.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_explicit_total_wins() {
        let mut input = new_sale(None);
        input.total_amount = Some(Money::from_rupees(280));
        let sale = Sale::from_new(input, at(5));
        assert_eq!(sale.total_amount, Money::from_rupees(280));
    }

    #[test]
    fn test_apply_payment_settles_sale() {
        let mut sale = Sale::from_new(new_sale(Some(Money::from_rupees(100))), at(5));
        sale.apply_payment(Money::from_rupees(150), at(6)).unwrap();
        assert_eq!(sale.balance, Money::from_rupees(50));
        assert_eq!(sale.payment_status, PaymentStatus::Pending);

        sale.apply_payment(Money::from_rupees(50), at(7)).unwrap();
        assert!(sale.balance.is_zero());
        assert_eq!(sale.payment_status, PaymentStatus::Paid);
        assert_eq!(sale.updated_at, at(7));
    }

    #[test]
    fn test_apply_payment_rejects_overpayment_and_zero() {
        let mut sale = Sale::from_new(new_sale(Some(Money::zero())), at(5));
        assert!(sale.apply_payment(Money::zero(), at(6)).is_err());
        assert!(sale.apply_payment(Money::from_rupees(301), at(6)).is_err());
        assert_eq!(sale.amount_paid, Money::zero());
    }

    #[test]
    fn test_sale_document_field_names() {
        let sale = Sale::from_new(new_sale(None), at(5));
        let json = serde_json::to_value(&sale).unwrap();
        assert_eq!(json["sale_id"], serde_json::json!(sale.id));
        assert_eq!(json["payment_status"], "Paid");
        assert_eq!(json["date"], serde_json::json!(at(5).timestamp_millis()));
    }

    #[test]
    fn test_canonical_ids() {
        let village = Village::new("  Rampur ", "Monday", at(1));
        assert_eq!(village.canonical_id(), "Rampur");

        let pricing = Pricing::new("", "100gm", Money::from_rupees(40), at(1));
        assert_eq!(pricing.pricing_key(), "Mix_100gm");

        let customer = Customer::new("Rampur", "Asha Devi", at(1));
        assert_eq!(customer.canonical_id(), "Rampur_Asha_Devi");
    }

    #[test]
    fn test_missing_audit_timestamps_default_to_epoch() {
        let village: Village =
            serde_json::from_value(serde_json::json!({ "name": "Rampur", "day": "Monday" })).unwrap();
        assert_eq!(village.name, "Rampur");
        assert_eq!(village.added_on, DateTime::<Utc>::UNIX_EPOCH);

        let note: Note = serde_json::from_value(serde_json::json!({ "title": "Stock" })).unwrap();
        assert_eq!(note.updated_at, DateTime::<Utc>::UNIX_EPOCH);

        // A present but unreadable timestamp is still rejected
        let bad = serde_json::from_value::<Village>(serde_json::json!({
            "name": "Kheri",
            "added_on": "yesterday"
        }));
        assert!(bad.is_err());
    }
}
