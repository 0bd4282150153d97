//! # Canonical Identity
//!
//! Villages, pricing entries and customers are stored under an id derived
//! from their logical key. Writing to that id is idempotent, and any other
//! document carrying the same key is a legacy duplicate to be reconciled away.
//!
//! ```text
//!   Village  { name: " Rampur " }              ──► "Rampur"
//!   Pricing  { tea_type: "", package: "100gm" } ──► "Mix_100gm"
//!   Customer { village: "Rampur",
//!              customer_name: "Asha Devi" }     ──► "Rampur_Asha_Devi"
//! ```

use crate::DEFAULT_TEA_TYPE;

/// Canonical id of a village: its trimmed name.
pub fn village_id(name: &str) -> String {
    name.trim().to_string()
}

/// Canonical id of a pricing entry: `{tea_type}_{package}`.
///
/// An empty tea type is treated as [`DEFAULT_TEA_TYPE`].
pub fn pricing_key(tea_type: &str, package: &str) -> String {
    let tea_type = tea_type.trim();
    let tea_type = if tea_type.is_empty() {
        DEFAULT_TEA_TYPE
    } else {
        tea_type
    };
    format!("{}_{}", tea_type, package.trim())
}

/// Canonical id of a customer: `{village}_{name}` with every character
/// outside `[A-Za-z0-9_]` replaced by `_`.
pub fn customer_id(village: &str, customer_name: &str) -> String {
    format!("{}_{}", village.trim(), customer_name.trim())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_village_id_trims() {
        assert_eq!(village_id("\tSonpur  "), "Sonpur");
    }

    #[test]
    fn test_pricing_key_defaults_tea_type() {
        assert_eq!(pricing_key("Barik", "1kg"), "Barik_1kg");
        assert_eq!(pricing_key("  ", "100gm"), "Mix_100gm");
    }

    #[test]
    fn test_customer_id_sanitizes() {
        assert_eq!(customer_id("Rampur", "Asha Devi"), "Rampur_Asha_Devi");
        assert_eq!(customer_id("Nava-Gaon", "R.K. Shah"), "Nava_Gaon_R_K__Shah");
        assert_eq!(customer_id("गाँव", "A"), "_____A");
    }
}
