//! Canonical mapping from aggregator category codes to display categories.
//!
//! The source tags transactions with a large, uncontrolled enumeration
//! (`FOOD_AND_DRINK`, `PUBLIC_TRANSPORTATION`, ...). Everything user-facing
//! works in terms of a small stable set of display categories instead. The
//! table below is configuration, not logic: new source codes get a new match
//! arm and no call site changes.

/// Display category used when the source supplies no category at all.
pub const FALLBACK_CATEGORY: &str = "other";

/// Map a raw aggregator category code to a display category.
///
/// Total and deterministic: unknown codes fall back to the code itself,
/// lowercased with underscores turned into spaces, and `None` maps to
/// [`FALLBACK_CATEGORY`]. Never returns an empty string.
pub fn normalize(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return FALLBACK_CATEGORY.to_string();
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return FALLBACK_CATEGORY.to_string();
    }

    match raw {
        "FOOD_AND_DRINK" | "RESTAURANTS" | "FAST_FOOD" => "dining",
        "GROCERIES" => "groceries",
        "TRANSPORTATION" | "PUBLIC_TRANSPORTATION" | "TAXI" | "GAS" => "transportation",
        "TRAVEL" | "LODGING" => "travel",
        "ENTERTAINMENT" | "RECREATION" => "entertainment",
        "SHOPPING" | "GENERAL_MERCHANDISE" | "CLOTHING" => "clothing",
        "PERSONAL_CARE" => "personal",
        "HEALTH_AND_MEDICAL" | "MEDICAL" | "PHARMACY" => "health",
        "SUBSCRIPTION" | "SOFTWARE" => "subscriptions",
        "UTILITIES" => "utilities",
        "RENT" | "MORTGAGE" | "HOME_IMPROVEMENT" => "housing",
        "BANK_FEES" | "ATM_FEE" => "fees",
        "TRANSFER" => "transfer",
        "DEPOSIT" | "PAYROLL" | "INTEREST_EARNED" => "income",
        other => return other.to_lowercase().replace('_', " "),
    }
    .to_string()
}
