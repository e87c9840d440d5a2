//! Pricing module.
//!
//! Holds the per-model rate table and the cost calculator built on it.
//! Rates are approximate list prices and can be overridden per entry at startup.

mod cost;
mod table;

pub use cost::{compute_cost, round_usd, CostBreakdown};
pub use table::{
    override_env_var_name, trailing_segment, PricingEntry, PricingError, PricingTable, RateKind,
    PRICE_OVERRIDE_PREFIX,
};
