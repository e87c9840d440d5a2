//! Cost estimation from token usage.

use serde::{Deserialize, Serialize};

use super::table::{PricingEntry, PricingTable};

/// Estimated cost of one call in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
    /// The rates the estimate was computed with.
    pub pricing_rate: PricingEntry,
}

impl CostBreakdown {
    /// Zero cost at a zero rate, used for failed calls.
    pub fn zero() -> Self {
        Self {
            input_cost_usd: 0.0,
            output_cost_usd: 0.0,
            total_cost_usd: 0.0,
            pricing_rate: PricingEntry::zero(),
        }
    }
}

/// Round to 6 decimal places.
pub fn round_usd(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Compute the cost of a call from its token counts.
///
/// Token counts are used as given; negative values are not rejected. The
/// total is computed from the unrounded parts and then rounded itself.
pub fn compute_cost(
    table: &PricingTable,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
) -> CostBreakdown {
    let rate = *table.lookup(model);
    let input_cost = prompt_tokens as f64 / 1000.0 * rate.input;
    let output_cost = completion_tokens as f64 / 1000.0 * rate.output;

    CostBreakdown {
        input_cost_usd: round_usd(input_cost),
        output_cost_usd: round_usd(output_cost),
        total_cost_usd: round_usd(input_cost + output_cost),
        pricing_rate: rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_six_decimals(value: f64) -> bool {
        let scaled = value * 1_000_000.0;
        (scaled - scaled.round()).abs() < 1e-6
    }

    #[test]
    fn test_known_model_cost() {
        let table = PricingTable::builtin().unwrap();
        let cost = compute_cost(&table, "openai/gpt-4", 1000, 2000);
        assert_eq!(cost.input_cost_usd, 0.03);
        assert_eq!(cost.output_cost_usd, 0.12);
        assert_eq!(cost.total_cost_usd, 0.15);
        assert_eq!(cost.pricing_rate, PricingEntry::new(0.03, 0.06));
    }

    #[test]
    fn test_unknown_model_uses_default_rate() {
        let table = PricingTable::builtin().unwrap();
        let cost = compute_cost(&table, "gpt4o", 10, 5);
        assert_eq!(cost.pricing_rate, *table.default_entry());
        assert_eq!(
            cost.total_cost_usd,
            round_usd(10.0 / 1000.0 * 0.00015 + 5.0 / 1000.0 * 0.0006)
        );
    }

    #[test]
    fn test_rounding_and_total() {
        let table = PricingTable::builtin().unwrap();
        for (model, prompt, completion) in [
            ("openai/gpt-4o", 1234, 567),
            ("anthropic/claude-3-haiku", 7, 3),
            ("google/gemini-flash-1.5", 99_999, 12_345),
            ("meta-llama/llama-3.1-70b-instruct", 1, 1),
        ] {
            let cost = compute_cost(&table, model, prompt, completion);
            assert!(is_six_decimals(cost.input_cost_usd), "{:?}", cost);
            assert!(is_six_decimals(cost.output_cost_usd), "{:?}", cost);
            assert!(is_six_decimals(cost.total_cost_usd), "{:?}", cost);
            assert!(
                (cost.total_cost_usd - (cost.input_cost_usd + cost.output_cost_usd)).abs()
                    <= 1e-6 + f64::EPSILON,
                "{:?}",
                cost
            );
        }
    }

    #[test]
    fn test_zero_tokens() {
        let table = PricingTable::builtin().unwrap();
        let cost = compute_cost(&table, "openai/gpt-4o", 0, 0);
        assert_eq!(cost.total_cost_usd, 0.0);
        assert_eq!(cost.pricing_rate, PricingEntry::new(0.0025, 0.01));
    }

    #[test]
    fn test_negative_tokens_pass_through() {
        let table = PricingTable::builtin().unwrap();
        let cost = compute_cost(&table, "openai/gpt-4", -1000, 0);
        assert_eq!(cost.input_cost_usd, -0.03);
        assert_eq!(cost.total_cost_usd, -0.03);
    }

    #[test]
    fn test_zero_breakdown() {
        let cost = CostBreakdown::zero();
        assert_eq!(cost.total_cost_usd, 0.0);
        assert_eq!(cost.pricing_rate, PricingEntry::zero());
    }

    #[test]
    fn test_serialized_field_names() {
        let table = PricingTable::builtin().unwrap();
        let json = serde_json::to_value(compute_cost(&table, "openai/gpt-4", 1000, 0)).unwrap();
        assert_eq!(json["input_cost_usd"], 0.03);
        assert_eq!(json["output_cost_usd"], 0.0);
        assert_eq!(json["total_cost_usd"], 0.03);
        assert_eq!(json["pricing_rate"]["input"], 0.03);
        assert_eq!(json["pricing_rate"]["output"], 0.06);
    }
}
