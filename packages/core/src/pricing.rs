// ABOUTME: Per-token model pricing and cost computation in integer cents
// ABOUTME: Costs round up to the next whole cent so the ledger never under-charges

use serde::{Deserialize, Serialize};

/// Token prices in cents per million tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input_cents_per_mtok: u64,
    pub output_cents_per_mtok: u64,
}

const TOKENS_PER_MILLION: u128 = 1_000_000;

/// Fallback for models missing from the table
pub const DEFAULT_RATES: ModelRates = ModelRates {
    input_cents_per_mtok: 300,
    output_cents_per_mtok: 1500,
};

/// Matched by model-name prefix, first hit wins
const MODEL_RATES: &[(&str, ModelRates)] = &[
    (
        "claude-opus",
        ModelRates {
            input_cents_per_mtok: 1500,
            output_cents_per_mtok: 7500,
        },
    ),
    (
        "claude-sonnet",
        ModelRates {
            input_cents_per_mtok: 300,
            output_cents_per_mtok: 1500,
        },
    ),
    (
        "claude-haiku",
        ModelRates {
            input_cents_per_mtok: 80,
            output_cents_per_mtok: 400,
        },
    ),
    (
        "gpt-4o-mini",
        ModelRates {
            input_cents_per_mtok: 15,
            output_cents_per_mtok: 60,
        },
    ),
    (
        "gpt-4o",
        ModelRates {
            input_cents_per_mtok: 250,
            output_cents_per_mtok: 1000,
        },
    ),
];

impl ModelRates {
    /// Look up the rates for a model name
    pub fn for_model(model: &str) -> Self {
        let model = model.trim().to_ascii_lowercase();
        // Strip provider prefixes such as "anthropic/claude-sonnet-4"
        let model = model.rsplit('/').next().unwrap_or_default();

        MODEL_RATES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, rates)| *rates)
            .unwrap_or(DEFAULT_RATES)
    }
}

/// Cost of a model call in whole cents, rounded up
pub fn cost_cents(rates: &ModelRates, input_tokens: u64, output_tokens: u64) -> i64 {
    let numerator = input_tokens as u128 * rates.input_cents_per_mtok as u128
        + output_tokens as u128 * rates.output_cents_per_mtok as u128;

    let cents = numerator.div_ceil(TOKENS_PER_MILLION);
    i64::try_from(cents).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(1, 0, 1)]
    #[case(1_000_000, 0, 300)]
    #[case(0, 1_000_000, 1500)]
    #[case(1_000_000, 1_000_000, 1800)]
    #[case(3_334, 0, 2)]
    #[case(3_333, 0, 1)]
    fn test_cost_rounds_up(#[case] input: u64, #[case] output: u64, #[case] expected: i64) {
        assert_eq!(cost_cents(&DEFAULT_RATES, input, output), expected);
    }

    #[rstest]
    #[case("claude-opus-4-1", 1500)]
    #[case("anthropic/claude-haiku-4-5", 80)]
    #[case("GPT-4o-mini", 15)]
    #[case("gpt-4o-2024-08-06", 250)]
    #[case("some-unknown-model", 300)]
    fn test_rates_by_model(#[case] model: &str, #[case] input_rate: u64) {
        assert_eq!(ModelRates::for_model(model).input_cents_per_mtok, input_rate);
    }

    #[test]
    fn test_cost_does_not_overflow() {
        let cost = cost_cents(&DEFAULT_RATES, u64::MAX, u64::MAX);
        assert!(cost > 0);
    }
}
