//! Per-token pricing for the models we know about.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fallback when a model is not in the table (priced like a mid-tier model).
const DEFAULT_COST: (Decimal, Decimal) = (dec!(0.000003), dec!(0.000015));

/// `(input, output)` USD cost per token for a model name.
///
/// Matching is by prefix so dated snapshots (`gpt-4o-2024-08-06`) resolve to
/// their family.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    let model = model.to_ascii_lowercase();
    // Longer prefixes first so `gpt-4o-mini` is not priced as `gpt-4o`.
    let table: &[(&str, Decimal, Decimal)] = &[
        ("gpt-4o-mini", dec!(0.00000015), dec!(0.0000006)),
        ("gpt-4o", dec!(0.0000025), dec!(0.00001)),
        ("gpt-4.1-mini", dec!(0.0000004), dec!(0.0000016)),
        ("gpt-4.1", dec!(0.000002), dec!(0.000008)),
        ("claude-3-5-haiku", dec!(0.0000008), dec!(0.000004)),
        ("claude-sonnet-4", dec!(0.000003), dec!(0.000015)),
        ("claude-3-5-sonnet", dec!(0.000003), dec!(0.000015)),
        ("claude-opus-4", dec!(0.000015), dec!(0.000075)),
    ];

    table
        .iter()
        .find(|(prefix, _, _)| model.starts_with(prefix))
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(DEFAULT_COST)
}
