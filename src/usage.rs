//! Tokenizer-free usage and cost estimation.
//!
//! Approximates how many tokens a prompt will consume without loading a real
//! tokenizer: CJK ideographs count roughly one token per 1.5 characters and
//! everything else one token per 4 characters. Prices come from a static table
//! in USD per 1000 tokens.

use serde::Serialize;

use crate::provider::Message;

/// Fixed per-message framing overhead, in tokens.
const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

/// Fixed overhead for priming the assistant reply, in tokens.
const REPLY_OVERHEAD_TOKENS: u64 = 3;

/// Model whose pricing applies to names missing from [`PRICE_TABLE`].
pub const DEFAULT_PRICING_MODEL: &str = "gpt-3.5-turbo";

/// Price per 1000 tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// Static price table. The first entry is the fallback.
const PRICE_TABLE: &[(&str, ModelPricing)] = &[
    (
        DEFAULT_PRICING_MODEL,
        ModelPricing {
            input: 0.0005,
            output: 0.0015,
        },
    ),
    (
        "gpt-4",
        ModelPricing {
            input: 0.03,
            output: 0.06,
        },
    ),
    (
        "gpt-4-turbo",
        ModelPricing {
            input: 0.01,
            output: 0.03,
        },
    ),
];

/// Estimated cost of a token count, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostEstimate {
    pub input: f64,
    pub output: f64,
    pub total: f64,
}

/// Whether a character belongs to the wide-script class (CJK Unified Ideographs).
fn is_wide(c: char) -> bool {
    ('\u{4E00}'..='\u{9FA5}').contains(&c)
}

/// Estimate the token count of a piece of text.
///
/// Characters are Unicode scalar values, not UTF-16 code units, so a
/// character outside the Basic Multilingual Plane (e.g. an emoji) counts once:
/// `"🙂🙂🙂🙂"` is 1 token, where a UTF-16 length would give 2.
pub fn estimate_tokens(text: &str) -> u64 {
    if text.is_empty() {
        return 0;
    }

    let (wide, other) = text.chars().fold((0u64, 0u64), |(wide, other), c| {
        if is_wide(c) {
            (wide + 1, other)
        } else {
            (wide, other + 1)
        }
    });

    // ceil(wide / 1.5) == ceil(2 * wide / 3), kept in integers
    (wide * 2).div_ceil(3) + other.div_ceil(4)
}

/// Estimate the prompt tokens of a chat conversation, including framing overhead.
pub fn estimate_messages(messages: &[Message]) -> u64 {
    let body: u64 = messages
        .iter()
        .map(|m| {
            MESSAGE_OVERHEAD_TOKENS
                + estimate_tokens(m.role.as_str())
                + estimate_tokens(&m.content)
        })
        .sum();

    body + REPLY_OVERHEAD_TOKENS
}

/// Look up pricing for a model, falling back to [`DEFAULT_PRICING_MODEL`].
pub fn pricing_for(model: &str) -> ModelPricing {
    PRICE_TABLE
        .iter()
        .find(|(name, _)| *name == model)
        .unwrap_or(&PRICE_TABLE[0])
        .1
}

/// Estimate the cost of `tokens` tokens billed at both input and output rates.
pub fn estimate_cost(tokens: u64, model: &str) -> CostEstimate {
    let pricing = pricing_for(model);
    let thousands = tokens as f64 / 1000.0;
    let input = thousands * pricing.input;
    let output = thousands * pricing.output;

    CostEstimate {
        input,
        output,
        total: input + output,
    }
}

/// Human-readable one-line summary, e.g. `Tokens: 9 | Estimated Cost: $0.000018`.
pub fn format_estimate(tokens: u64, model: &str) -> String {
    let cost = estimate_cost(tokens, model);
    format!("Tokens: {} | Estimated Cost: ${:.6}", tokens, cost.total)
}
