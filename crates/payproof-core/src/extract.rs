//! # Amount Extractor
//!
//! Picks the most likely paid amount out of noisy OCR text.
//!
//! ## Why Scoring?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A typical receipt dump                                                 │
//! │                                                                         │
//! │  "transferencia exitosa importe $ 50.500,00 cbu 0000003100012345678     │
//! │   operacion 48.213.774 fecha 12/03"                                     │
//! │                                                                         │
//! │  Currency-looking tokens:                                               │
//! │    $ 50.500,00   → $ sign, "importe" nearby          ← the amount      │
//! │    48.213.774    → "operacion" nearby                ← an identifier   │
//! │    000 / 310 ... → no thousands separator            ← discarded       │
//! │                                                                         │
//! │  Without layout metadata, context words are the only signal.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Scoring
//! | Signal                                              | Points |
//! |-----------------------------------------------------|--------|
//! | Literal token contains `$`                          | +2     |
//! | A strong keyword within 50 chars                    | +3     |
//! | No trap keyword within 50 chars                     | +2     |
//! | Token starts in the first 30% of the text           | +1     |
//!
//! The highest score wins; on a tie the earliest token is kept.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use ts_rs::TS;

use crate::money::{Currency, Money};
use crate::text::normalize;
use crate::{CONTEXT_WINDOW, MIN_PLAUSIBLE_AMOUNT};

/// Optional `$`, 1-3 digits, `.`-separated thousands groups, optional `,NN`.
static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\s?\d{1,3}(?:\.\d{3})*(?:,\d{2})?").expect("amount pattern is a valid regex")
});

/// Words that usually sit next to the paid amount.
pub const STRONG_KEYWORDS: [&str; 6] = ["importe", "monto", "total", "$", "ars", "pesos"];

/// Words that usually sit next to identifiers that look like amounts.
pub const TRAP_KEYWORDS: [&str; 8] = [
    "cbu",
    "cvu",
    "cuit",
    "cuil",
    "operacion",
    "referencia",
    "codigo",
    "alias",
];

// =============================================================================
// Result Types
// =============================================================================

/// Outcome of amount extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Extraction {
    /// Best candidate, or None when no token survived filtering.
    pub amount: Option<Money>,
    pub currency: Currency,
}

/// A token that passed filtering, with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The matched text, e.g. `"$ 50.500,00"`.
    pub literal: String,
    pub amount: Money,
    /// Byte offset in the cleaned text.
    pub position: usize,
    pub score: u8,
}

// =============================================================================
// Extraction
// =============================================================================

/// Extracts the most likely paid amount from raw OCR text.
///
/// ## Example
/// ```rust
/// use payproof_core::extract::extract;
/// use payproof_core::Money;
///
/// let found = extract("Comprobante. Monto $ 12.345,60 Operacion 99.887.766");
/// assert_eq!(found.amount, Some(Money::from_pesos(12_346)));
///
/// assert_eq!(extract("alias perro.gato.casa").amount, None);
/// ```
pub fn extract(raw_text: &str) -> Extraction {
    let best = candidates(raw_text)
        .into_iter()
        .fold(None::<Candidate>, |best, candidate| match best {
            Some(current) if current.score >= candidate.score => Some(current),
            _ => Some(candidate),
        });

    Extraction {
        amount: best.map(|c| c.amount),
        currency: Currency::Ars,
    }
}

/// Every surviving candidate in document order, scored.
pub fn candidates(raw_text: &str) -> Vec<Candidate> {
    let text = clean(raw_text);

    AMOUNT_PATTERN
        .find_iter(&text)
        .filter_map(|m| {
            let literal = m.as_str();
            if !literal.contains('.') {
                return None;
            }

            let centavos = parse_centavos(literal)?;
            if centavos < MIN_PLAUSIBLE_AMOUNT * 100 {
                return None;
            }

            Some(Candidate {
                literal: literal.to_string(),
                amount: Money::from_centavos_rounded(centavos),
                position: m.start(),
                score: score(&text, literal, m.start()),
            })
        })
        .collect()
}

/// Normalizes and drops every non-ASCII character.
///
/// The result is pure ASCII, so byte offsets are also char offsets.
fn clean(raw_text: &str) -> String {
    normalize(raw_text).chars().filter(char::is_ascii).collect()
}

/// `"$ 50.500,00"` → `5_050_000`. None when the digits overflow.
fn parse_centavos(literal: &str) -> Option<i64> {
    let digits: String = literal
        .chars()
        .filter(|c| *c != '$' && *c != '.' && !c.is_whitespace())
        .collect();

    let (whole, fraction) = match digits.split_once(',') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits.as_str(), "0"),
    };

    let whole: i64 = whole.parse().ok()?;
    let fraction: i64 = fraction.parse().ok()?;
    whole.checked_mul(100)?.checked_add(fraction)
}

fn score(text: &str, literal: &str, position: usize) -> u8 {
    let start = position.saturating_sub(CONTEXT_WINDOW);
    let end = (position + CONTEXT_WINDOW).min(text.len());
    let context = &text[start..end];

    let mut score = 0;
    if literal.contains('$') {
        score += 2;
    }
    if STRONG_KEYWORDS.iter().any(|kw| context.contains(kw)) {
        score += 3;
    }
    if !TRAP_KEYWORDS.iter().any(|kw| context.contains(kw)) {
        score += 2;
    }
    // position < 30% of length, in integer math
    if position * 10 < text.len() * 3 {
        score += 1;
    }
    score
}

// =============================================================================
// Unit Tests
// =============================================================================
