//! # Lender Routing
//!
//! Some customers pay through a financing partner. When the receipt text
//! names one, the partner gets a copy for its own review.

use crate::text::normalize;
use crate::types::Lender;

/// Returns the first active lender whose keyword appears in the receipt text.
///
/// Matching is a case-insensitive substring test on normalized text, so
/// `"Credito  SUR"` in a receipt matches the keyword `credito sur`.
pub fn detect_lender<'a>(raw_text: &str, lenders: &'a [Lender]) -> Option<&'a Lender> {
    let text = normalize(raw_text);
    lenders.iter().filter(|l| l.active).find(|lender| {
        lender
            .keyword_list()
            .iter()
            .any(|kw| text.contains(normalize(kw).as_str()))
    })
}
