//! # Text Normalizer & Fingerprint
//!
//! Canonicalizes OCR text and derives the fingerprint used for duplicate
//! detection.
//!
//! ```text
//! "  Transferencia\n\tEXITOSA  "
//!        │ normalize: lowercase, collapse whitespace runs, trim
//!        ▼
//! "transferencia exitosa"
//!        │ SHA-256, lowercase hex
//!        ▼
//! Fingerprint("0b1c…")  (64 chars)
//! ```
//!
//! Two OCR outputs that differ only in whitespace or letter case share a
//! fingerprint. Anything else (a single misread digit) does not: matching is
//! exact, never fuzzy.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreResult, ValidationError};

/// Lower-cases, collapses every whitespace run to one space, and trims.
///
/// ## Example
/// ```rust
/// use payproof_core::text::normalize;
///
/// assert_eq!(normalize("  Pago\n\n  RECIBIDO\t"), "pago recibido");
/// ```
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 digest of normalized receipt text, as 64 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprints receipt text.
///
/// ## Errors
/// `ValidationError::Required` when the text is empty or whitespace only.
///
/// ## Example
/// ```rust
/// use payproof_core::text::fingerprint;
///
/// let a = fingerprint("Pago  RECIBIDO").unwrap();
/// let b = fingerprint("pago recibido\n").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
pub fn fingerprint(text: &str) -> CoreResult<Fingerprint> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Err(ValidationError::Required {
            field: "receipt text".to_string(),
        }
        .into());
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    Ok(Fingerprint(hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Hola   Mundo"), "hola mundo");
        assert_eq!(normalize("\n\t a \r\n b \t"), "a b");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("ÑANDÚ  Pagó"), "ñandú pagó");
    }

    #[test]
    fn test_fingerprint_is_known_sha256() {
        // sha256("abc")
        let fp = fingerprint("  ABC ").unwrap();
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_ignores_whitespace_and_case_only() {
        let a = fingerprint("Importe $ 10.000,00").unwrap();
        let b = fingerprint("importe   $ 10.000,00\n").unwrap();
        let c = fingerprint("importe $ 10.000,01").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_rejects_empty() {
        assert!(matches!(
            fingerprint(""),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
        assert!(fingerprint(" \n\t ").is_err());
    }
}
