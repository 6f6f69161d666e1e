//! Agent-card canonicalization and detached-JWS signing / verification.
//!
//! The canonical form follows RFC 8785 (JCS) for the JSON shapes an agent
//! card can contain: object keys sorted lexicographically, no insignificant
//! whitespace. Before serialization the `signatures` field is removed and
//! empty strings, arrays, and objects are pruned recursively; falsy scalars
//! (`0`, `false`) are kept.
//!
//! Signatures are detached: the JWS payload (the canonical card) is never
//! transmitted. Only the protected-header and signature segments travel on
//! the card, and the verifier rebuilds the payload from the card it
//! received.

use std::fmt::Write as _;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::error::{A2AError, A2AResult};
use crate::types::{AgentCard, AgentCardSignature};

type HmacSha256 = Hmac<Sha256>;

/// The one algorithm with a built-in implementation.
pub const ALG_HS256: &str = "HS256";

/// Outcome of a failed signature verification.
#[derive(Debug, thiserror::Error)]
pub enum SignatureVerificationError {
    /// The card carries no signatures at all.
    #[error("AgentCard has no signatures to verify")]
    NoSignature,

    /// Every signature on the card failed to verify.
    #[error("no valid signature found")]
    InvalidSignatures,
}

/// Recursively removes empty strings, arrays, and objects.
///
/// Returns `None` when the value itself reduces to empty. `0`, `0.0`,
/// `false`, and `null`-free scalars survive.
pub fn clean_empty(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let cleaned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| clean_empty(v).map(|v| (k, v)))
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Object(cleaned))
            }
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.into_iter().filter_map(clean_empty).collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(Value::Array(cleaned))
            }
        }
        Value::String(s) if s.is_empty() => None,
        Value::Null => None,
        other => Some(other),
    }
}

/// Serializes a JSON value with lexicographically sorted object keys and no
/// whitespace, per RFC 8785.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json string escaping is JCS-compatible for the
                // characters agent cards carry.
                let _ = write!(out, "{}", Value::String((*key).clone()));
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => {
            let _ = write!(out, "{}", scalar);
        }
    }
}

/// Canonicalizes an agent card for signing: `signatures` removed, empties
/// pruned, keys sorted, minimal whitespace.
pub fn canonicalize_agent_card(card: &AgentCard) -> A2AResult<String> {
    let mut value = serde_json::to_value(card)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("signatures");
    }
    let cleaned = clean_empty(value).unwrap_or(Value::Object(serde_json::Map::new()));
    let mut out = String::new();
    write_canonical(&cleaned, &mut out);
    Ok(out)
}

/// JWS protected-header parameters for an agent-card signature.
#[derive(Debug, Clone)]
pub struct ProtectedHeader {
    /// Signing algorithm, e.g. `"HS256"`.
    pub alg: String,
    /// Key identifier.
    pub kid: Option<String>,
    /// JSON Web Key Set URL.
    pub jku: Option<String>,
    /// Token type; SHOULD be `"JOSE"`.
    pub typ: Option<String>,
}

impl ProtectedHeader {
    /// Header for the given algorithm and key id.
    pub fn new(alg: impl Into<String>, kid: impl Into<String>) -> Self {
        ProtectedHeader {
            alg: alg.into(),
            kid: Some(kid.into()),
            jku: None,
            typ: Some("JOSE".to_string()),
        }
    }

    fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("alg".into(), Value::String(self.alg.clone()));
        if let Some(ref kid) = self.kid {
            map.insert("kid".into(), Value::String(kid.clone()));
        }
        if let Some(ref jku) = self.jku {
            map.insert("jku".into(), Value::String(jku.clone()));
        }
        if let Some(ref typ) = self.typ {
            map.insert("typ".into(), Value::String(typ.clone()));
        }
        Value::Object(map)
    }
}

/// Raw signing primitive: signing input in, signature bytes out.
pub type SignFn = Arc<dyn Fn(&[u8]) -> A2AResult<Vec<u8>> + Send + Sync>;

/// Raw verification primitive: `(alg, key, signing_input, signature)` →
/// valid. Used for algorithms beyond the built-in HS256.
pub type VerifyFn = Arc<dyn Fn(&str, &[u8], &[u8], &[u8]) -> bool + Send + Sync>;

/// Resolves a verification key from the `(kid, jku)` pair in a signature's
/// protected header.
pub type KeyProvider = Arc<dyn Fn(Option<&str>, Option<&str>) -> Option<Vec<u8>> + Send + Sync>;

/// Signs agent cards, appending a detached JWS signature.
pub struct AgentCardSigner {
    protected_header: ProtectedHeader,
    unprotected_header: Option<Value>,
    sign: SignFn,
}

impl AgentCardSigner {
    /// HS256 signer over the given shared key.
    pub fn hs256(key: impl Into<Vec<u8>>, protected_header: ProtectedHeader) -> Self {
        let key = key.into();
        let sign: SignFn = Arc::new(move |input: &[u8]| {
            let mut mac = HmacSha256::new_from_slice(&key)
                .map_err(|e| A2AError::internal_error(format!("invalid HMAC key: {e}")))?;
            mac.update(input);
            Ok(mac.finalize().into_bytes().to_vec())
        });
        AgentCardSigner {
            protected_header,
            unprotected_header: None,
            sign,
        }
    }

    /// Signer backed by a caller-supplied signing function (for asymmetric
    /// algorithms).
    pub fn with_sign_fn(protected_header: ProtectedHeader, sign: SignFn) -> Self {
        AgentCardSigner {
            protected_header,
            unprotected_header: None,
            sign,
        }
    }

    /// Attaches an unprotected header to produced signatures.
    pub fn unprotected_header(mut self, header: Value) -> Self {
        self.unprotected_header = Some(header);
        self
    }

    /// Signs the card and returns it with the new signature appended.
    pub fn sign(&self, card: &AgentCard) -> A2AResult<AgentCard> {
        let canonical = canonicalize_agent_card(card)?;
        let protected = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&self.protected_header.to_json())
                .map_err(|e| A2AError::internal_error(e.to_string()))?,
        );
        let payload = URL_SAFE_NO_PAD.encode(canonical.as_bytes());
        let signing_input = format!("{protected}.{payload}");
        let signature_bytes = (self.sign)(signing_input.as_bytes())?;
        let signature = URL_SAFE_NO_PAD.encode(signature_bytes);

        let mut signed = card.clone();
        signed
            .signatures
            .get_or_insert_with(Vec::new)
            .push(AgentCardSignature {
                protected,
                signature,
                header: self.unprotected_header.clone(),
            });
        Ok(signed)
    }
}

/// Verifies agent-card signatures against an explicit algorithm allowlist.
///
/// The allowlist prevents algorithm-confusion attacks: a signature whose
/// protected header names an algorithm outside the list is not even
/// attempted.
pub struct SignatureVerifier {
    key_provider: KeyProvider,
    algorithms: Vec<String>,
    verify_fn: Option<VerifyFn>,
}

impl SignatureVerifier {
    /// Verifier with the built-in HS256 implementation.
    pub fn new(key_provider: KeyProvider, algorithms: Vec<String>) -> Self {
        SignatureVerifier {
            key_provider,
            algorithms,
            verify_fn: None,
        }
    }

    /// Installs a verification primitive for non-HS256 algorithms.
    pub fn with_verify_fn(mut self, verify_fn: VerifyFn) -> Self {
        self.verify_fn = Some(verify_fn);
        self
    }

    /// Checks that at least one signature on the card verifies.
    pub fn verify(&self, card: &AgentCard) -> Result<(), SignatureVerificationError> {
        let signatures = match card.signatures {
            Some(ref sigs) if !sigs.is_empty() => sigs,
            _ => return Err(SignatureVerificationError::NoSignature),
        };

        let canonical = match canonicalize_agent_card(card) {
            Ok(c) => c,
            Err(_) => return Err(SignatureVerificationError::InvalidSignatures),
        };
        let payload = URL_SAFE_NO_PAD.encode(canonical.as_bytes());

        for signature in signatures {
            if self.verify_one(signature, &payload) {
                return Ok(());
            }
        }
        Err(SignatureVerificationError::InvalidSignatures)
    }

    fn verify_one(&self, signature: &AgentCardSignature, payload: &str) -> bool {
        let header_bytes = match URL_SAFE_NO_PAD.decode(signature.protected.as_bytes()) {
            Ok(b) => b,
            Err(_) => return false,
        };
        let header: Value = match serde_json::from_slice(&header_bytes) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let alg = header.get("alg").and_then(Value::as_str).unwrap_or("");
        if !self.algorithms.iter().any(|a| a == alg) {
            debug!(alg, "signature algorithm not in allowlist");
            return false;
        }

        let kid = header.get("kid").and_then(Value::as_str);
        let jku = header.get("jku").and_then(Value::as_str);
        let key = match (self.key_provider)(kid, jku) {
            Some(k) => k,
            None => return false,
        };

        let signing_input = format!("{}.{}", signature.protected, payload);
        let signature_bytes = match URL_SAFE_NO_PAD.decode(signature.signature.as_bytes()) {
            Ok(b) => b,
            Err(_) => return false,
        };

        if alg == ALG_HS256 {
            let mut mac = match HmacSha256::new_from_slice(&key) {
                Ok(m) => m,
                Err(_) => return false,
            };
            mac.update(signing_input.as_bytes());
            mac.verify_slice(&signature_bytes).is_ok()
        } else if let Some(ref verify) = self.verify_fn {
            verify(alg, &key, signing_input.as_bytes(), &signature_bytes)
        } else {
            debug!(alg, "no verification primitive for algorithm");
            false
        }
    }
}
