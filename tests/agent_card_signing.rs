//! Agent-card canonicalization and detached-JWS sign/verify.

mod common;

use std::sync::Arc;

use a2a_sdk::types::{AgentCardSignature, AgentInterface};
use a2a_sdk::utils::signing::{
    canonicalize_agent_card, AgentCardSigner, KeyProvider, ProtectedHeader,
    SignatureVerificationError, SignatureVerifier, ALG_HS256,
};

use common::test_card;

fn key_provider(expected_kid: &str, key: &[u8]) -> KeyProvider {
    let expected_kid = expected_kid.to_string();
    let key = key.to_vec();
    Arc::new(move |kid, _jku| {
        if kid == Some(expected_kid.as_str()) {
            Some(key.clone())
        } else {
            None
        }
    })
}

#[test]
fn canonical_form_has_sorted_keys_and_no_whitespace() {
    let mut card = test_card(false, true);
    card.signatures = Some(vec![AgentCardSignature {
        protected: "x".to_string(),
        signature: "y".to_string(),
        header: None,
    }]);

    let canonical = canonicalize_agent_card(&card).unwrap();

    // streaming=false is a falsy scalar and must survive.
    assert!(canonical.contains("\"streaming\":false"));
    assert!(canonical.contains("\"pushNotifications\":true"));
    // The signatures block is stripped.
    assert!(!canonical.contains("signatures"));
    // No whitespace.
    assert!(!canonical.contains(": "));
    assert!(!canonical.contains(", "));
    // Keys are sorted: capabilities < defaultInputModes < description.
    let caps = canonical.find("\"capabilities\"").unwrap();
    let modes = canonical.find("\"defaultInputModes\"").unwrap();
    let desc = canonical.find("\"description\"").unwrap();
    assert!(caps < modes && modes < desc);
}

#[test]
fn canonical_form_prunes_empty_containers() {
    let mut card = test_card(true, false);
    card.skills = vec![];
    card.default_input_modes = vec![];
    card.additional_interfaces = Some(vec![]);

    let canonical = canonicalize_agent_card(&card).unwrap();
    assert!(!canonical.contains("skills"));
    assert!(!canonical.contains("defaultInputModes"));
    assert!(!canonical.contains("additionalInterfaces"));
}

#[test]
fn canonical_form_is_stable_under_irrelevant_changes() {
    let card = test_card(true, false);
    let baseline = canonicalize_agent_card(&card).unwrap();

    // Adding an empty container changes nothing.
    let mut with_empty = card.clone();
    with_empty.additional_interfaces = Some(vec![]);
    assert_eq!(canonicalize_agent_card(&with_empty).unwrap(), baseline);

    // Adding a real value does change the output.
    let mut with_value = card.clone();
    with_value.additional_interfaces = Some(vec![AgentInterface {
        transport: "HTTP+JSON".to_string(),
        url: "http://x/v1".to_string(),
    }]);
    assert_ne!(canonicalize_agent_card(&with_value).unwrap(), baseline);

    // Signatures never affect the canonical form.
    let mut with_sig = card;
    with_sig.signatures = Some(vec![AgentCardSignature {
        protected: "p".to_string(),
        signature: "s".to_string(),
        header: None,
    }]);
    assert_eq!(canonicalize_agent_card(&with_sig).unwrap(), baseline);
}

// S6 — sign with K1, verify with K1 succeeds, verify with K2 fails.
#[test]
fn sign_then_verify_with_right_and_wrong_keys() {
    let card = test_card(false, true);
    let k1 = b"key-one-secret-material";
    let k2 = b"key-two-secret-material";

    let signer = AgentCardSigner::hs256(k1.to_vec(), ProtectedHeader::new(ALG_HS256, "k1"));
    let signed = signer.sign(&card).unwrap();
    assert_eq!(signed.signatures.as_ref().unwrap().len(), 1);

    let verifier = SignatureVerifier::new(key_provider("k1", k1), vec![ALG_HS256.to_string()]);
    verifier.verify(&signed).unwrap();

    let wrong_key = SignatureVerifier::new(key_provider("k1", k2), vec![ALG_HS256.to_string()]);
    assert!(matches!(
        wrong_key.verify(&signed),
        Err(SignatureVerificationError::InvalidSignatures)
    ));
}

#[test]
fn unsigned_card_has_no_signature() {
    let card = test_card(false, false);
    let verifier = SignatureVerifier::new(key_provider("k1", b"k"), vec![ALG_HS256.to_string()]);
    assert!(matches!(
        verifier.verify(&card),
        Err(SignatureVerificationError::NoSignature)
    ));
}

#[test]
fn algorithm_allowlist_blocks_confusion() {
    let card = test_card(false, false);
    let key = b"shared-secret";

    let signer = AgentCardSigner::hs256(key.to_vec(), ProtectedHeader::new(ALG_HS256, "k1"));
    let signed = signer.sign(&card).unwrap();

    // The signature is valid but its algorithm is not allowed.
    let verifier = SignatureVerifier::new(key_provider("k1", key), vec!["ES256".to_string()]);
    assert!(matches!(
        verifier.verify(&signed),
        Err(SignatureVerificationError::InvalidSignatures)
    ));
}

#[test]
fn first_valid_signature_wins() {
    let card = test_card(false, false);
    let good_key = b"good-key";
    let bad_key = b"bad-key";

    // Two signatures: one from an unknown key, one verifiable.
    let signed = AgentCardSigner::hs256(bad_key.to_vec(), ProtectedHeader::new(ALG_HS256, "kx"))
        .sign(&card)
        .unwrap();
    let signed = AgentCardSigner::hs256(good_key.to_vec(), ProtectedHeader::new(ALG_HS256, "k1"))
        .sign(&signed)
        .unwrap();
    assert_eq!(signed.signatures.as_ref().unwrap().len(), 2);

    let verifier =
        SignatureVerifier::new(key_provider("k1", good_key), vec![ALG_HS256.to_string()]);
    verifier.verify(&signed).unwrap();
}

#[test]
fn signing_twice_verifies_against_original_payload() {
    // The canonical payload excludes signatures, so a signature added later
    // does not invalidate an earlier one.
    let card = test_card(true, true);
    let key = b"stable-key";

    let signed_once = AgentCardSigner::hs256(key.to_vec(), ProtectedHeader::new(ALG_HS256, "k1"))
        .sign(&card)
        .unwrap();
    let signed_twice = AgentCardSigner::hs256(key.to_vec(), ProtectedHeader::new(ALG_HS256, "k1"))
        .sign(&signed_once)
        .unwrap();

    let verifier = SignatureVerifier::new(key_provider("k1", key), vec![ALG_HS256.to_string()]);
    verifier.verify(&signed_twice).unwrap();
}
