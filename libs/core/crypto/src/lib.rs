// [libs/core/crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTO VERIFIER (C1)
 * CLASIFICACIÓN: DOMAIN PRIMITIVE (ESTRATO L2)
 * RESPONSABILIDAD: FIRMA Y VERIFICACIÓN ED25519, CANONICALIZACIÓN DE PAYLOAD
 *
 * Every signed agent request is verified against a canonical
 * serialization of `{device_id, timestamp, nonce, ...extra_fields}`.
 * The wire contract fixes that canonicalization as lexical-key-order,
 * whitespace-free JSON — both sides (agent and server) must produce
 * byte-identical output for the signature to verify.
 * =================================================================
 */

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde_json::{Map, Value};
use thiserror::Error;

/// Requests signed more than this many milliseconds off the server
/// clock (either direction) are rejected regardless of signature
/// validity.
pub const TIMESTAMP_WINDOW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("request timestamp outside the allowed window")]
    TimestampOutOfRange,
    #[error("signature verification failed")]
    BadSignature,
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error("malformed signature encoding: {0}")]
    MalformedSignature(String),
}

/// Builds the canonical signing payload `{device_id, timestamp, nonce,
/// ...extra_fields}` and serializes it deterministically: object keys
/// sorted lexically at every nesting level, no insignificant
/// whitespace. Both the agent and the server must produce identical
/// bytes for a given logical payload.
pub fn canonical_payload(device_id: &str, timestamp_ms: i64, nonce: &str, extra_fields: &Value) -> String {
    let mut map = Map::new();
    map.insert("device_id".to_string(), Value::String(device_id.to_string()));
    map.insert("timestamp".to_string(), Value::from(timestamp_ms));
    map.insert("nonce".to_string(), Value::String(nonce.to_string()));

    if let Value::Object(extra) = extra_fields {
        for (k, v) in extra {
            map.insert(k.clone(), v.clone());
        }
    }

    canonicalize(&Value::Object(map))
}

/// Recursively sorts object keys and serializes with no whitespace.
/// Arrays preserve element order (order is meaningful); only object
/// key order is normalized.
fn canonicalize(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted_map = Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    sorted_map.insert(key.clone(), sorted(&map[key]));
                }
                Value::Object(sorted_map)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }

    serde_json::to_string(&sorted(value)).expect("canonicalized JSON always serializes")
}

/// Verifies a signed agent request. `public_key_spki_b64` is the
/// device's Ed25519 public key, SPKI-encoded and base64'd.
/// `signature_b64` is the base64'd Ed25519 signature over the
/// canonical payload.
pub fn verify_request(
    device_id: &str,
    timestamp_ms: i64,
    nonce: &str,
    signature_b64: &str,
    public_key_spki_b64: &str,
    extra_fields: &Value,
    now_ms: i64,
) -> Result<(), CryptoError> {
    if (now_ms - timestamp_ms).abs() > TIMESTAMP_WINDOW_MS {
        return Err(CryptoError::TimestampOutOfRange);
    }

    let spki_der = STANDARD
        .decode(public_key_spki_b64)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let verifying_key = VerifyingKey::from_public_key_der(&spki_der)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;

    let signature_bytes = STANDARD
        .decode(signature_b64)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

    let payload = canonical_payload(device_id, timestamp_ms, nonce, extra_fields);

    verifying_key
        .verify(payload.as_bytes(), &signature)
        .map_err(|_| CryptoError::BadSignature)
}

/// Signs `bytes` with a PKCS#8-encoded, base64'd private key.
/// Diagnostic/test use — production signing happens on the agent.
pub fn sign(private_key_pkcs8_b64: &str, bytes: &[u8]) -> Result<String, CryptoError> {
    let pkcs8_der = STANDARD
        .decode(private_key_pkcs8_b64)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let signing_key = SigningKey::from_pkcs8_der(&pkcs8_der)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let signature = signing_key.sign(bytes);
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Generates a fresh Ed25519 keypair, returning `(public_key_spki_b64,
/// private_key_pkcs8_b64)`. Used during enrollment when the caller
/// does not supply its own public key.
pub fn generate_keypair() -> Result<(String, String), CryptoError> {
    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);

    let public_der = signing_key
        .verifying_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let private_der = signing_key
        .to_pkcs8_der()
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;

    Ok((
        STANDARD.encode(public_der.as_bytes()),
        STANDARD.encode(private_der.as_bytes()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalization_sorts_keys_and_drops_whitespace() {
        let a = canonical_payload("dev_1", 1000, "nonce123456789012", &json!({"z": 1, "a": 2}));
        let b = canonical_payload("dev_1", 1000, "nonce123456789012", &json!({"a": 2, "z": 1}));
        assert_eq!(a, b);
        assert!(!a.contains(' '));
    }

    #[test]
    fn round_trips_sign_and_verify() {
        let (public_key, private_key) = generate_keypair().unwrap();
        let extra = json!({"protocol_version": "1.0"});
        let payload = canonical_payload("dev_1", 1_700_000_000_000, "nnnnnnnnnnnnnnnn", &extra);
        let signature = sign(&private_key, payload.as_bytes()).unwrap();

        verify_request(
            "dev_1",
            1_700_000_000_000,
            "nnnnnnnnnnnnnnnn",
            &signature,
            &public_key,
            &extra,
            1_700_000_000_000,
        )
        .expect("valid signature must verify");
    }

    #[test]
    fn flipped_signature_byte_is_rejected() {
        let (public_key, private_key) = generate_keypair().unwrap();
        let extra = json!({});
        let payload = canonical_payload("dev_1", 1_700_000_000_000, "nnnnnnnnnnnnnnnn", &extra);
        let mut signature = sign(&private_key, payload.as_bytes()).unwrap();
        let last = signature.pop().unwrap();
        signature.push(if last == 'A' { 'B' } else { 'A' });

        let result = verify_request(
            "dev_1",
            1_700_000_000_000,
            "nnnnnnnnnnnnnnnn",
            &signature,
            &public_key,
            &extra,
            1_700_000_000_000,
        );
        assert!(matches!(
            result,
            Err(CryptoError::BadSignature) | Err(CryptoError::MalformedSignature(_))
        ));
    }

    #[test]
    fn timestamp_outside_window_is_rejected() {
        let (public_key, private_key) = generate_keypair().unwrap();
        let extra = json!({});
        let payload = canonical_payload("dev_1", 0, "nnnnnnnnnnnnnnnn", &extra);
        let signature = sign(&private_key, payload.as_bytes()).unwrap();

        let result = verify_request(
            "dev_1",
            0,
            "nnnnnnnnnnnnnnnn",
            &signature,
            &public_key,
            &extra,
            TIMESTAMP_WINDOW_MS + 1,
        );
        assert!(matches!(result, Err(CryptoError::TimestampOutOfRange)));
    }
}
