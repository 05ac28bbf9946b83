// [apps/server/src/services/crypto_gate.rs]
/*!
 * Signature verification entry point (C1) used by every authenticated
 * agent handler. Each caller supplies the endpoint-specific
 * `extra_fields` that were signed alongside the common envelope.
 */

use rmm_core_crypto::verify_request;
use serde_json::Value;

use crate::errors::ApiError;

#[allow(clippy::too_many_arguments)]
pub fn verify_signed_envelope(
    device_id: &str,
    timestamp_ms: i64,
    nonce: &str,
    signature_b64: &str,
    public_key_spki_b64: &str,
    extra_fields: &Value,
    now_ms: i64,
) -> Result<(), ApiError> {
    verify_request(device_id, timestamp_ms, nonce, signature_b64, public_key_spki_b64, extra_fields, now_ms)
        .map_err(ApiError::from)
}
