//! Webhook event verification.
//!
//! Pure functions over raw bytes so the whole thing is unit-testable without
//! an HTTP stack. The signature header follows the processor's scheme:
//! `t=<unix ts>,v1=<hex hmac-sha256 of "{t}.{payload}">`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Signature timestamps further than this from the local clock, in either
/// direction, are rejected to blunt replay of captured deliveries.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    IntentSucceeded,
    IntentFailed,
    Unrecognized,
}

/// An event whose signature checked out. Only these may reach the reconciler.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    pub kind: EventKind,
    pub event_type: String,
    pub reference_id: Option<String>,
}

#[derive(Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: EventData,
}

#[derive(Deserialize, Default)]
struct EventData {
    #[serde(default)]
    object: EventObject,
}

#[derive(Deserialize, Default)]
struct EventObject {
    id: Option<String>,
}

/// Verifies the signature header against the raw payload and, on success,
/// parses out the event type and payment reference id. Fails closed: any
/// missing or malformed header part is a verification failure.
pub fn verify(payload: &[u8], header: &str, secret: &str) -> Result<VerifiedEvent, AppError> {
    verify_at(payload, header, secret, chrono::Utc::now().timestamp())
}

/// Same as `verify` with an injected clock, for tests.
pub fn verify_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_ts: i64,
) -> Result<VerifiedEvent, AppError> {
    let (timestamp, signature) = parse_signature_header(header)?;

    // Symmetric bound: stale timestamps are replays, future ones mean a
    // forged header or badly skewed clock.
    if (now_ts - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(AppError::VerificationFailed(
            "signature timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let expected = hex::decode(signature)
        .map_err(|_| AppError::VerificationFailed("signature is not valid hex".to_string()))?;
    // verify_slice is constant-time.
    mac.verify_slice(&expected)
        .map_err(|_| AppError::VerificationFailed("signature mismatch".to_string()))?;

    // Only now is the payload parsed for business content.
    let parsed: EventPayload = serde_json::from_slice(payload)
        .map_err(|e| AppError::VerificationFailed(format!("unparseable event payload: {}", e)))?;

    let kind = match parsed.event_type.as_str() {
        "payment_intent.succeeded" => EventKind::IntentSucceeded,
        "payment_intent.payment_failed" => EventKind::IntentFailed,
        _ => EventKind::Unrecognized,
    };

    Ok(VerifiedEvent {
        kind,
        event_type: parsed.event_type,
        reference_id: parsed.data.object.id,
    })
}

fn parse_signature_header(header: &str) -> Result<(i64, &str), AppError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| AppError::VerificationFailed("missing timestamp in header".to_string()))?
        .parse::<i64>()
        .map_err(|_| AppError::VerificationFailed("malformed timestamp in header".to_string()))?;
    let signature = signature
        .ok_or_else(|| AppError::VerificationFailed("missing v1 signature in header".to_string()))?;

    Ok((timestamp, signature))
}

/// Computes a valid signature header for a payload. Exposed for tests and
/// for local tooling that replays webhooks.
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn payload(event_type: &str, reference: &str) -> Vec<u8> {
        format!(
            r#"{{"type":"{}","data":{{"object":{{"id":"{}"}}}}}}"#,
            event_type, reference
        )
        .into_bytes()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        let header = sign(&body, SECRET, now);

        let event = verify_at(&body, &header, SECRET, now).unwrap();
        assert_eq!(event.kind, EventKind::IntentSucceeded);
        assert_eq!(event.reference_id.as_deref(), Some("pi_123"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        let header = sign(&body, "wrong_secret", now);

        let err = verify_at(&body, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
    }

    #[test]
    fn test_modified_payload_rejected() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        let header = sign(&body, SECRET, now);

        let tampered = payload("payment_intent.succeeded", "pi_999");
        let err = verify_at(&tampered, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        let header = sign(&body, SECRET, now - TIMESTAMP_TOLERANCE_SECS - 1);

        let err = verify_at(&body, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
    }

    #[test]
    fn test_future_timestamp_rejected() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        let header = sign(&body, SECRET, now + TIMESTAMP_TOLERANCE_SECS + 1);

        let err = verify_at(&body, &header, SECRET, now).unwrap_err();
        assert!(matches!(err, AppError::VerificationFailed(_)));
    }

    #[test]
    fn test_timestamp_within_tolerance_accepted() {
        let body = payload("payment_intent.succeeded", "pi_123");
        let now = 1_700_000_000;
        for ts in [now - TIMESTAMP_TOLERANCE_SECS, now + TIMESTAMP_TOLERANCE_SECS] {
            let header = sign(&body, SECRET, ts);
            assert!(verify_at(&body, &header, SECRET, now).is_ok());
        }
    }

    #[test]
    fn test_malformed_header_rejected() {
        let body = payload("payment_intent.succeeded", "pi_123");
        for header in ["", "t=abc,v1=00", "v1=00", "t=1700000000", "nonsense"] {
            let err = verify_at(&body, header, SECRET, 1_700_000_000).unwrap_err();
            assert!(
                matches!(err, AppError::VerificationFailed(_)),
                "header {:?} should be rejected",
                header
            );
        }
    }

    #[test]
    fn test_unrecognized_event_type_still_verifies() {
        let body = payload("charge.refunded", "ch_1");
        let now = 1_700_000_000;
        let header = sign(&body, SECRET, now);

        let event = verify_at(&body, &header, SECRET, now).unwrap();
        assert_eq!(event.kind, EventKind::Unrecognized);
        assert_eq!(event.event_type, "charge.refunded");
    }
}
