//! Inbound webhook events from the payment gateway.
//!
//! Deliveries are signed with an HMAC-SHA256 over the raw body; nothing
//! is parsed before the signature checks out. The gateway may redeliver
//! events or deliver them out of order, so downstream handling has to be
//! idempotent — that duty lives in the settlement ledger, not here.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A verified, decoded gateway event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// `payment_intent.succeeded`
    IntentSucceeded { intent_id: String },
    /// `payment_intent.payment_failed`
    IntentFailed { intent_id: String },
    /// `charge.refunded` — carries the intent the charge belonged to.
    ChargeRefunded { intent_id: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: String,
    payment_intent: Option<String>,
}

/// Verify `signature` (hex HMAC-SHA256 of the raw body under `secret`)
/// and decode the event. Unknown event types are surfaced as errors so
/// the caller can acknowledge-and-ignore them explicitly.
pub fn parse_event(raw_body: &str, signature: &str, secret: &str) -> anyhow::Result<WebhookEvent> {
    verify_signature(raw_body, signature, secret)?;

    let raw: RawEvent = serde_json::from_str(raw_body)?;

    match raw.kind.as_str() {
        "payment_intent.succeeded" => Ok(WebhookEvent::IntentSucceeded {
            intent_id: raw.data.object.id,
        }),
        "payment_intent.payment_failed" => Ok(WebhookEvent::IntentFailed {
            intent_id: raw.data.object.id,
        }),
        "charge.refunded" => {
            let intent_id = raw
                .data
                .object
                .payment_intent
                .ok_or_else(|| anyhow::anyhow!("charge.refunded without payment_intent"))?;
            Ok(WebhookEvent::ChargeRefunded { intent_id })
        }
        other => Err(anyhow::anyhow!("unhandled webhook event type: {other}")),
    }
}

fn verify_signature(raw_body: &str, signature: &str, secret: &str) -> anyhow::Result<()> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid webhook secret"))?;
    mac.update(raw_body.as_bytes());

    let expected = hex::decode(signature.trim())
        .map_err(|_| anyhow::anyhow!("signature is not valid hex"))?;

    mac.verify_slice(&expected)
        .map_err(|_| anyhow::anyhow!("webhook signature mismatch"))
}

/// Helper for tests and local tooling: sign a body the way the gateway does.
pub fn sign_body(raw_body: &str, secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key len");
    mac.update(raw_body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn event_body(kind: &str, id: &str) -> String {
        format!(r#"{{"type":"{kind}","data":{{"object":{{"id":"{id}"}}}}}}"#)
    }

    #[test]
    fn succeeded_event_parses() {
        let body = event_body("payment_intent.succeeded", "pi_123");
        let sig = sign_body(&body, SECRET);

        let ev = parse_event(&body, &sig, SECRET).unwrap();
        assert_eq!(
            ev,
            WebhookEvent::IntentSucceeded {
                intent_id: "pi_123".into()
            }
        );
    }

    #[test]
    fn failed_event_parses() {
        let body = event_body("payment_intent.payment_failed", "pi_9");
        let sig = sign_body(&body, SECRET);

        let ev = parse_event(&body, &sig, SECRET).unwrap();
        assert_eq!(
            ev,
            WebhookEvent::IntentFailed {
                intent_id: "pi_9".into()
            }
        );
    }

    #[test]
    fn refunded_event_uses_charge_parent_intent() {
        let body = r#"{"type":"charge.refunded","data":{"object":{"id":"ch_1","payment_intent":"pi_55"}}}"#;
        let sig = sign_body(body, SECRET);

        let ev = parse_event(body, &sig, SECRET).unwrap();
        assert_eq!(
            ev,
            WebhookEvent::ChargeRefunded {
                intent_id: "pi_55".into()
            }
        );
    }

    #[test]
    fn bad_signature_is_rejected_before_parsing() {
        let body = event_body("payment_intent.succeeded", "pi_123");
        let sig = sign_body(&body, "wrong-secret");

        assert!(parse_event(&body, &sig, SECRET).is_err());
        // Garbage that is not even hex must fail too.
        assert!(parse_event(&body, "zzzz", SECRET).is_err());
    }

    #[test]
    fn tampered_body_is_rejected() {
        let body = event_body("payment_intent.succeeded", "pi_123");
        let sig = sign_body(&body, SECRET);
        let tampered = body.replace("pi_123", "pi_666");

        assert!(parse_event(&tampered, &sig, SECRET).is_err());
    }

    #[test]
    fn unknown_event_type_errors() {
        let body = event_body("customer.created", "cus_1");
        let sig = sign_body(&body, SECRET);

        assert!(parse_event(&body, &sig, SECRET).is_err());
    }
}
