//! Stripe wire types for webhook payloads and API responses.
//!
//! Only the fields the core reads are modeled; Stripe objects carry far more
//! and serde ignores the rest.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Error parsing the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("missing timestamp (t=) in signature header")]
    MissingTimestamp,
    #[error("missing v1 signature in header")]
    MissingV1Signature,
    #[error("malformed timestamp in signature header")]
    InvalidTimestamp,
    #[error("signature is not valid hex")]
    InvalidSignatureFormat,
}

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,...]`.
///
/// Scheme tags other than `t` and `v1` are ignored for forward
/// compatibility.
#[derive(Debug, Clone)]
pub struct SignatureHeader {
    /// Unix timestamp Stripe attached when signing.
    pub timestamp: i64,

    /// Decoded HMAC-SHA256 signature.
    pub v1_signature: Vec<u8>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, SignatureParseError> {
        if header.is_empty() {
            return Err(SignatureParseError::MissingHeader);
        }

        let mut timestamp = None;
        let mut v1_signature = None;

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| SignatureParseError::InvalidTimestamp)?,
                    );
                }
                "v1" => {
                    v1_signature = Some(
                        hex_decode(value.trim())
                            .ok_or(SignatureParseError::InvalidSignatureFormat)?,
                    );
                }
                _ => {}
            }
        }

        Ok(Self {
            timestamp: timestamp.ok_or(SignatureParseError::MissingTimestamp)?,
            v1_signature: v1_signature.ok_or(SignatureParseError::MissingV1Signature)?,
        })
    }
}

/// Decodes a hex string to bytes. Returns `None` on any malformed input.
pub(crate) fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        bytes.push(u8::from_str_radix(hex.get(i..i + 2)?, 16).ok()?);
    }
    Some(bytes)
}

/// Encodes bytes as lowercase hex.
pub(crate) fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Webhook event envelope as Stripe posts it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeWebhookEvent {
    /// Event id (evt_...).
    pub id: String,

    /// Dotted event type, e.g. `checkout.session.completed`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp when Stripe created the event.
    pub created: i64,

    /// Payload container holding the affected object.
    pub data: StripeEventData,

    /// False for test-mode events.
    #[serde(default)]
    pub livemode: bool,
}

/// Payload container inside the event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

/// Checkout session object, from webhooks and the sessions API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeCheckoutSession {
    /// Session id (cs_...).
    pub id: String,

    /// Hosted checkout URL. Absent once the session completes.
    pub url: Option<String>,

    /// `payment` for one-time purchases, `subscription` for recurring.
    pub mode: String,

    /// Customer reference, when Stripe created or attached one.
    pub customer: Option<String>,

    /// Subscription created by the session, recurring mode only.
    pub subscription: Option<String>,

    /// Metadata this application attached when creating the session.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Subscription object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeSubscription {
    /// Subscription id (sub_...).
    pub id: String,

    /// Owning customer (cus_...).
    pub customer: String,

    /// Stripe status string, e.g. `active`, `past_due`, `canceled`.
    pub status: String,

    /// Current period start (Unix seconds).
    pub current_period_start: i64,

    /// Current period end (Unix seconds).
    pub current_period_end: i64,

    /// Whether the subscription ends at the period boundary.
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

/// Invoice object, read only for its subscription reference.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeInvoice {
    /// Invoice id (in_...).
    pub id: String,

    /// Owning customer.
    pub customer: String,

    /// Subscription the invoice bills, absent for one-off invoices.
    pub subscription: Option<String>,
}
