//! Roadmap vote ledger backed by a signed cookie.
//!
//! There is no server-side record of who voted. Each browser carries a
//! signed JSON map of its own votes; the server derives an opaque visitor
//! key from fingerprint + IP and allows one counted vote per key per item
//! per window. Best-effort anti-abuse: clearing cookies or rotating
//! IP/fingerprint defeats it.
//!
//! Cookie format: `base64url(json) "." hex(hmac-sha256(secret, json))`.
//! A missing, tampered, or unparsable cookie is treated as an empty ledger.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the vote ledger.
pub const VOTE_COOKIE: &str = "atrium_votes";

/// One remembered vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub key: String,
    pub direction: String,
    pub voted_at: String,
}

/// Per-browser vote history, keyed by roadmap item id.
pub type VoteLedger = HashMap<String, VoteRecord>;

/// Requested vote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOp {
    Up,
    Down,
    Remove,
}

impl VoteOp {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(VoteOp::Up),
            "down" => Ok(VoteOp::Down),
            "remove" => Ok(VoteOp::Remove),
            _ => Err(Error::InvalidInput(format!("Unknown vote operation: {}", s))),
        }
    }
}

/// Result of applying an operation to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Adjustment to apply to the item's denormalized counter.
    pub delta: i64,
}

#[derive(Clone)]
pub struct VoteService {
    secret: String,
    window: Duration,
}

impl VoteService {
    pub fn new(secret: String, window_days: i64) -> Self {
        Self {
            secret,
            window: Duration::days(window_days),
        }
    }

    /// Opaque visitor key: hex(HMAC-SHA256(secret, fingerprint ":" ip)).
    pub fn visitor_key(&self, fingerprint: &str, ip: &str) -> String {
        hex::encode(self.sign(format!("{}:{}", fingerprint, ip).as_bytes()))
    }

    /// Decode a signed cookie value. Anything invalid decodes as empty.
    pub fn decode_ledger(&self, cookie_value: Option<&str>) -> VoteLedger {
        let Some(value) = cookie_value else {
            return VoteLedger::new();
        };
        let Some((payload_b64, signature)) = value.rsplit_once('.') else {
            return VoteLedger::new();
        };
        let Ok(payload) = URL_SAFE_NO_PAD.decode(payload_b64) else {
            return VoteLedger::new();
        };
        if hex::encode(self.sign(&payload)) != signature {
            return VoteLedger::new();
        }
        serde_json::from_slice(&payload).unwrap_or_default()
    }

    /// Encode and sign a ledger for the cookie.
    pub fn encode_ledger(&self, ledger: &VoteLedger) -> String {
        // Serializing a map of plain strings cannot fail.
        let payload = serde_json::to_vec(ledger).unwrap_or_default();
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            hex::encode(self.sign(&payload))
        )
    }

    /// Apply one vote operation, mutating the ledger.
    ///
    /// At most one counted vote per visitor key per item per window.
    /// Within a live window any repeat vote is rejected, including one in
    /// the opposite direction; the window must lapse before switching.
    pub fn apply(
        &self,
        ledger: &mut VoteLedger,
        item_id: &str,
        visitor_key: &str,
        op: VoteOp,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome> {
        let live = ledger
            .get(item_id)
            .filter(|record| record.key == visitor_key && self.is_live(record, now))
            .cloned();

        match op {
            VoteOp::Up | VoteOp::Down => {
                if live.is_some() {
                    return Err(Error::Conflict(
                        "You have already voted on this item".to_string(),
                    ));
                }
                let direction = if op == VoteOp::Up { "up" } else { "down" };
                // Stale or foreign-key history is overwritten silently.
                ledger.insert(
                    item_id.to_string(),
                    VoteRecord {
                        key: visitor_key.to_string(),
                        direction: direction.to_string(),
                        voted_at: now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                    },
                );
                Ok(VoteOutcome {
                    delta: if op == VoteOp::Up { 1 } else { -1 },
                })
            }
            VoteOp::Remove => match live {
                Some(record) => {
                    ledger.remove(item_id);
                    Ok(VoteOutcome {
                        delta: if record.direction == "up" { -1 } else { 1 },
                    })
                }
                // Removing a vote that isn't there succeeds with no change.
                None => Ok(VoteOutcome { delta: 0 }),
            },
        }
    }

    fn is_live(&self, record: &VoteRecord, now: DateTime<Utc>) -> bool {
        match DateTime::parse_from_rfc3339(&record.voted_at) {
            Ok(voted_at) => now - voted_at.with_timezone(&Utc) < self.window,
            // Unparsable timestamps count as stale.
            Err(_) => false,
        }
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn service() -> VoteService {
        VoteService::new("test-secret".to_string(), 7)
    }

    #[test]
    fn test_cookie_roundtrip() {
        let svc = service();
        let mut ledger = VoteLedger::new();
        svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, Utc::now())
            .unwrap();

        let encoded = svc.encode_ledger(&ledger);
        let decoded = svc.decode_ledger(Some(&encoded));
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["item-1"].direction, "up");
    }

    #[test]
    fn test_tampered_cookie_decodes_empty() {
        let svc = service();
        let mut ledger = VoteLedger::new();
        svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, Utc::now())
            .unwrap();
        let encoded = svc.encode_ledger(&ledger);

        let (payload, _sig) = encoded.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", payload, "00".repeat(32));
        assert!(svc.decode_ledger(Some(&forged)).is_empty());
        assert!(svc.decode_ledger(Some("garbage")).is_empty());
        assert!(svc.decode_ledger(None).is_empty());
    }

    #[rstest]
    #[case(VoteOp::Up)]
    #[case(VoteOp::Down)]
    fn test_repeat_vote_rejected_within_window(#[case] second: VoteOp) {
        let svc = service();
        let mut ledger = VoteLedger::new();
        let now = Utc::now();

        let outcome = svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, now).unwrap();
        assert_eq!(outcome.delta, 1);

        // Same direction or a switch attempt, both rejected while live.
        let err = svc.apply(&mut ledger, "item-1", "key-a", second, now).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_window_lapse_allows_revote() {
        let svc = service();
        let mut ledger = VoteLedger::new();
        let then = Utc::now() - Duration::days(8);

        svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, then).unwrap();
        let outcome = svc
            .apply(&mut ledger, "item-1", "key-a", VoteOp::Down, Utc::now())
            .unwrap();
        assert_eq!(outcome.delta, -1);
        assert_eq!(ledger["item-1"].direction, "down");
    }

    #[test]
    fn test_remove_undoes_and_is_idempotent() {
        let svc = service();
        let mut ledger = VoteLedger::new();
        let now = Utc::now();

        svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, now).unwrap();
        let outcome = svc
            .apply(&mut ledger, "item-1", "key-a", VoteOp::Remove, now)
            .unwrap();
        assert_eq!(outcome.delta, -1);
        assert!(ledger.is_empty());

        // No live vote left, remove is a no-op success.
        let outcome = svc
            .apply(&mut ledger, "item-1", "key-a", VoteOp::Remove, now)
            .unwrap();
        assert_eq!(outcome.delta, 0);
    }

    #[test]
    fn test_foreign_key_history_overwritten() {
        let svc = service();
        let mut ledger = VoteLedger::new();
        let now = Utc::now();

        svc.apply(&mut ledger, "item-1", "key-a", VoteOp::Up, now).unwrap();

        // A different visitor key sees no live vote of its own.
        let outcome = svc.apply(&mut ledger, "item-1", "key-b", VoteOp::Up, now).unwrap();
        assert_eq!(outcome.delta, 1);
        assert_eq!(ledger["item-1"].key, "key-b");
    }

    #[test]
    fn test_visitor_key_is_stable_and_opaque() {
        let svc = service();
        let a = svc.visitor_key("fp", "1.2.3.4");
        let b = svc.visitor_key("fp", "1.2.3.4");
        let c = svc.visitor_key("fp", "5.6.7.8");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.contains("fp"));
    }
}
