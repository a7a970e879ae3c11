//! Oracle key set and signed tickets.
//!
//! ## Ticket format
//!
//! ```text
//! hex(header) "." hex(payload) "." hex(sig_1) "~" hex(sig_2) ...
//! ```
//!
//! The header is `{"alg":"EdDSA","typ":"JWT"}`, the payload is the JSON of
//! one oracle payload type, and every signature is an ed25519 signature
//! over `hex(header) "." hex(payload)`. A ticket is accepted when at least
//! `threshold` distinct registered keys produced a valid signature, its
//! signed `kind` is the action being performed, and its `exp` is later
//! than the block time. Payloads reject unknown fields.
//!
//! ## Example
//!
//! ```
//! use ed25519_dalek::SigningKey;
//! use wagerbook::ovm::{sign_ticket, decode_ticket, OvmKeySet, public_key_hex};
//! use wagerbook::types::msgs::{CloseMarketPayload, TicketKind};
//!
//! let oracle = SigningKey::from_bytes(&[7u8; 32]);
//! let keys = OvmKeySet::new(vec![public_key_hex(&oracle)], 1).unwrap();
//!
//! let payload = CloseMarketPayload {
//!     kind: TicketKind::CancelMarket,
//!     uid: "m1".into(),
//!     reason: "weather".into(),
//!     exp: 100,
//! };
//! let ticket = sign_ticket(&payload, &[oracle]).unwrap();
//!
//! let back: CloseMarketPayload =
//!     decode_ticket(&keys, &ticket, 50, TicketKind::CancelMarket).unwrap();
//! assert_eq!(back, payload);
//!
//! // the same ticket can not abort the market
//! assert!(decode_ticket::<CloseMarketPayload>(&keys, &ticket, 50, TicketKind::AbortMarket).is_err());
//! ```

use std::collections::BTreeSet;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::Ctx;
use crate::error::{EngineError, Result};
use crate::store::{get_value, keys, KvStore};
use crate::types::msgs::{
    AddMarketPayload, BetTicketPayload, CloseMarketPayload, MsgOracle, ResolveMarketPayload,
    TicketKind, UpdateMarketPayload, UpdateOvmKeysPayload,
};
use crate::types::Event;

const TICKET_ALG: &str = "EdDSA";
const TICKET_TYP: &str = "JWT";
const SIGNATURE_SEPARATOR: &str = "~";

#[derive(Debug, Serialize, Deserialize)]
struct TicketHeader {
    alg: String,
    typ: String,
}

/// Payload carried inside a signed ticket.
pub trait TicketPayload: DeserializeOwned {
    /// Unix seconds after which the ticket is rejected.
    fn expiration(&self) -> u64;

    /// Action the ticket was issued for.
    fn kind(&self) -> TicketKind;
}

macro_rules! impl_ticket_payload {
    ($($ty:ty),* $(,)?) => {
        $(impl TicketPayload for $ty {
            fn expiration(&self) -> u64 {
                self.exp
            }

            fn kind(&self) -> TicketKind {
                self.kind
            }
        })*
    };
}

impl_ticket_payload!(
    AddMarketPayload,
    UpdateMarketPayload,
    ResolveMarketPayload,
    CloseMarketPayload,
    UpdateOvmKeysPayload,
    BetTicketPayload,
);

// ============================================================================
// Key set
// ============================================================================

/// Registered oracle public keys (hex, 32 bytes) and signature threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvmKeySet {
    pub keys: Vec<String>,
    pub threshold: u32,
}

impl OvmKeySet {
    /// Validated, sorted and deduplicated key set.
    pub fn new(keys: Vec<String>, threshold: u32) -> Result<Self> {
        let mut unique = BTreeSet::new();
        for key in keys {
            parse_public_key(&key)?;
            unique.insert(key.to_lowercase());
        }
        let set = Self {
            keys: unique.into_iter().collect(),
            threshold,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn validate(&self) -> Result<()> {
        if self.threshold == 0 {
            return Err(EngineError::ParamOutOfRange {
                param: "ovm.threshold",
                reason: "must be at least one".into(),
            });
        }
        if (self.keys.len() as u64) < self.threshold as u64 {
            return Err(EngineError::ParamOutOfRange {
                param: "ovm.keys",
                reason: format!(
                    "{} keys can not meet threshold {}",
                    self.keys.len(),
                    self.threshold
                ),
            });
        }
        Ok(())
    }

    fn verifying_keys(&self) -> Result<Vec<VerifyingKey>> {
        self.keys.iter().map(|k| parse_public_key(k)).collect()
    }
}

/// Hex form of a signer's public key, as registered in the key set.
pub fn public_key_hex(signer: &SigningKey) -> String {
    hex::encode(signer.verifying_key().as_bytes())
}

fn parse_public_key(key: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(key)
        .map_err(|e| EngineError::TicketInvalid(format!("public key {}: {}", key, e)))?;
    let array: [u8; 32] = bytes.try_into().map_err(|_| {
        EngineError::TicketInvalid(format!("public key {} is not 32 bytes", key))
    })?;
    VerifyingKey::from_bytes(&array)
        .map_err(|e| EngineError::TicketInvalid(format!("public key {}: {}", key, e)))
}

/// Current key set; an engine without one rejects every ticket.
pub fn load_keys(store: &dyn KvStore) -> Result<OvmKeySet> {
    get_value(store, &keys::ovm_keys()?)?
        .ok_or_else(|| EngineError::TicketInvalid("no oracle keys registered".into()))
}

pub fn store_keys(ctx: &mut Ctx<'_>, set: &OvmKeySet) -> Result<()> {
    set.validate()?;
    ctx.set(keys::ovm_keys()?, set)
}

// ============================================================================
// Tickets
// ============================================================================

/// Sign `payload` with every key in `signers`.
pub fn sign_ticket<T: Serialize>(payload: &T, signers: &[SigningKey]) -> Result<String> {
    let header = TicketHeader {
        alg: TICKET_ALG.into(),
        typ: TICKET_TYP.into(),
    };
    let header_json = serde_json::to_vec(&header)
        .map_err(|e| EngineError::TicketInvalid(e.to_string()))?;
    let payload_json = serde_json::to_vec(payload)
        .map_err(|e| EngineError::TicketInvalid(e.to_string()))?;

    let signing_input = format!("{}.{}", hex::encode(header_json), hex::encode(payload_json));
    let signatures: Vec<String> = signers
        .iter()
        .map(|k| hex::encode(k.sign(signing_input.as_bytes()).to_bytes()))
        .collect();

    Ok(format!(
        "{}.{}",
        signing_input,
        signatures.join(SIGNATURE_SEPARATOR)
    ))
}

/// Verify a ticket against `keys` and decode its payload, which must have
/// been issued for `expected`.
pub fn decode_ticket<T: TicketPayload>(
    keys: &OvmKeySet,
    ticket: &str,
    now: u64,
    expected: TicketKind,
) -> Result<T> {
    let mut parts = ticket.split('.');
    let (header_hex, payload_hex, sigs) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s), None) if !h.is_empty() && !p.is_empty() && !s.is_empty() => {
            (h, p, s)
        }
        _ => return Err(EngineError::TicketInvalid("expected header.payload.signatures".into())),
    };

    let header: TicketHeader = decode_json(header_hex, "header")?;
    if header.alg != TICKET_ALG {
        return Err(EngineError::TicketInvalid(format!(
            "unsupported algorithm {}",
            header.alg
        )));
    }

    let signatures = sigs
        .split(SIGNATURE_SEPARATOR)
        .map(parse_signature)
        .collect::<Result<Vec<_>>>()?;

    let signing_input = &ticket[..header_hex.len() + 1 + payload_hex.len()];
    let valid = keys
        .verifying_keys()?
        .iter()
        .filter(|key| {
            signatures
                .iter()
                .any(|sig| key.verify(signing_input.as_bytes(), sig).is_ok())
        })
        .count() as u32;

    if valid < keys.threshold {
        return Err(EngineError::TicketSignatureThresholdUnmet {
            valid,
            threshold: keys.threshold,
        });
    }

    let payload: T = decode_json(payload_hex, "payload")?;
    if payload.kind() != expected {
        return Err(EngineError::TicketInvalid(format!(
            "ticket issued for {}, not {}",
            payload.kind(),
            expected
        )));
    }
    if payload.expiration() <= now {
        return Err(EngineError::TicketExpired {
            expiration: payload.expiration(),
            now,
        });
    }
    debug!(valid, threshold = keys.threshold, "ticket verified");
    Ok(payload)
}

/// Verify a ticket against the registered key set at the current block time.
pub fn verify_ticket<T: TicketPayload>(ctx: &Ctx<'_>, ticket: &str, expected: TicketKind) -> Result<T> {
    let keys = load_keys(&*ctx.store)?;
    decode_ticket(&keys, ticket, ctx.now(), expected)
}

fn decode_json<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = hex::decode(segment)
        .map_err(|e| EngineError::TicketInvalid(format!("{} encoding: {}", what, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::TicketInvalid(format!("{}: {}", what, e)))
}

fn parse_signature(segment: &str) -> Result<Signature> {
    let bytes = hex::decode(segment)
        .map_err(|e| EngineError::TicketInvalid(format!("signature encoding: {}", e)))?;
    let array: [u8; 64] = bytes
        .try_into()
        .map_err(|_| EngineError::TicketInvalid("signature is not 64 bytes".into()))?;
    Ok(Signature::from_bytes(&array))
}

// ============================================================================
// Handler
// ============================================================================

/// Replace the oracle key set. The current set must sign the change.
pub fn update_keys(ctx: &mut Ctx<'_>, msg: &MsgOracle) -> Result<()> {
    let current = load_keys(&*ctx.store)?;
    let payload: UpdateOvmKeysPayload =
        decode_ticket(&current, &msg.ticket, ctx.now(), TicketKind::UpdateOvmKeys)?;

    let removed: BTreeSet<String> = payload.remove.iter().map(|k| k.to_lowercase()).collect();
    let mut next: Vec<String> = current
        .keys
        .iter()
        .filter(|k| !removed.contains(*k))
        .cloned()
        .collect();
    next.extend(payload.add.iter().cloned());

    let updated = OvmKeySet::new(next, current.threshold)?;
    store_keys(ctx, &updated)?;

    info!(
        creator = %msg.creator,
        added = payload.add.len(),
        removed = payload.remove.len(),
        key_count = updated.keys.len(),
        "oracle keys updated"
    );
    ctx.emit(Event::OvmKeysUpdated {
        key_count: updated.keys.len() as u32,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn key_set(seeds: &[u8], threshold: u32) -> OvmKeySet {
        OvmKeySet::new(seeds.iter().map(|s| public_key_hex(&signer(*s))).collect(), threshold).unwrap()
    }

    fn payload(exp: u64) -> CloseMarketPayload {
        CloseMarketPayload {
            kind: TicketKind::CancelMarket,
            uid: "m1".into(),
            reason: String::new(),
            exp,
        }
    }

    #[test]
    fn test_threshold_met_by_distinct_keys() {
        let keys = key_set(&[1, 2, 3], 2);
        let ticket = sign_ticket(&payload(100), &[signer(1), signer(3)]).unwrap();
        let decoded: CloseMarketPayload = decode_ticket(&keys, &ticket, 10, TicketKind::CancelMarket).unwrap();
        assert_eq!(decoded.uid, "m1");
    }

    #[test]
    fn test_duplicate_signature_counts_once() {
        let keys = key_set(&[1, 2, 3], 2);
        let ticket = sign_ticket(&payload(100), &[signer(1), signer(1)]).unwrap();
        let err = decode_ticket::<CloseMarketPayload>(&keys, &ticket, 10, TicketKind::CancelMarket).unwrap_err();
        assert!(matches!(
            err,
            EngineError::TicketSignatureThresholdUnmet { valid: 1, threshold: 2 }
        ));
    }

    #[test]
    fn test_unregistered_signer_is_ignored() {
        let keys = key_set(&[1], 1);
        let ticket = sign_ticket(&payload(100), &[signer(9)]).unwrap();
        let err = decode_ticket::<CloseMarketPayload>(&keys, &ticket, 10, TicketKind::CancelMarket).unwrap_err();
        assert_eq!(err.code(), "TICKET_SIGNATURE_THRESHOLD_UNMET");
    }

    #[test]
    fn test_expired_ticket() {
        let keys = key_set(&[1], 1);
        let ticket = sign_ticket(&payload(100), &[signer(1)]).unwrap();
        let err = decode_ticket::<CloseMarketPayload>(&keys, &ticket, 100, TicketKind::CancelMarket).unwrap_err();
        assert_eq!(err.code(), "TICKET_EXPIRED");
    }

    #[test]
    fn test_tampered_payload_fails_signature() {
        let keys = key_set(&[1], 1);
        let ticket = sign_ticket(&payload(100), &[signer(1)]).unwrap();
        let forged_payload = hex::encode(serde_json::to_vec(&payload(999)).unwrap());
        let parts: Vec<&str> = ticket.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        let err = decode_ticket::<CloseMarketPayload>(&keys, &forged, 10, TicketKind::CancelMarket).unwrap_err();
        assert_eq!(err.code(), "TICKET_SIGNATURE_THRESHOLD_UNMET");
    }

    #[test]
    fn test_malformed_tickets() {
        let keys = key_set(&[1], 1);
        for ticket in ["", "abc", "a.b", "zz.zz.zz", "00.00.00.00"] {
            let err = decode_ticket::<CloseMarketPayload>(&keys, ticket, 0, TicketKind::CancelMarket).unwrap_err();
            assert_eq!(err.code(), "TICKET_INVALID", "ticket {:?}", ticket);
        }
    }

    #[test]
    fn test_wrong_payload_type_is_invalid() {
        let keys = key_set(&[1], 1);
        let ticket = sign_ticket(&payload(100), &[signer(1)]).unwrap();
        let err = decode_ticket::<ResolveMarketPayload>(&keys, &ticket, 0, TicketKind::ResolveMarket)
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_INVALID");
    }

    #[test]
    fn test_ticket_only_valid_for_its_kind() {
        let keys = key_set(&[1], 1);
        let cancel = sign_ticket(&payload(100), &[signer(1)]).unwrap();
        let err = decode_ticket::<CloseMarketPayload>(&keys, &cancel, 0, TicketKind::AbortMarket)
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_INVALID");

        let resolve = ResolveMarketPayload {
            kind: TicketKind::ResolveMarket,
            uid: "m1".into(),
            winner_odds_uid: "a".into(),
            resolution_ts: 5,
            exp: 100,
        };
        let ticket = sign_ticket(&resolve, &[signer(1)]).unwrap();
        for expected in [TicketKind::CancelMarket, TicketKind::AbortMarket] {
            let err = decode_ticket::<CloseMarketPayload>(&keys, &ticket, 0, expected).unwrap_err();
            assert_eq!(err.code(), "TICKET_INVALID");
        }
        let err = decode_ticket::<UpdateOvmKeysPayload>(&keys, &ticket, 0, TicketKind::UpdateOvmKeys)
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_INVALID");
    }

    #[test]
    fn test_relabelled_kind_breaks_signature() {
        let keys = key_set(&[1], 1);
        let ticket = sign_ticket(&payload(100), &[signer(1)]).unwrap();
        let mut relabelled = payload(100);
        relabelled.kind = TicketKind::AbortMarket;
        let forged_payload = hex::encode(serde_json::to_vec(&relabelled).unwrap());
        let parts: Vec<&str> = ticket.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        let err = decode_ticket::<CloseMarketPayload>(&keys, &forged, 0, TicketKind::AbortMarket)
            .unwrap_err();
        assert_eq!(err.code(), "TICKET_SIGNATURE_THRESHOLD_UNMET");
    }

    #[test]
    fn test_key_set_validation() {
        assert!(OvmKeySet::new(vec![public_key_hex(&signer(1))], 0).is_err());
        assert!(OvmKeySet::new(vec![public_key_hex(&signer(1))], 2).is_err());
        assert!(OvmKeySet::new(vec!["nothex".into()], 1).is_err());

        // duplicates collapse
        let k = public_key_hex(&signer(1));
        let set = OvmKeySet::new(vec![k.clone(), k], 1).unwrap();
        assert_eq!(set.keys.len(), 1);
    }
}
