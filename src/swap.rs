//! Swap order memo codec
//!
//! A swap request travels to the swap service inside the memo of the payment
//! that funds it. The order record is packed into a compact binary layout and
//! sealed to the service's group public key:
//!
//! ```text
//! memo   = base64( version:u8 | ephemeral_public:32 | aes256gcm(record) )
//! record = action:u8 | receiver_id:16 | trace_id:16 | fill_asset | route | minimum
//! ```
//!
//! String fields are u16 big-endian length prefixed. The Ed25519 group key is
//! mapped to its X25519 form; an X25519 agreement with an ephemeral key gives
//! the AES-256-GCM key, so only the holder of the group secret can open the
//! memo. The ephemeral secret is derived from the group key and the record,
//! so encoding is a pure function of its inputs.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use uuid::Uuid;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::SwapBotError;
use crate::Result;

pub const MEMO_VERSION: u8 = 1;
const ACTION_SWAP: u8 = 3;
const EPHEMERAL_LEN: usize = 32;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + EPHEMERAL_LEN;

/// Decimal places the swap protocol accepts
pub const MINIMUM_OUTPUT_MAX_SCALE: u32 = 8;

/// Largest representable minimum output
pub fn minimum_output_ceiling() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

/// Decoded order record
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub receiver_id: Uuid,
    pub trace_id: Uuid,
    pub fill_asset_id: String,
    pub route_hint: String,
    pub minimum_output: Decimal,
}

/// Encode a swap order into a memo sealed to `group_public_key`.
pub fn encode(
    receiver_id: Uuid,
    trace_id: Uuid,
    fill_asset_id: &str,
    route_hint: &str,
    minimum_output: Decimal,
    group_public_key: &str,
) -> Result<String> {
    let group = parse_group_key(group_public_key)?;
    let minimum_output = validate_minimum_output(minimum_output)?;

    let mut record = Vec::with_capacity(96);
    record.push(ACTION_SWAP);
    record.extend_from_slice(receiver_id.as_bytes());
    record.extend_from_slice(trace_id.as_bytes());
    put_str(&mut record, fill_asset_id)?;
    put_str(&mut record, route_hint)?;
    put_str(&mut record, &minimum_output.to_string())?;

    let group_x = PublicKey::from(group.to_montgomery().to_bytes());
    let ephemeral = StaticSecret::from(derive_bytes(
        b"swapbot/memo/ephemeral",
        &[&group.as_bytes()[..], &record[..]],
    ));
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(&group_x);
    if !shared.was_contributory() {
        return Err(SwapBotError::InvalidKey("group key has low order".to_string()));
    }

    let sealed = cipher(shared.as_bytes(), &ephemeral_public, &group_x)?
        .encrypt(&nonce(&ephemeral_public), record.as_slice())
        .map_err(|e| SwapBotError::InvalidKey(format!("sealing failed: {}", e)))?;

    let mut memo = Vec::with_capacity(HEADER_LEN + sealed.len());
    memo.push(MEMO_VERSION);
    memo.extend_from_slice(ephemeral_public.as_bytes());
    memo.extend_from_slice(&sealed);

    Ok(STANDARD.encode(memo))
}

/// Open a memo produced by [`encode`]. Needs the group's secret key.
pub fn decode(memo: &str, group_secret: &SigningKey) -> Result<OrderRecord> {
    let bytes = STANDARD.decode(memo.as_bytes())?;

    if bytes.len() < HEADER_LEN + TAG_LEN || bytes[0] != MEMO_VERSION {
        return Err(SwapBotError::MalformedEvent("not a swap memo".to_string()));
    }

    let mut ephemeral = [0u8; EPHEMERAL_LEN];
    ephemeral.copy_from_slice(&bytes[1..HEADER_LEN]);
    let ephemeral_public = PublicKey::from(ephemeral);

    let secret = StaticSecret::from(group_secret.to_scalar_bytes());
    let group_x = PublicKey::from(&secret);
    let shared = secret.diffie_hellman(&ephemeral_public);

    let record = cipher(shared.as_bytes(), &ephemeral_public, &group_x)?
        .decrypt(&nonce(&ephemeral_public), &bytes[HEADER_LEN..])
        .map_err(|_| SwapBotError::InvalidKey("memo was not sealed for this key".to_string()))?;

    let mut reader = Reader::new(&record);
    if reader.take(1)?[0] != ACTION_SWAP {
        return Err(SwapBotError::MalformedEvent("unsupported memo action".to_string()));
    }

    let receiver_id = Uuid::from_slice(reader.take(16)?)?;
    let trace_id = Uuid::from_slice(reader.take(16)?)?;
    let fill_asset_id = reader.string()?;
    let route_hint = reader.string()?;
    let minimum_output = Decimal::from_str(&reader.string()?)
        .map_err(|e| SwapBotError::MalformedEvent(format!("minimum output: {}", e)))?;

    Ok(OrderRecord {
        receiver_id,
        trace_id,
        fill_asset_id,
        route_hint,
        minimum_output,
    })
}

/// Group keys are base64 encoded 32-byte Ed25519 public keys.
pub fn parse_group_key(group_public_key: &str) -> Result<VerifyingKey> {
    let bytes = STANDARD
        .decode(group_public_key.trim().as_bytes())
        .map_err(|e| SwapBotError::InvalidKey(format!("not base64: {}", e)))?;

    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| SwapBotError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;

    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| SwapBotError::InvalidKey(format!("not an ed25519 point: {}", e)))
}

/// Normalized minimum output, or `AmountOutOfRange`.
pub fn validate_minimum_output(minimum_output: Decimal) -> Result<Decimal> {
    if minimum_output <= Decimal::ZERO {
        return Err(SwapBotError::AmountOutOfRange(format!(
            "minimum output must be positive, got {}",
            minimum_output
        )));
    }

    let normalized = minimum_output.normalize();
    if normalized.scale() > MINIMUM_OUTPUT_MAX_SCALE {
        return Err(SwapBotError::AmountOutOfRange(format!(
            "minimum output {} has more than {} decimal places",
            minimum_output, MINIMUM_OUTPUT_MAX_SCALE
        )));
    }

    if normalized > minimum_output_ceiling() {
        return Err(SwapBotError::AmountOutOfRange(format!(
            "minimum output {} exceeds {}",
            minimum_output,
            minimum_output_ceiling()
        )));
    }

    Ok(normalized)
}

fn put_str(buf: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len())
        .map_err(|_| SwapBotError::MalformedEvent(format!("order field too long ({} bytes)", value.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

fn derive_bytes(label: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    for part in parts {
        hasher.update((part.len() as u32).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn cipher(shared: &[u8; 32], ephemeral: &PublicKey, group: &PublicKey) -> Result<Aes256Gcm> {
    let key = derive_bytes(
        b"swapbot/memo/key",
        &[&shared[..], &ephemeral.as_bytes()[..], &group.as_bytes()[..]],
    );
    Aes256Gcm::new_from_slice(&key).map_err(|e| SwapBotError::InvalidKey(e.to_string()))
}

// Every memo has its own ephemeral key, so the nonce only has to be unique per key
fn nonce(ephemeral: &PublicKey) -> Nonce<U12> {
    let digest = derive_bytes(b"swapbot/memo/nonce", &[&ephemeral.as_bytes()[..]]);
    Nonce::<U12>::clone_from_slice(&digest[..12])
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(SwapBotError::MalformedEvent("truncated swap memo".to_string()));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.take(2)?;
        let len = u16::from_be_bytes([len[0], len[1]]) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| SwapBotError::MalformedEvent(format!("memo field is not utf-8: {}", e)))
    }
}
