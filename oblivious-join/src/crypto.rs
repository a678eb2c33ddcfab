//! The confidentiality collaborator (§6): AES-CTR over the portion of a
//! tuple outside `is_encrypted`, `nonce`, and the table's column-names array.
//! Confidentiality is not load-bearing for the join's correctness — only the
//! obliviousness of the core primitives is — so this module is a boundary
//! the core calls through, not something the core reasons about.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr64BE;
use thiserror::Error;

use crate::tuple::Tuple;

type Aes128Ctr = Ctr64BE<Aes128>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("tuple is already encrypted")]
    AlreadyEncrypted,
    #[error("tuple is not encrypted")]
    NotEncrypted,
}

/// A 128-bit AES key. Never implements `Debug`/`Display`; materialized
/// inside the trust boundary and never exported.
#[derive(Clone)]
pub struct Key([u8; 16]);

impl Key {
    pub fn new(bytes: [u8; 16]) -> Self {
        Key(bytes)
    }
}

/// Issues strictly increasing 64-bit nonces, one per `encrypt` call. Modeled
/// as an explicit context object per the design notes, rather than process
/// global state.
#[derive(Default)]
pub struct NonceCounter(u64);

impl NonceCounter {
    pub fn new() -> Self {
        NonceCounter(1)
    }

    fn next(&mut self) -> u64 {
        let n = self.0;
        self.0 = self.0.wrapping_add(1);
        n
    }
}

/// The byte ranges of a tuple that participate in AES-CTR, expressed as
/// offsets into a scratch plaintext buffer built from the tuple's fields
/// (everything except `is_encrypted` and `nonce`, which never change under
/// encryption).
fn plaintext_bytes(tuple: &Tuple) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + Tuple::attribute_byte_len());
    buf.push(tuple.field_type as u8);
    buf.push(tuple.equality_type as u8);
    buf.extend_from_slice(&tuple.join_attr.to_le_bytes());
    buf.extend_from_slice(&tuple.original_index.to_le_bytes());
    buf.extend_from_slice(&tuple.local_mult.to_le_bytes());
    buf.extend_from_slice(&tuple.final_mult.to_le_bytes());
    buf.extend_from_slice(&tuple.foreign_sum.to_le_bytes());
    buf.extend_from_slice(&tuple.local_cumsum.to_le_bytes());
    buf.extend_from_slice(&tuple.local_interval.to_le_bytes());
    buf.extend_from_slice(&tuple.foreign_interval.to_le_bytes());
    buf.extend_from_slice(&tuple.local_weight.to_le_bytes());
    buf.extend_from_slice(&tuple.copy_index.to_le_bytes());
    buf.extend_from_slice(&tuple.alignment_key.to_le_bytes());
    buf.extend_from_slice(&tuple.dst_idx.to_le_bytes());
    buf.extend_from_slice(&tuple.index.to_le_bytes());
    for attr in &tuple.attributes {
        buf.extend_from_slice(&attr.to_le_bytes());
    }
    buf
}

fn counter_block(nonce: u64) -> [u8; 16] {
    let mut ctr = [0u8; 16];
    ctr[..8].copy_from_slice(&nonce.to_le_bytes());
    ctr
}

/// Encrypts `tuple` in place, assigning it a fresh nonce from `counter`.
/// Fails with `AlreadyEncrypted` if the flag is already set.
pub fn encrypt(tuple: &mut Tuple, key: &Key, counter: &mut NonceCounter) -> Result<(), CryptoError> {
    if tuple.is_encrypted {
        return Err(CryptoError::AlreadyEncrypted);
    }
    let nonce = counter.next();
    let mut bytes = plaintext_bytes(tuple);
    let mut cipher = Aes128Ctr::new(&key.0.into(), &counter_block(nonce).into());
    cipher.apply_keystream(&mut bytes);
    write_back(tuple, &bytes);
    tuple.nonce = nonce;
    tuple.is_encrypted = true;
    Ok(())
}

/// Decrypts `tuple` in place using its stored nonce. Fails with
/// `NotEncrypted` if the flag is unset.
pub fn decrypt(tuple: &mut Tuple, key: &Key) -> Result<(), CryptoError> {
    if !tuple.is_encrypted {
        return Err(CryptoError::NotEncrypted);
    }
    let mut bytes = plaintext_bytes(tuple);
    let mut cipher = Aes128Ctr::new(&key.0.into(), &counter_block(tuple.nonce).into());
    cipher.apply_keystream(&mut bytes);
    write_back(tuple, &bytes);
    tuple.is_encrypted = false;
    Ok(())
}

fn write_back(tuple: &mut Tuple, bytes: &[u8]) {
    use crate::tuple::{EqualityType, FieldType};
    let mut off = 0usize;
    let read_u8 = |bytes: &[u8], off: &mut usize| {
        let v = bytes[*off];
        *off += 1;
        v
    };
    let read_i32 = |bytes: &[u8], off: &mut usize| {
        let v = i32::from_le_bytes(bytes[*off..*off + 4].try_into().unwrap());
        *off += 4;
        v
    };
    let read_u32 = |bytes: &[u8], off: &mut usize| {
        let v = u32::from_le_bytes(bytes[*off..*off + 4].try_into().unwrap());
        *off += 4;
        v
    };
    let read_i64 = |bytes: &[u8], off: &mut usize| {
        let v = i64::from_le_bytes(bytes[*off..*off + 8].try_into().unwrap());
        *off += 8;
        v
    };

    tuple.field_type = FieldType::from_u8(read_u8(bytes, &mut off));
    tuple.equality_type = EqualityType::from_u8(read_u8(bytes, &mut off));
    tuple.join_attr = read_i32(bytes, &mut off);
    tuple.original_index = read_u32(bytes, &mut off);
    tuple.local_mult = read_i64(bytes, &mut off);
    tuple.final_mult = read_i64(bytes, &mut off);
    tuple.foreign_sum = read_i64(bytes, &mut off);
    tuple.local_cumsum = read_i64(bytes, &mut off);
    tuple.local_interval = read_i64(bytes, &mut off);
    tuple.foreign_interval = read_i64(bytes, &mut off);
    tuple.local_weight = read_i64(bytes, &mut off);
    tuple.copy_index = read_i64(bytes, &mut off);
    tuple.alignment_key = read_i64(bytes, &mut off);
    tuple.dst_idx = read_i64(bytes, &mut off);
    tuple.index = read_i64(bytes, &mut off);
    for attr in tuple.attributes.iter_mut() {
        *attr = read_i64(bytes, &mut off);
    }
}
