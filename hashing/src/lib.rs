use alloy_rlp::{BufMut, Encodable, Header};
use ethereum_types::{H256, U256};
use hex_literal::hex;
use tiny_keccak::{Hasher as _, Keccak};

/// Hash of an empty RLP list (`0xc0`).
///
/// This is the `uncles_hash` of every block without uncles and the root of every empty list of
/// transactions or receipts.
pub const EMPTY_LIST_HASH: H256 = H256(hex!(
    "1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"
));

#[inline]
#[must_use]
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    let mut hasher = Keccak::v256();
    let mut output = H256::zero();

    hasher.update(data.as_ref());
    hasher.finalize(output.as_bytes_mut());

    output
}

#[must_use]
pub fn hash_rlp(value: &impl Encodable) -> H256 {
    keccak256(alloy_rlp::encode(value))
}

/// Hashes the RLP list of `items`.
///
/// Roots of transactions, receipts and uncles are computed this way instead of with a
/// Merkle-Patricia trie.
#[must_use]
pub fn hash_list<E: Encodable>(items: &[E]) -> H256 {
    let mut encoded = Vec::new();
    alloy_rlp::encode_list::<E, E>(items, &mut encoded);
    keccak256(encoded)
}

/// Encodes heterogeneous `fields` as a single RLP list.
///
/// Containers implement [`Encodable`] by listing references to their fields and passing them here.
pub fn encode_fields(fields: &[&dyn Encodable], out: &mut dyn BufMut) {
    let header = Header {
        list: true,
        payload_length: payload_length(fields),
    };

    header.encode(out);

    for field in fields {
        field.encode(out);
    }
}

#[must_use]
pub fn fields_length(fields: &[&dyn Encodable]) -> usize {
    let payload_length = payload_length(fields);
    payload_length + alloy_rlp::length_of_length(payload_length)
}

fn payload_length(fields: &[&dyn Encodable]) -> usize {
    fields.iter().map(|field| field.length()).sum()
}

/// RLP encoding of a 256-bit unsigned integer: big-endian with leading zeros stripped.
#[derive(Clone, Copy)]
pub struct RlpUint(pub U256);

impl RlpUint {
    fn with_minimal_bytes<R>(self, consume: impl FnOnce(&[u8]) -> R) -> R {
        let mut bytes = [0; 32];
        self.0.to_big_endian(&mut bytes);

        let start = bytes
            .iter()
            .position(|byte| *byte != 0)
            .unwrap_or(bytes.len());

        consume(&bytes[start..])
    }
}

impl Encodable for RlpUint {
    fn encode(&self, out: &mut dyn BufMut) {
        self.with_minimal_bytes(|bytes| bytes.encode(out))
    }

    fn length(&self) -> usize {
        self.with_minimal_bytes(|bytes| bytes.length())
    }
}

/// RLP encoding of an arbitrary byte string.
///
/// `Vec<u8>` would be encoded as a list of integers.
#[derive(Clone, Copy)]
pub struct RlpBytes<'bytes>(pub &'bytes [u8]);

impl Encodable for RlpBytes<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        self.0.encode(out)
    }

    fn length(&self) -> usize {
        self.0.length()
    }
}
