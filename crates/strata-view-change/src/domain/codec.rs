//! Deterministic wire codec for view-change consensus objects.
//!
//! Every honest node must serialize a block identically: the serialized
//! header feeds the self-hash and the co-signature message, and the
//! serialized block is what gets persisted and re-broadcast. The encoding
//! rules are:
//!
//! - unsigned integers: 1-byte length prefix, then minimal big-endian
//!   bytes (zero encodes as length 0);
//! - fixed-width fields raw: 32-byte hashes, 48-byte compressed public
//!   keys, 96-byte compressed signatures, 16-byte big-endian peer IPs;
//! - bitmaps: 2-byte big-endian bit count, then ceil(n/8) bytes packed
//!   MSB-first, unused trailing bits zero;
//! - timestamps: 8-byte big-endian.
//!
//! Decoding ignores trailing bytes, so a decoded block must be freshly
//! re-encoded before it is forwarded anywhere.

use shared_crypto::bls::{PUBKEY_SIZE, SIGNATURE_SIZE};
use shared_crypto::{BlsPublicKey, BlsSignature};
use shared_types::{Hash, Peer};

use super::committee::CommitteeMember;
use super::entities::{Bitmap, VcBlock, VcBlockHeader, ViewChangeState};
use super::errors::CodecError;

/// Frame tag for node-to-node messages.
pub const MSG_TYPE_NODE: u8 = 0x01;

/// Instruction tag for a view-change block body.
pub const NODE_INST_VC_BLOCK: u8 = 0x03;

/// Offset of the body within a `[type][instruction][body]` frame.
pub const BODY_OFFSET: usize = 2;

/// Upper bound on length-prefixed lists; matches the bitmap's u16 range.
const MAX_LIST_LEN: u64 = u16::MAX as u64;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Append an unsigned integer: length byte, then minimal big-endian bytes.
pub fn write_uint(out: &mut Vec<u8>, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = value.leading_zeros() as usize / 8;
    out.push((8 - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn write_peer(out: &mut Vec<u8>, peer: &Peer) {
    out.extend_from_slice(&peer.ip.to_be_bytes());
    write_uint(out, peer.port as u64);
}

fn write_member(out: &mut Vec<u8>, member: &CommitteeMember) {
    out.extend_from_slice(&member.pubkey.to_bytes());
    write_peer(out, &member.peer);
}

/// Append a participation bitmap: u16 big-endian bit count, then the bits
/// packed MSB-first with unused trailing bits zero.
pub fn write_bitmap(out: &mut Vec<u8>, bits: &Bitmap) {
    debug_assert!(bits.len() <= u16::MAX as usize);
    out.extend_from_slice(&(bits.len() as u16).to_be_bytes());
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out.extend_from_slice(&packed);
}

/// Serialize a header, fields in declaration order.
pub fn encode_header(header: &VcBlockHeader) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    write_uint(&mut out, header.version as u64);
    write_uint(&mut out, header.vc_ds_epoch);
    write_uint(&mut out, header.vc_epoch);
    out.push(header.state as u8);
    write_peer(&mut out, &header.candidate_leader_peer);
    out.extend_from_slice(&header.candidate_leader_pubkey.to_bytes());
    write_uint(&mut out, header.faulty_leaders.len() as u64);
    for leader in &header.faulty_leaders {
        write_member(&mut out, leader);
    }
    out.extend_from_slice(&header.committee_hash);
    out.extend_from_slice(&header.prev_hash);
    out
}

/// Serialize a full block: header, both co-signature rounds, timestamp,
/// canonical hash.
pub fn encode_block(block: &VcBlock) -> Vec<u8> {
    let mut out = encode_header(&block.header);
    out.extend_from_slice(&block.cs1.to_bytes());
    write_bitmap(&mut out, &block.b1);
    out.extend_from_slice(&block.cs2.to_bytes());
    write_bitmap(&mut out, &block.b2);
    out.extend_from_slice(&block.timestamp.to_be_bytes());
    out.extend_from_slice(&block.block_hash);
    out
}

/// Build a complete outgoing frame for the block.
pub fn encode_frame(block: &VcBlock) -> Vec<u8> {
    let mut frame = vec![MSG_TYPE_NODE, NODE_INST_VC_BLOCK];
    frame.extend_from_slice(&encode_block(block));
    frame
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::Truncated { at: self.pos });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn read_uint(&mut self) -> Result<u64, CodecError> {
        let len = self.read_u8()? as usize;
        if len > 8 {
            return Err(CodecError::IntegerTooWide { len });
        }
        let mut value = 0u64;
        for &byte in self.take(len)? {
            value = (value << 8) | byte as u64;
        }
        Ok(value)
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let value = self.read_uint()?;
        u32::try_from(value).map_err(|_| CodecError::IntegerTooWide { len: 8 })
    }

    fn read_hash(&mut self) -> Result<Hash, CodecError> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(self.take(32)?);
        Ok(hash)
    }

    fn read_pubkey(&mut self) -> Result<BlsPublicKey, CodecError> {
        let mut bytes = [0u8; PUBKEY_SIZE];
        bytes.copy_from_slice(self.take(PUBKEY_SIZE)?);
        Ok(BlsPublicKey::from_bytes(&bytes)?)
    }

    fn read_signature(&mut self) -> Result<BlsSignature, CodecError> {
        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(self.take(SIGNATURE_SIZE)?);
        Ok(BlsSignature::from_bytes(&bytes)?)
    }

    fn read_peer(&mut self) -> Result<Peer, CodecError> {
        let mut ip_bytes = [0u8; 16];
        ip_bytes.copy_from_slice(self.take(16)?);
        let port = self.read_u32()?;
        Ok(Peer::new(u128::from_be_bytes(ip_bytes), port))
    }

    fn read_bitmap(&mut self) -> Result<Bitmap, CodecError> {
        let mut count_bytes = [0u8; 2];
        count_bytes.copy_from_slice(self.take(2)?);
        let count = u16::from_be_bytes(count_bytes) as usize;
        let packed = self.take(count.div_ceil(8))?;
        let mut bits = Bitmap::with_capacity(count);
        for i in 0..count {
            bits.push(packed[i / 8] & (0x80 >> (i % 8)) != 0);
        }
        Ok(bits)
    }

    fn read_u64_be(&mut self) -> Result<u64, CodecError> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(bytes))
    }
}

fn decode_header_fields(reader: &mut ByteReader<'_>) -> Result<VcBlockHeader, CodecError> {
    let version = reader.read_u32()?;
    let vc_ds_epoch = reader.read_uint()?;
    let vc_epoch = reader.read_uint()?;
    let state_tag = reader.read_u8()?;
    let state = ViewChangeState::from_u8(state_tag).ok_or(CodecError::InvalidStateTag(state_tag))?;
    let candidate_leader_peer = reader.read_peer()?;
    let candidate_leader_pubkey = reader.read_pubkey()?;

    let leader_count = reader.read_uint()?;
    if leader_count > MAX_LIST_LEN {
        return Err(CodecError::ListTooLong(leader_count));
    }
    let mut faulty_leaders = Vec::with_capacity(leader_count as usize);
    for _ in 0..leader_count {
        let pubkey = reader.read_pubkey()?;
        let peer = reader.read_peer()?;
        faulty_leaders.push(CommitteeMember::new(pubkey, peer));
    }

    let committee_hash = reader.read_hash()?;
    let prev_hash = reader.read_hash()?;

    Ok(VcBlockHeader {
        version,
        vc_ds_epoch,
        vc_epoch,
        state,
        candidate_leader_peer,
        candidate_leader_pubkey,
        faulty_leaders,
        committee_hash,
        prev_hash,
    })
}

/// Decode a block starting at `offset` into `raw`. Trailing bytes beyond
/// the block are ignored.
pub fn decode_block(raw: &[u8], offset: usize) -> Result<VcBlock, CodecError> {
    if offset > raw.len() {
        return Err(CodecError::Truncated { at: raw.len() });
    }
    let mut reader = ByteReader::new(raw, offset);
    let header = decode_header_fields(&mut reader)?;
    let cs1 = reader.read_signature()?;
    let b1 = reader.read_bitmap()?;
    let cs2 = reader.read_signature()?;
    let b2 = reader.read_bitmap()?;
    let timestamp = reader.read_u64_be()?;
    let block_hash = reader.read_hash()?;

    Ok(VcBlock {
        header,
        cs1,
        b1,
        cs2,
        b2,
        timestamp,
        block_hash,
    })
}
