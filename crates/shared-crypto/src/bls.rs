//! BLS12-381 collective signatures.
//!
//! Provides the primitives behind the two-round committee co-signature:
//! - Key generation, sign/verify
//! - Public key aggregation (recovering the quorum key from a bitmap)
//! - Signature aggregation
//! - `multi_sig_verify`: one verification of an aggregated signature
//!   against an aggregated public key

use blst::min_pk::{AggregatePublicKey, AggregateSignature, PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;
use rand::RngCore;
use zeroize::Zeroize;

use crate::CryptoError;

/// Domain separation tag for BLS signatures (Ethereum 2.0 compatible)
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed public key size in bytes.
pub const PUBKEY_SIZE: usize = 48;

/// Compressed signature size in bytes.
pub const SIGNATURE_SIZE: usize = 96;

/// BLS secret key wrapper (32 bytes)
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct BlsSecretKey([u8; 32]);

impl BlsSecretKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(*bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// BLS public key (48 bytes compressed)
#[derive(Clone, Debug)]
pub struct BlsPublicKey(PublicKey);

impl PartialEq for BlsPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsPublicKey {}

/// BLS signature (96 bytes compressed)
#[derive(Clone, Debug)]
pub struct BlsSignature(Signature);

impl PartialEq for BlsSignature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlsSignature {}

/// BLS key pair for signing operations
pub struct BlsKeyPair {
    secret: SecretKey,
    public: BlsPublicKey,
}

impl BlsKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let mut ikm = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut ikm);
        let secret = SecretKey::key_gen(&ikm, &[]).expect("valid IKM");
        let public = BlsPublicKey(secret.sk_to_pk());
        Self { secret, public }
    }

    /// Create from existing secret key bytes
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let public = BlsPublicKey(secret.sk_to_pk());
        Ok(Self { secret, public })
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> BlsSignature {
        BlsSignature(self.secret.sign(message, DST, &[]))
    }

    /// Get the public key
    pub fn public_key(&self) -> BlsPublicKey {
        self.public.clone()
    }
}

impl BlsPublicKey {
    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &BlsSignature) -> bool {
        signature.0.verify(true, message, DST, &[], &self.0, true) == BLST_ERROR::BLST_SUCCESS
    }

    /// Create from 48-byte compressed representation
    pub fn from_bytes(bytes: &[u8; PUBKEY_SIZE]) -> Result<Self, CryptoError> {
        PublicKey::from_bytes(bytes)
            .map(BlsPublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Serialize to 48-byte compressed form
    pub fn to_bytes(&self) -> [u8; PUBKEY_SIZE] {
        self.0.to_bytes()
    }

    /// Aggregate multiple public keys into the quorum key.
    ///
    /// The aggregated key verifies signatures aggregated from exactly the
    /// same key set.
    pub fn aggregate(keys: &[BlsPublicKey]) -> Result<Self, CryptoError> {
        if keys.is_empty() {
            return Err(CryptoError::InvalidInput("empty key list".into()));
        }
        let refs: Vec<&PublicKey> = keys.iter().map(|k| &k.0).collect();
        AggregatePublicKey::aggregate(&refs, true)
            .map(|apk| BlsPublicKey(apk.to_public_key()))
            .map_err(|_| CryptoError::AggregationFailed)
    }
}

impl BlsSignature {
    /// Create from 96-byte compressed representation
    pub fn from_bytes(bytes: &[u8; SIGNATURE_SIZE]) -> Result<Self, CryptoError> {
        Signature::from_bytes(bytes)
            .map(BlsSignature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Serialize to 96-byte compressed form
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        self.0.to_bytes()
    }

    /// Aggregate multiple signatures over the *same* message into one
    pub fn aggregate(sigs: &[BlsSignature]) -> Result<Self, CryptoError> {
        if sigs.is_empty() {
            return Err(CryptoError::InvalidInput("empty signature list".into()));
        }
        let refs: Vec<&Signature> = sigs.iter().map(|s| &s.0).collect();
        AggregateSignature::aggregate(&refs, true)
            .map(|asig| BlsSignature(asig.to_signature()))
            .map_err(|_| CryptoError::AggregationFailed)
    }
}

/// Verify a collective signature.
///
/// `aggregated_key` must be the aggregate of exactly the public keys whose
/// holders contributed to `signature`; each contributor signed `message`.
pub fn multi_sig_verify(
    message: &[u8],
    signature: &BlsSignature,
    aggregated_key: &BlsPublicKey,
) -> bool {
    aggregated_key.verify(message, signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bls_sign_verify_roundtrip() {
        let keypair = BlsKeyPair::generate();
        let message = b"test message";
        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature));
    }

    #[test]
    fn test_bls_wrong_message_rejected() {
        let keypair = BlsKeyPair::generate();
        let signature = keypair.sign(b"test message");
        assert!(!keypair.public_key().verify(b"wrong message", &signature));
    }

    #[test]
    fn test_bls_different_key_rejected() {
        let keypair1 = BlsKeyPair::generate();
        let keypair2 = BlsKeyPair::generate();
        let message = b"test message";
        let signature = keypair1.sign(message);
        assert!(!keypair2.public_key().verify(message, &signature));
    }

    #[test]
    fn test_multi_sig_verify() {
        let kp1 = BlsKeyPair::generate();
        let kp2 = BlsKeyPair::generate();
        let kp3 = BlsKeyPair::generate();
        let message = b"same message for all signers";

        let agg_sig =
            BlsSignature::aggregate(&[kp1.sign(message), kp2.sign(message), kp3.sign(message)])
                .unwrap();
        let agg_pk = BlsPublicKey::aggregate(&[
            kp1.public_key(),
            kp2.public_key(),
            kp3.public_key(),
        ])
        .unwrap();

        assert!(multi_sig_verify(message, &agg_sig, &agg_pk));

        // Aggregate key over a different signer subset must not verify
        let wrong_pk = BlsPublicKey::aggregate(&[kp1.public_key(), kp2.public_key()]).unwrap();
        assert!(!multi_sig_verify(message, &agg_sig, &wrong_pk));
    }

    #[test]
    fn test_bls_aggregate_empty_fails() {
        assert!(BlsSignature::aggregate(&[]).is_err());
        assert!(BlsPublicKey::aggregate(&[]).is_err());
    }

    #[test]
    fn test_bls_serialization_roundtrip() {
        let keypair = BlsKeyPair::generate();
        let message = b"test message";
        let signature = keypair.sign(message);

        let pk_restored = BlsPublicKey::from_bytes(&keypair.public_key().to_bytes()).unwrap();
        assert_eq!(keypair.public_key(), pk_restored);

        let sig_restored = BlsSignature::from_bytes(&signature.to_bytes()).unwrap();
        assert_eq!(signature, sig_restored);

        assert!(pk_restored.verify(message, &sig_restored));
    }

    #[test]
    fn test_bls_from_secret_bytes() {
        let keypair1 = BlsKeyPair::generate();
        let secret = BlsSecretKey::from_bytes(&keypair1.secret.to_bytes());
        let keypair2 = BlsKeyPair::from_secret_bytes(secret.as_bytes()).unwrap();

        assert_eq!(keypair1.public_key(), keypair2.public_key());
        assert_eq!(keypair1.sign(b"test"), keypair2.sign(b"test"));
    }
}
