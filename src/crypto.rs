//! Crypto facade (C1): SHA-256, HMAC, ECDSA-P256, ECDH, AES-256-CBC, RNG.
//!
//! This module wraps `sha2`/`hmac`/`p256`/`aes`/`cbc` the way the teacher
//! crate's `fido2.rs` wraps the same stack for the platform side of the
//! PIN protocol; here it backs the authenticator side instead.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{CtapError, Result};
use crate::oracles::Rng;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// SHA-256 over the concatenation of several byte slices.
pub fn sha256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// HMAC-SHA256, truncated to 16 bytes as CTAP2 pinAuth/pinUvAuthParam requires.
pub fn hmac_sha256_truncated16(key: &[u8], data: &[u8]) -> [u8; 16] {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let full = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// Deterministically derives a P-256 signing key from an arbitrary seed.
/// Used to turn a credential-id into the private key that created it,
/// so the authenticator never has to persist per-credential key material.
pub fn signing_key_from_seed(seed: &[u8]) -> SigningKey {
    let mut candidate: Vec<u8> = sha256(seed).to_vec();
    loop {
        if let Ok(secret) = SecretKey::from_slice(&candidate) {
            candidate.zeroize();
            return SigningKey::from(secret);
        }
        candidate = sha256(&candidate).to_vec();
    }
}

/// Public key (x, y) deterministically derived from a credential-id seed.
pub fn derive_pubkey_from_seed(seed: &[u8]) -> ([u8; 32], [u8; 32]) {
    let key = signing_key_from_seed(seed);
    let point = VerifyingKey::from(&key).to_encoded_point(false);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(point.x().expect("uncompressed point has x"));
    y.copy_from_slice(point.y().expect("uncompressed point has y"));
    (x, y)
}

/// Raw (r, s) ECDSA-P256 signature of a pre-hashed 32-byte digest.
pub fn sign_prehash(key: &SigningKey, digest: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let sig: Signature = key
        .sign_prehash(digest)
        .expect("signing a fixed-size digest cannot fail");
    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    (r, s)
}

/// Generates a fresh ephemeral P-256 keypair, returning the SEC1
/// uncompressed public point and the retained private key.
pub fn generate_keypair(rng: &mut dyn Rng) -> (SecretKey, [u8; 64]) {
    let mut seed = [0u8; 32];
    loop {
        rng.fill(&mut seed);
        if let Ok(secret) = SecretKey::from_slice(&seed) {
            let point = secret.public_key().to_encoded_point(false);
            let mut pub_bytes = [0u8; 64];
            pub_bytes[..32].copy_from_slice(point.x().unwrap());
            pub_bytes[32..].copy_from_slice(point.y().unwrap());
            seed.zeroize();
            return (secret, pub_bytes);
        }
    }
}

/// ECDH shared secret: SHA-256(x-coordinate of platform_pub^our_priv),
/// matching PIN protocol v1 (§4.6). `platform_pub_sec1` is platform-supplied
/// and not guaranteed to be a valid point on P-256, so parsing it is
/// fallible rather than a panic.
pub fn ecdh_shared_secret(our_priv: &SecretKey, platform_pub_sec1: &[u8]) -> Result<[u8; 32]> {
    let platform_pub = PublicKey::from_sec1_bytes(platform_pub_sec1)
        .map_err(|_| CtapError::InvalidParameter)?;
    let shared = p256::ecdh::diffie_hellman(
        our_priv.to_nonzero_scalar(),
        platform_pub.as_affine(),
    );
    Ok(sha256(shared.raw_secret_bytes().as_slice()))
}

/// AES-256-CBC, zero IV, no padding (PIN protocol v1 envelopes are always
/// block-size multiples). `reset_iv` models the facade's IV-reset knob: PIN
/// protocol v1 reuses one key for two independent ciphertexts in sequence
/// (e.g. newPinEnc then pinHashEnc in changePin) and resets to a zero IV
/// between them.
pub struct Aes256Cbc {
    key: [u8; 32],
}

impl Aes256Cbc {
    pub fn new(key: &[u8; 32]) -> Self {
        Aes256Cbc { key: *key }
    }

    pub fn encrypt_in_place(&self, data: &mut [u8]) {
        let iv = [0u8; 16];
        let cipher = Aes256CbcEnc::new(&self.key.into(), &iv.into());
        cipher
            .encrypt_padded_mut::<NoPadding>(data, data.len())
            .expect("PIN protocol v1 buffers are always block-aligned");
    }

    pub fn decrypt_in_place(&self, data: &mut [u8]) {
        let iv = [0u8; 16];
        let cipher = Aes256CbcDec::new(&self.key.into(), &iv.into());
        cipher
            .decrypt_padded_mut::<NoPadding>(data)
            .expect("PIN protocol v1 buffers are always block-aligned");
    }
}

impl Drop for Aes256Cbc {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Constant-time comparison for secrets (tags, PIN-hash prefixes, MACs).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}
