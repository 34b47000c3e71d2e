//! Signing pipeline (C5): SHA-256(data || clientDataHash), ECDSA-P256 sign,
//! DER-encode (r, s). Ported from the reference `ctap_calculate_signature`
//! (solo1 `ctap.c`), which computes lengths rather than assuming fixed
//! sizes because leading zeros and the sign-padding byte are data-dependent.

use p256::ecdsa::SigningKey;

use crate::crypto::{sha256_concat, sign_prehash};

/// Signs `data || client_data_hash` under `key`, returning a DER-encoded
/// ECDSA signature (`SEQUENCE { INTEGER r, INTEGER s }`).
pub fn sign(key: &SigningKey, data: &[u8], client_data_hash: &[u8; 32]) -> Vec<u8> {
    let digest = sha256_concat(&[data, client_data_hash]);
    let (r, s) = sign_prehash(key, &digest);
    encode_der_signature(&r, &s)
}

/// Strips leading zero bytes and, if the remaining MSB is set, reinserts a
/// single `0x00` so the DER INTEGER reads as positive.
fn der_integer_body(x: &[u8; 32]) -> Vec<u8> {
    let first_nonzero = x.iter().position(|&b| b != 0).unwrap_or(31);
    let mut body = x[first_nonzero..].to_vec();
    if body[0] & 0x80 != 0 {
        body.insert(0, 0x00);
    }
    body
}

fn der_integer(x: &[u8; 32]) -> Vec<u8> {
    let body = der_integer_body(x);
    let mut out = Vec::with_capacity(2 + body.len());
    out.push(0x02);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    out
}

/// `SEQUENCE { INTEGER r, INTEGER s }`, with the total length recomputed
/// from the actual (stripped/padded) integer sizes.
pub fn encode_der_signature(r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    let r_tlv = der_integer(r);
    let s_tlv = der_integer(s);

    let mut out = Vec::with_capacity(2 + r_tlv.len() + s_tlv.len());
    out.push(0x30);
    out.push((r_tlv.len() + s_tlv.len()) as u8);
    out.extend_from_slice(&r_tlv);
    out.extend_from_slice(&s_tlv);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::Signature;

    #[test]
    fn der_round_trips_through_the_ecdsa_crate_parser() {
        let key = SigningKey::from_bytes(&[0x11; 32].into()).unwrap();
        let digest = [0x22u8; 32];
        let (r, s) = sign_prehash(&key, &digest);
        let der = encode_der_signature(&r, &s);

        let parsed = Signature::from_der(&der).expect("valid DER");
        let bytes = parsed.to_bytes();
        assert_eq!(&bytes[..32], &r);
        assert_eq!(&bytes[32..], &s);
    }

    #[test]
    fn strips_leading_zeros() {
        let mut r = [0u8; 32];
        r[5..].fill(0xAB);
        let s = [0x01u8; 32];
        let der = encode_der_signature(&r, &s);
        // total length byte must match actual encoded size
        assert_eq!(der[1] as usize, der.len() - 2);
    }

    #[test]
    fn pads_high_bit_integers() {
        let r = [0xFFu8; 32]; // MSB set -> needs 0x00 prefix
        let s = [0x01u8; 32];
        let der = encode_der_signature(&r, &s);
        // r TLV starts at offset 2: tag, len, then body
        assert_eq!(der[2], 0x02);
        assert_eq!(der[3], 33); // 32 + 1 pad byte
        assert_eq!(der[4], 0x00);
    }

    #[test]
    fn signature_verifies_under_derived_public_key() {
        use p256::ecdsa::signature::Verifier;
        use p256::ecdsa::VerifyingKey;

        let key = SigningKey::from_bytes(&[0x42; 32].into()).unwrap();
        let verifying_key = VerifyingKey::from(&key);

        let data = b"auth data goes here";
        let client_data_hash = [0x07u8; 32];
        let der = sign(&key, data, &client_data_hash);

        let digest = sha256_concat(&[data, &client_data_hash]);
        let sig = Signature::from_der(&der).unwrap();
        verifying_key
            .verify(&digest, &sig)
            .expect("signature must verify");
    }
}
