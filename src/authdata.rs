//! Authenticator-data assembler (C4). Fixed layout per spec §4.2:
//! `rpIdHash[32] || flags[1] || signCount[4, BE] || [attestedCredentialData]`.

use crate::crypto::sha256;
use crate::oracles::SignCounter;

pub const FLAG_USER_PRESENT: u8 = 1 << 0;
pub const FLAG_USER_VERIFIED: u8 = 1 << 2;
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 1 << 6;

/// `aaguid[16] || credLen[2, BE] || credentialId[credLen] || COSE_Key(CBOR)`.
pub struct AttestedCredentialData<'a> {
    pub aaguid: [u8; 16],
    pub credential_id: &'a [u8],
    pub cose_key_cbor: &'a [u8],
}

/// Resamples the sign-counter oracle, retrying once if it yields zero
/// (zero is reserved as the in-memory "invalid" sentinel — §4.2).
pub fn next_sign_count(counter: &mut dyn SignCounter) -> u32 {
    let mut count = counter.increment();
    if count == 0 {
        count = counter.increment();
    }
    count
}

/// Builds the authenticator-data blob. `sign_count` is the resolved,
/// already-non-zero counter value (see [`next_sign_count`]); it is written
/// in network (big-endian) byte order, independent of whatever byte order
/// the credential tag engine used internally for the same number.
pub fn build(
    rp_id: &str,
    user_present: bool,
    sign_count: u32,
    attested: Option<AttestedCredentialData>,
) -> Vec<u8> {
    let rp_id_hash = sha256(rp_id.as_bytes());

    let mut flags = 0u8;
    if user_present {
        flags |= FLAG_USER_PRESENT;
    }
    // FLAG_USER_VERIFIED is never set: this design never performs UV.

    let mut out = Vec::with_capacity(37);
    out.extend_from_slice(&rp_id_hash);

    if let Some(attested) = &attested {
        out.push(flags | FLAG_ATTESTED_CREDENTIAL_DATA);
        out.extend_from_slice(&sign_count.to_be_bytes());
        out.extend_from_slice(&attested.aaguid);
        out.extend_from_slice(&(attested.credential_id.len() as u16).to_be_bytes());
        out.extend_from_slice(attested.credential_id);
        out.extend_from_slice(attested.cose_key_cbor);
    } else {
        out.push(flags);
        out.extend_from_slice(&sign_count.to_be_bytes());
    }

    out
}

/// Rewrites just the `signCount` field of a previously-built auth-data
/// header in place (used by get-next-assertion, which resamples the
/// counter but keeps the rpIdHash/flags from the original get-assertion).
pub fn rewrite_sign_count(auth_data_header: &mut [u8], sign_count: u32) {
    auth_data_header[33..37].copy_from_slice(&sign_count.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCounter(u32);
    impl SignCounter for FixedCounter {
        fn increment(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    #[test]
    fn no_attested_data_is_37_bytes() {
        let data = build("example.com", true, 1, None);
        assert_eq!(data.len(), 37);
        assert_eq!(data[32], FLAG_USER_PRESENT);
    }

    #[test]
    fn attested_data_sets_bit_six() {
        let cose = vec![0xa5];
        let attested = AttestedCredentialData {
            aaguid: [0u8; 16],
            credential_id: &[0u8; 150],
            cose_key_cbor: &cose,
        };
        let data = build("example.com", true, 1, Some(attested));
        assert_eq!(data[32] & FLAG_ATTESTED_CREDENTIAL_DATA, FLAG_ATTESTED_CREDENTIAL_DATA);
        assert_eq!(data.len(), 37 + 16 + 2 + 150 + 1);
    }

    #[test]
    fn sign_count_is_big_endian() {
        let data = build("example.com", true, 0x01020304, None);
        assert_eq!(&data[33..37], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn retries_once_on_zero_counter() {
        struct ZeroThenOne(u32);
        impl SignCounter for ZeroThenOne {
            fn increment(&mut self) -> u32 {
                let v = self.0;
                self.0 += 1;
                v
            }
        }
        let mut counter = ZeroThenOne(0);
        assert_eq!(next_sign_count(&mut counter), 1);
    }

    #[test]
    fn rewrite_changes_only_the_count() {
        let mut data = build("example.com", true, 1, None);
        let rp_hash_before = data[0..32].to_vec();
        rewrite_sign_count(&mut data, 99);
        assert_eq!(&data[0..32], rp_hash_before.as_slice());
        assert_eq!(&data[33..37], &99u32.to_be_bytes());
    }
}
