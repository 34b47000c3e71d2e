//! The stateless credential (C3): a 150-byte opaque blob that is
//! simultaneously a cookie returned to the RP, the seed for the signing
//! keypair, and the carrier of a MAC tag binding it to (rp, user, count).
//! See spec §4.1 and the Design Notes in §9 — the layout must never change
//! or every previously issued credential stops authenticating.

use crate::crypto::{constant_time_eq, sha256_concat};

pub const CREDENTIAL_TAG_SIZE: usize = 16;
pub const USER_ID_MAX_SIZE: usize = 64;
pub const USER_NAME_MAX_SIZE: usize = 64;
/// tag(16) + user_id(64) + user_id_len(1) + user_name(65, NUL-padded) + count(4)
pub const CREDENTIAL_ID_SIZE: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpId {
    pub id: String,
}

impl RpId {
    pub fn new(id: impl Into<String>) -> Self {
        RpId { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

/// The credential-id: 150 bytes, laid out as
/// `tag[16] || user_id[64] || user_id_len[1] || user_name[65] || count[4, LE]`.
#[derive(Debug, Clone)]
pub struct CredentialId {
    pub tag: [u8; CREDENTIAL_TAG_SIZE],
    pub user: UserEntity,
    pub count: u32,
}

impl CredentialId {
    /// Computes the tag and assembles a fresh credential-id for (rp, user, count).
    pub fn issue(
        rp: &RpId,
        user: &UserEntity,
        count: u32,
        device_master_secret: &[u8],
    ) -> CredentialId {
        let tag = make_tag(rp, user, count, device_master_secret);
        CredentialId {
            tag,
            user: user.clone(),
            count,
        }
    }

    /// Verifies that this credential was truly issued for `rp` by recomputing
    /// the tag from the fields it carries and comparing in constant time.
    pub fn verify(&self, rp: &RpId, device_master_secret: &[u8]) -> bool {
        let expected = make_tag(rp, &self.user, self.count, device_master_secret);
        constant_time_eq(&expected, &self.tag)
    }

    /// Only `user.display_name` survives the round trip through the wire
    /// credential-id (there is no spare room for a separate `name` field in
    /// 150 bytes); this mirrors the reference firmware, which likewise
    /// tracks a single name string internally and serves it back under the
    /// `displayName` key in the get-assertion response.
    pub fn to_bytes(&self) -> [u8; CREDENTIAL_ID_SIZE] {
        let mut out = [0u8; CREDENTIAL_ID_SIZE];
        out[0..16].copy_from_slice(&self.tag);

        let id_len = self.user.id.len().min(USER_ID_MAX_SIZE);
        out[16..16 + id_len].copy_from_slice(&self.user.id[..id_len]);
        out[80] = id_len as u8;

        let name_bytes = self.user.display_name.as_bytes();
        let name_len = name_bytes.len().min(USER_NAME_MAX_SIZE);
        out[81..81 + name_len].copy_from_slice(&name_bytes[..name_len]);
        // out[81 + name_len] stays 0 as the NUL terminator / padding.

        out[146..150].copy_from_slice(&self.count.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; CREDENTIAL_ID_SIZE]) -> CredentialId {
        let mut tag = [0u8; CREDENTIAL_TAG_SIZE];
        tag.copy_from_slice(&bytes[0..16]);

        let id_len = (bytes[80] as usize).min(USER_ID_MAX_SIZE);
        let id = bytes[16..16 + id_len].to_vec();

        let name_region = &bytes[81..81 + USER_NAME_MAX_SIZE + 1];
        let nul_at = name_region.iter().position(|&b| b == 0).unwrap_or(name_region.len());
        let display_name = String::from_utf8_lossy(&name_region[..nul_at]).into_owned();

        let mut count_bytes = [0u8; 4];
        count_bytes.copy_from_slice(&bytes[146..150]);
        let count = u32::from_le_bytes(count_bytes);

        CredentialId {
            tag,
            user: UserEntity {
                id,
                name: String::new(),
                display_name,
            },
            count,
        }
    }
}

/// `tag == H(rp.id || user.id || user.displayName(NUL-truncated, up to 64B) || count(LE u32) || device_master_secret)[..16]`
///
/// Hashes `display_name` rather than `name` because only `display_name`
/// survives the 150-byte round trip (see [`CredentialId::to_bytes`]); using
/// the same field at issue time and at verify time is what the invariant
/// actually requires, not a particular choice of WebAuthn field name.
pub fn make_tag(
    rp: &RpId,
    user: &UserEntity,
    count: u32,
    device_master_secret: &[u8],
) -> [u8; CREDENTIAL_TAG_SIZE] {
    let name_bytes = user.display_name.as_bytes();
    let name_len = name_bytes.len().min(USER_NAME_MAX_SIZE);
    let count_le = count.to_le_bytes();

    let full = sha256_concat(&[
        rp.id.as_bytes(),
        &user.id,
        &name_bytes[..name_len],
        &count_le,
        device_master_secret,
    ]);

    let mut tag = [0u8; CREDENTIAL_TAG_SIZE];
    tag.copy_from_slice(&full[..CREDENTIAL_TAG_SIZE]);
    tag
}
