//! Request parsing (part of C2): turns a raw CBOR request body into the
//! typed records the FSMs expect. Mirrors the teacher's `cbor_to_*` helper
//! style from `fido2.rs`, just aimed at decoding instead of encoding.

use ciborium::Value as CborValue;

use crate::credential::{RpId, UserEntity};
use crate::error::{CtapError, Result};

fn cbor_to_i128(value: &CborValue) -> Option<i128> {
    match value {
        CborValue::Integer(i) => Some((*i).into()),
        _ => None,
    }
}

fn cbor_to_u8(value: &CborValue) -> Option<u8> {
    cbor_to_i128(value).filter(|v| *v >= 0 && *v <= u8::MAX as i128).map(|v| v as u8)
}

fn cbor_to_string(value: &CborValue) -> Option<String> {
    match value {
        CborValue::Text(s) => Some(s.clone()),
        _ => None,
    }
}

fn cbor_to_bytes(value: &CborValue) -> Option<Vec<u8>> {
    match value {
        CborValue::Bytes(b) => Some(b.clone()),
        _ => None,
    }
}

fn map_get<'a>(map: &'a [(CborValue, CborValue)], key: i128) -> Option<&'a CborValue> {
    map.iter().find_map(|(k, v)| (cbor_to_i128(k) == Some(key)).then_some(v))
}

fn as_map(value: &CborValue) -> Result<&[(CborValue, CborValue)]> {
    match value {
        CborValue::Map(m) => Ok(m),
        _ => Err(CtapError::MissingParameter),
    }
}

/// Parses a raw CBOR request body (everything after the command byte) into
/// a top-level map, the shape every CTAP2 command request shares.
pub fn parse_request_map(body: &[u8]) -> Result<Vec<(CborValue, CborValue)>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let value: CborValue = ciborium::from_reader(body).map_err(|_| CtapError::CborParsing)?;
    as_map(&value).map(|m| m.to_vec())
}

pub struct PubKeyCredParam {
    pub alg: i128,
    pub cred_type: String,
}

pub struct CredentialDescriptor {
    pub cred_type: String,
    pub id: Vec<u8>,
}

pub struct MakeCredentialRequest {
    pub client_data_hash: [u8; 32],
    pub rp: RpId,
    pub user: UserEntity,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub exclude_list: Vec<CredentialDescriptor>,
    pub pin_auth: Option<Vec<u8>>,
    pub pin_protocol: Option<u8>,
}

pub struct GetAssertionRequest {
    pub rp_id: String,
    pub client_data_hash: [u8; 32],
    pub allow_list: Vec<CredentialDescriptor>,
    pub pin_auth: Option<Vec<u8>>,
    pub pin_protocol: Option<u8>,
}

pub struct ClientPinRequest {
    pub pin_protocol: u8,
    pub sub_command: u8,
    pub key_agreement: Option<(Vec<u8>, Vec<u8>)>, // (x, y)
    pub pin_auth: Option<Vec<u8>>,
    pub new_pin_enc: Option<Vec<u8>>,
    pub pin_hash_enc: Option<Vec<u8>>,
}

fn client_data_hash_from(value: &CborValue) -> Result<[u8; 32]> {
    let bytes = cbor_to_bytes(value).ok_or(CtapError::InvalidParameter)?;
    bytes.try_into().map_err(|_| CtapError::InvalidParameter)
}

fn parse_credential_descriptor(value: &CborValue) -> Result<CredentialDescriptor> {
    let map = as_map(value)?;
    let cred_type = map
        .iter()
        .find_map(|(k, v)| (k == &CborValue::Text("type".into())).then(|| cbor_to_string(v)))
        .flatten()
        .ok_or(CtapError::MissingParameter)?;
    let id = map
        .iter()
        .find_map(|(k, v)| (k == &CborValue::Text("id".into())).then(|| cbor_to_bytes(v)))
        .flatten()
        .ok_or(CtapError::MissingParameter)?;
    Ok(CredentialDescriptor { cred_type, id })
}

fn parse_descriptor_list(value: &CborValue) -> Result<Vec<CredentialDescriptor>> {
    match value {
        CborValue::Array(arr) => arr.iter().map(parse_credential_descriptor).collect(),
        _ => Err(CtapError::InvalidParameter),
    }
}

fn text_field(map: &[(CborValue, CborValue)], key: &str) -> Option<String> {
    map.iter()
        .find_map(|(k, v)| (k == &CborValue::Text(key.into())).then(|| cbor_to_string(v)))
        .flatten()
}

fn bytes_field(map: &[(CborValue, CborValue)], key: &str) -> Option<Vec<u8>> {
    map.iter()
        .find_map(|(k, v)| (k == &CborValue::Text(key.into())).then(|| cbor_to_bytes(v)))
        .flatten()
}

pub fn parse_make_credential(map: &[(CborValue, CborValue)]) -> Result<MakeCredentialRequest> {
    let client_data_hash = client_data_hash_from(map_get(map, 1).ok_or(CtapError::MissingParameter)?)?;

    let rp_map = as_map(map_get(map, 2).ok_or(CtapError::MissingParameter)?)?;
    let rp_id = text_field(rp_map, "id").ok_or(CtapError::MissingParameter)?;

    let user_map = as_map(map_get(map, 3).ok_or(CtapError::MissingParameter)?)?;
    let user_id = bytes_field(user_map, "id").ok_or(CtapError::MissingParameter)?;
    let user_name = text_field(user_map, "name").unwrap_or_default();
    let user_display_name = text_field(user_map, "displayName").unwrap_or_default();

    let params_value = map_get(map, 4).ok_or(CtapError::MissingParameter)?;
    let pub_key_cred_params = match params_value {
        CborValue::Array(arr) => arr
            .iter()
            .filter_map(|entry| {
                let entry_map = as_map(entry).ok()?;
                let alg = map_get(entry_map, -1_i128)
                    .or_else(|| {
                        entry_map
                            .iter()
                            .find_map(|(k, v)| (k == &CborValue::Text("alg".into())).then_some(v))
                    })
                    .and_then(cbor_to_i128)?;
                let cred_type = text_field(entry_map, "type")?;
                Some(PubKeyCredParam { alg, cred_type })
            })
            .collect(),
        _ => return Err(CtapError::InvalidParameter),
    };

    let exclude_list = match map_get(map, 5) {
        Some(v) => parse_descriptor_list(v)?,
        None => Vec::new(),
    };

    let pin_auth = map_get(map, 8).and_then(cbor_to_bytes);
    let pin_protocol = map_get(map, 9).and_then(cbor_to_u8);

    Ok(MakeCredentialRequest {
        client_data_hash,
        rp: RpId::new(rp_id),
        user: UserEntity { id: user_id, name: user_name, display_name: user_display_name },
        pub_key_cred_params,
        exclude_list,
        pin_auth,
        pin_protocol,
    })
}

pub fn parse_get_assertion(map: &[(CborValue, CborValue)]) -> Result<GetAssertionRequest> {
    let rp_id = cbor_to_string(map_get(map, 1).ok_or(CtapError::MissingParameter)?)
        .ok_or(CtapError::MissingParameter)?;
    let client_data_hash = client_data_hash_from(map_get(map, 2).ok_or(CtapError::MissingParameter)?)?;

    let allow_list = match map_get(map, 3) {
        Some(v) => parse_descriptor_list(v)?,
        None => Vec::new(),
    };

    let pin_auth = map_get(map, 6).and_then(cbor_to_bytes);
    let pin_protocol = map_get(map, 7).and_then(cbor_to_u8);

    Ok(GetAssertionRequest { rp_id, client_data_hash, allow_list, pin_auth, pin_protocol })
}

pub fn parse_client_pin(map: &[(CborValue, CborValue)]) -> Result<ClientPinRequest> {
    let pin_protocol = map_get(map, 1).and_then(cbor_to_u8).ok_or(CtapError::MissingParameter)?;
    let sub_command = map_get(map, 2).and_then(cbor_to_u8).ok_or(CtapError::MissingParameter)?;

    let key_agreement = match map_get(map, 3) {
        Some(v) => {
            let cose = as_map(v)?;
            let x = map_get(cose, -2).and_then(cbor_to_bytes).ok_or(CtapError::MissingParameter)?;
            let y = map_get(cose, -3).and_then(cbor_to_bytes).ok_or(CtapError::MissingParameter)?;
            Some((x, y))
        }
        None => None,
    };

    let pin_auth = map_get(map, 4).and_then(cbor_to_bytes);
    let new_pin_enc = map_get(map, 5).and_then(cbor_to_bytes);
    let pin_hash_enc = map_get(map, 6).and_then(cbor_to_bytes);

    Ok(ClientPinRequest { pin_protocol, sub_command, key_agreement, pin_auth, new_pin_enc, pin_hash_enc })
}
