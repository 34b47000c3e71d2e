//! Response builders (part of C2): assembles the CBOR maps the dispatcher
//! sends back, and the COSE_Key encoding shared by credential public keys
//! and key-agreement public keys.

use ciborium::Value as CborValue;

use crate::config::AuthenticatorConfig;
use crate::credential::UserEntity;

fn encode(value: CborValue) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(&value, &mut out).expect("CBOR encoding of our own maps cannot fail");
    out
}

/// EC2/P-256 COSE_Key, `alg = ES256 (-7)`, 5-entry canonical map.
pub fn cose_key_ec2(x: &[u8; 32], y: &[u8; 32]) -> CborValue {
    CborValue::Map(vec![
        (CborValue::Integer(1.into()), CborValue::Integer(2.into())), // kty: EC2
        (CborValue::Integer(3.into()), CborValue::Integer((-7).into())), // alg: ES256
        (CborValue::Integer((-1).into()), CborValue::Integer(1.into())), // crv: P-256
        (CborValue::Integer((-2).into()), CborValue::Bytes(x.to_vec())),
        (CborValue::Integer((-3).into()), CborValue::Bytes(y.to_vec())),
    ])
}

pub fn get_info_response(config: &AuthenticatorConfig, pin_code_set: bool) -> Vec<u8> {
    let options = CborValue::Map(vec![
        (CborValue::Text("plat".into()), CborValue::Bool(false)),
        (CborValue::Text("rk".into()), CborValue::Bool(false)),
        (CborValue::Text("up".into()), CborValue::Bool(true)),
        (CborValue::Text("uv".into()), CborValue::Bool(false)),
        (CborValue::Text("clientPin".into()), CborValue::Bool(pin_code_set)),
    ]);

    let map = vec![
        (
            CborValue::Integer(0x01.into()),
            CborValue::Array(vec![
                CborValue::Text("U2F_V2".into()),
                CborValue::Text("FIDO_2_0".into()),
            ]),
        ),
        (CborValue::Integer(0x03.into()), CborValue::Bytes(config.aaguid.to_vec())),
        (CborValue::Integer(0x04.into()), options),
        (CborValue::Integer(0x05.into()), CborValue::Integer((config.max_msg_size as i128).into())),
        (CborValue::Integer(0x06.into()), CborValue::Array(vec![CborValue::Integer(1.into())])),
    ];

    encode(CborValue::Map(map))
}

pub fn make_credential_response(
    auth_data: &[u8],
    signature: &[u8],
    attestation_cert_der: &[u8],
) -> Vec<u8> {
    let att_stmt = CborValue::Map(vec![
        (CborValue::Text("alg".into()), CborValue::Integer((-7).into())),
        (CborValue::Text("sig".into()), CborValue::Bytes(signature.to_vec())),
        (
            CborValue::Text("x5c".into()),
            CborValue::Array(vec![CborValue::Bytes(attestation_cert_der.to_vec())]),
        ),
    ]);

    let map = vec![
        (CborValue::Integer(1.into()), CborValue::Text("packed".into())),
        (CborValue::Integer(2.into()), CborValue::Bytes(auth_data.to_vec())),
        (CborValue::Integer(3.into()), att_stmt),
    ];

    encode(CborValue::Map(map))
}

pub fn get_assertion_response(
    credential_id: &[u8],
    auth_data: &[u8],
    signature: &[u8],
    user: &UserEntity,
    number_of_credentials: u32,
) -> Vec<u8> {
    let credential = CborValue::Map(vec![
        (CborValue::Text("type".into()), CborValue::Text("public-key".into())),
        (CborValue::Text("id".into()), CborValue::Bytes(credential_id.to_vec())),
    ]);

    let user_entity = CborValue::Map(vec![
        (CborValue::Text("id".into()), CborValue::Bytes(user.id.clone())),
        (CborValue::Text("displayName".into()), CborValue::Text(user.display_name.clone())),
    ]);

    let map = vec![
        (CborValue::Integer(1.into()), credential),
        (CborValue::Integer(2.into()), CborValue::Bytes(auth_data.to_vec())),
        (CborValue::Integer(3.into()), CborValue::Bytes(signature.to_vec())),
        (CborValue::Integer(4.into()), user_entity),
        (CborValue::Integer(5.into()), CborValue::Integer((number_of_credentials as i128).into())),
    ];

    encode(CborValue::Map(map))
}

pub fn pin_retries_response(retries: u8) -> Vec<u8> {
    let map = vec![(CborValue::Integer(3.into()), CborValue::Integer((retries as i128).into()))];
    encode(CborValue::Map(map))
}

pub fn pin_key_agreement_response(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let map = vec![(CborValue::Integer(1.into()), cose_key_ec2(x, y))];
    encode(CborValue::Map(map))
}

pub fn pin_token_response(pin_token_enc: &[u8]) -> Vec<u8> {
    let map = vec![(CborValue::Integer(2.into()), CborValue::Bytes(pin_token_enc.to_vec()))];
    encode(CborValue::Map(map))
}
