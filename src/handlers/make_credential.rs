//! Make-credential FSM (C6). See §4.4.

use crate::authdata::{self, AttestedCredentialData};
use crate::cbor::MakeCredentialRequest;
use crate::codec;
use crate::config::AuthenticatorConfig;
use crate::credential::{CredentialId, CREDENTIAL_ID_SIZE};
use crate::crypto::{self, hmac_sha256_truncated16};
use crate::error::{CtapError, Result};
use crate::oracles::{SignCounter, UserPresence};
use crate::session::AuthenticatorSession;
use crate::signing;

fn es256_requested(req: &MakeCredentialRequest) -> bool {
    req.pub_key_cred_params
        .iter()
        .any(|p| p.alg == -7 && p.cred_type == "public-key")
}

fn verify_pin_auth(session: &AuthenticatorSession, req: &MakeCredentialRequest) -> Result<()> {
    if !session.pin_code_set {
        return Ok(());
    }
    match &req.pin_auth {
        None => Err(CtapError::PinRequired),
        Some(pin_auth) => {
            let expected = hmac_sha256_truncated16(&session.pin_token, &req.client_data_hash);
            if crypto::constant_time_eq(&expected, pin_auth) {
                Ok(())
            } else {
                Err(CtapError::PinAuthInvalid)
            }
        }
    }
}

pub fn handle(
    session: &mut AuthenticatorSession,
    config: &AuthenticatorConfig,
    req: MakeCredentialRequest,
    presence: &mut dyn UserPresence,
    sign_counter: &mut dyn SignCounter,
) -> Result<Vec<u8>> {
    if !es256_requested(&req) {
        return Err(CtapError::Other);
    }

    verify_pin_auth(session, &req)?;

    for descriptor in &req.exclude_list {
        if descriptor.cred_type != "public-key" || descriptor.id.len() != CREDENTIAL_ID_SIZE {
            continue;
        }
        let mut bytes = [0u8; CREDENTIAL_ID_SIZE];
        bytes.copy_from_slice(&descriptor.id);
        let existing = CredentialId::from_bytes(&bytes);
        if existing.verify(&req.rp, &session.device_master_secret) {
            return Err(CtapError::CredentialExcluded);
        }
    }

    let user_present = presence.test();
    let count = authdata::next_sign_count(sign_counter);

    let credential = CredentialId::issue(&req.rp, &req.user, count, &session.device_master_secret);
    let credential_id_bytes = credential.to_bytes();

    let (x, y) = crypto::derive_pubkey_from_seed(&credential_id_bytes);
    let cose_key = codec::cose_key_ec2(&x, &y);
    let mut cose_key_cbor = Vec::new();
    ciborium::into_writer(&cose_key, &mut cose_key_cbor).expect("cose key encodes");

    let attested = AttestedCredentialData {
        aaguid: config.aaguid,
        credential_id: &credential_id_bytes,
        cose_key_cbor: &cose_key_cbor,
    };
    let auth_data = authdata::build(&req.rp.id, user_present, count, Some(attested));

    let signature = signing::sign(&config.attestation_key, &auth_data, &req.client_data_hash);

    session.last_command = crate::session::LastCommand::None;

    Ok(codec::make_credential_response(&auth_data, &signature, &config.attestation_cert_der))
}
