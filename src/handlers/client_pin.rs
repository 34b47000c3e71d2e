//! Client-PIN FSM (C8). PIN protocol v1: ECDH + AES-256-CBC + HMAC. §4.6.

use p256::elliptic_curve::sec1::ToEncodedPoint;

use crate::cbor::ClientPinRequest;
use crate::codec;
use crate::crypto::{self, hmac_sha256_truncated16, Aes256Cbc};
use crate::error::{CtapError, Result};
use crate::oracles::Rng;
use crate::session::AuthenticatorSession;
use crate::status::pin_subcommand;

const PIN_HASH_SIZE: usize = 16;
const MIN_PIN_LEN: usize = 4;

fn shared_secret(session: &AuthenticatorSession, platform_x: &[u8], platform_y: &[u8]) -> Result<[u8; 32]> {
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(platform_x);
    sec1.extend_from_slice(platform_y);
    if sec1.len() != 65 {
        return Err(CtapError::InvalidParameter);
    }
    crypto::ecdh_shared_secret(&session.key_agreement_secret, &sec1)
}

fn get_retries(session: &AuthenticatorSession) -> Result<Vec<u8>> {
    Ok(codec::pin_retries_response(session.pin_retries))
}

fn get_key_agreement(session: &AuthenticatorSession) -> Result<Vec<u8>> {
    let point = session.key_agreement_secret.public_key().to_encoded_point(false);
    let mut x = [0u8; 32];
    let mut y = [0u8; 32];
    x.copy_from_slice(point.x().expect("uncompressed point has x"));
    y.copy_from_slice(point.y().expect("uncompressed point has y"));
    Ok(codec::pin_key_agreement_response(&x, &y))
}

fn set_pin(session: &mut AuthenticatorSession, req: &ClientPinRequest) -> Result<Vec<u8>> {
    if session.pin_code_set {
        return Err(CtapError::NotAllowed);
    }
    let (x, y) = req.key_agreement.as_ref().ok_or(CtapError::MissingParameter)?;
    let mut new_pin_enc = req.new_pin_enc.clone().ok_or(CtapError::MissingParameter)?;
    let pin_auth = req.pin_auth.as_ref().ok_or(CtapError::MissingParameter)?;

    let shared = shared_secret(session, x, y)?;

    let expected = hmac_sha256_truncated16(&shared, &new_pin_enc);
    if !crypto::constant_time_eq(&expected, pin_auth) {
        return Err(CtapError::PinAuthInvalid);
    }

    Aes256Cbc::new(&shared).decrypt_in_place(&mut new_pin_enc);

    let nul_at = new_pin_enc.iter().position(|&b| b == 0).ok_or(CtapError::PinPolicyViolation)?;
    if nul_at < MIN_PIN_LEN {
        return Err(CtapError::PinPolicyViolation);
    }
    let pin = &new_pin_enc[..nul_at];

    let digest = crypto::sha256(pin);
    session.pin_code_hash.copy_from_slice(&digest[..PIN_HASH_SIZE]);
    session.pin_code_set = true;

    Ok(Vec::new())
}

fn change_pin(session: &mut AuthenticatorSession, req: &ClientPinRequest, rng: &mut dyn Rng) -> Result<Vec<u8>> {
    if !session.pin_code_set {
        return Err(CtapError::PinNotSet);
    }
    let (x, y) = req.key_agreement.as_ref().ok_or(CtapError::MissingParameter)?;
    let mut new_pin_enc = req.new_pin_enc.clone().ok_or(CtapError::MissingParameter)?;
    let mut pin_hash_enc = req.pin_hash_enc.clone().ok_or(CtapError::MissingParameter)?;
    let pin_auth = req.pin_auth.as_ref().ok_or(CtapError::MissingParameter)?;

    let shared = shared_secret(session, x, y)?;

    let mut mac_input = new_pin_enc.clone();
    mac_input.extend_from_slice(&pin_hash_enc);
    let expected = hmac_sha256_truncated16(&shared, &mac_input);
    if !crypto::constant_time_eq(&expected, pin_auth) {
        return Err(CtapError::PinAuthInvalid);
    }

    let cipher = Aes256Cbc::new(&shared);
    cipher.decrypt_in_place(&mut new_pin_enc);
    cipher.decrypt_in_place(&mut pin_hash_enc);

    if pin_hash_enc.len() < PIN_HASH_SIZE || !crypto::constant_time_eq(&pin_hash_enc[..PIN_HASH_SIZE], &session.pin_code_hash) {
        session.record_pin_failure(rng);
        return Err(CtapError::PinInvalid);
    }

    let nul_at = new_pin_enc.iter().position(|&b| b == 0).ok_or(CtapError::PinPolicyViolation)?;
    if nul_at < MIN_PIN_LEN {
        return Err(CtapError::PinPolicyViolation);
    }
    let pin = &new_pin_enc[..nul_at];

    session.record_pin_success();
    let digest = crypto::sha256(pin);
    session.pin_code_hash.copy_from_slice(&digest[..PIN_HASH_SIZE]);

    Ok(Vec::new())
}

fn get_pin_token(session: &mut AuthenticatorSession, req: &ClientPinRequest, rng: &mut dyn Rng) -> Result<Vec<u8>> {
    if !session.pin_code_set {
        return Err(CtapError::PinNotSet);
    }
    let (x, y) = req.key_agreement.as_ref().ok_or(CtapError::MissingParameter)?;
    let mut pin_hash_enc = req.pin_hash_enc.clone().ok_or(CtapError::MissingParameter)?;

    let shared = shared_secret(session, x, y)?;
    Aes256Cbc::new(&shared).decrypt_in_place(&mut pin_hash_enc);

    if pin_hash_enc.len() < PIN_HASH_SIZE || !crypto::constant_time_eq(&pin_hash_enc[..PIN_HASH_SIZE], &session.pin_code_hash) {
        session.record_pin_failure(rng);
        return Err(CtapError::PinInvalid);
    }

    session.record_pin_success();
    let mut token = session.pin_token;
    Aes256Cbc::new(&shared).encrypt_in_place(&mut token);
    Ok(codec::pin_token_response(&token))
}

pub fn handle(session: &mut AuthenticatorSession, req: ClientPinRequest, rng: &mut dyn Rng) -> Result<Vec<u8>> {
    if req.pin_protocol != 1 {
        return Err(CtapError::Other);
    }

    match req.sub_command {
        pin_subcommand::GET_RETRIES => get_retries(session),
        pin_subcommand::GET_KEY_AGREEMENT => get_key_agreement(session),
        pin_subcommand::SET_PIN => set_pin(session, &req),
        pin_subcommand::CHANGE_PIN => change_pin(session, &req, rng),
        pin_subcommand::GET_PIN_TOKEN => get_pin_token(session, &req, rng),
        _ => Err(CtapError::Other),
    }
}
