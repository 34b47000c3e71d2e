//! Get-assertion FSM and continuation (C7). See §4.5.

use crate::authdata;
use crate::cbor::GetAssertionRequest;
use crate::codec;
use crate::crypto::{self, hmac_sha256_truncated16};
use crate::credential::{CredentialId, UserEntity, CREDENTIAL_ID_SIZE};
use crate::error::{CtapError, Result};
use crate::oracles::{SignCounter, UserPresence};
use crate::session::{AuthenticatorSession, GetAssertionContinuation, LastCommand, SavedCredential};
use crate::signing;

struct ScoredCandidate {
    credential_id: Vec<u8>,
    user: UserEntity,
    count: u32,
}

fn verify_pin_auth(session: &AuthenticatorSession, req: &GetAssertionRequest) -> Result<()> {
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

/// Parses each allow-list entry and scores it; entries that fail
/// [`CredentialId::verify`] are invalidated (count forced to 0) rather than
/// dropped, so they still sort last per §4.5 step 4.
fn score_allow_list(
    allow_list: &[crate::cbor::CredentialDescriptor],
    rp_id: &str,
    device_master_secret: &[u8],
) -> Vec<ScoredCandidate> {
    let rp = crate::credential::RpId::new(rp_id.to_string());
    allow_list
        .iter()
        .filter_map(|descriptor| {
            if descriptor.cred_type != "public-key" || descriptor.id.len() != CREDENTIAL_ID_SIZE {
                return None;
            }
            let mut bytes = [0u8; CREDENTIAL_ID_SIZE];
            bytes.copy_from_slice(&descriptor.id);
            let credential = CredentialId::from_bytes(&bytes);
            let count = if credential.verify(&rp, device_master_secret) {
                credential.count
            } else {
                0
            };
            Some(ScoredCandidate { credential_id: descriptor.id.clone(), user: credential.user, count })
        })
        .collect()
}

pub fn handle(
    session: &mut AuthenticatorSession,
    req: GetAssertionRequest,
    presence: &mut dyn UserPresence,
    sign_counter: &mut dyn SignCounter,
) -> Result<Vec<u8>> {
    verify_pin_auth(session, &req)?;

    let mut candidates = score_allow_list(&req.allow_list, &req.rp_id, &session.device_master_secret);
    // Stable sort descending by count; invalid (count == 0) entries end up last.
    candidates.sort_by(|a, b| b.count.cmp(&a.count));

    let valid_count = candidates.iter().filter(|c| c.count != 0).count();
    if valid_count == 0 {
        return Err(CtapError::CredentialNotValid);
    }

    let user_present = presence.test();
    let count = authdata::next_sign_count(sign_counter);
    let auth_data = authdata::build(&req.rp_id, user_present, count, None);

    let chosen = &candidates[0];
    let signing_key = crypto::signing_key_from_seed(&chosen.credential_id);
    let signature = signing::sign(&signing_key, &auth_data, &req.client_data_hash);

    let response = codec::get_assertion_response(
        &chosen.credential_id,
        &auth_data,
        &signature,
        &chosen.user,
        valid_count as u32,
    );

    let remaining: Vec<SavedCredential> = candidates[1..valid_count]
        .iter()
        .map(|c| SavedCredential { credential_id: c.credential_id.clone(), user: c.user.clone() })
        .collect();

    session.continuation = Some(GetAssertionContinuation {
        client_data_hash: req.client_data_hash,
        auth_data_header: auth_data,
        remaining,
    });
    session.last_command = LastCommand::GetAssertion;

    Ok(response)
}

pub fn handle_get_next_assertion(
    session: &mut AuthenticatorSession,
    sign_counter: &mut dyn SignCounter,
) -> Result<Vec<u8>> {
    if session.last_command != LastCommand::GetAssertion {
        return Err(CtapError::NotAllowed);
    }

    let continuation = session.continuation.as_mut().ok_or(CtapError::NotAllowed)?;
    if continuation.remaining.is_empty() {
        session.last_command = LastCommand::None;
        return Err(CtapError::NotAllowed);
    }

    let next = continuation.remaining.remove(0);
    let count = authdata::next_sign_count(sign_counter);
    authdata::rewrite_sign_count(&mut continuation.auth_data_header, count);

    let signing_key = crypto::signing_key_from_seed(&next.credential_id);
    let signature = signing::sign(&signing_key, &continuation.auth_data_header, &continuation.client_data_hash);

    let response = codec::get_assertion_response(
        &next.credential_id,
        &continuation.auth_data_header,
        &signature,
        &next.user,
        1,
    );

    session.last_command = LastCommand::GetAssertion;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::RpId;
    use crate::oracles::OsRng;

    struct AlwaysPresent;
    impl UserPresence for AlwaysPresent {
        fn test(&mut self) -> bool {
            true
        }
    }

    struct SeqCounter(u32);
    impl SignCounter for SeqCounter {
        fn increment(&mut self) -> u32 {
            self.0 += 1;
            self.0
        }
    }

    fn issue(rp: &RpId, secret: &[u8], count: u32) -> Vec<u8> {
        let user = UserEntity { id: vec![count as u8; 8], name: "u".into(), display_name: "U".into() };
        CredentialId::issue(rp, &user, count, secret).to_bytes().to_vec()
    }

    #[test]
    fn no_valid_credentials_is_an_error() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let req = GetAssertionRequest {
            rp_id: "example.com".into(),
            client_data_hash: [0u8; 32],
            allow_list: vec![crate::cbor::CredentialDescriptor {
                cred_type: "public-key".into(),
                id: vec![0xAAu8; CREDENTIAL_ID_SIZE],
            }],
            pin_auth: None,
            pin_protocol: None,
        };

        let result = handle(&mut session, req, &mut presence, &mut counter);
        assert_eq!(result.unwrap_err(), CtapError::CredentialNotValid);
    }

    #[test]
    fn allow_list_entry_with_wrong_type_is_never_valid() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let rp = RpId::new("example.com");
        let secret = session.device_master_secret;
        let cred = issue(&rp, &secret, 1);

        let req = GetAssertionRequest {
            rp_id: "example.com".into(),
            client_data_hash: [0u8; 32],
            allow_list: vec![crate::cbor::CredentialDescriptor {
                cred_type: "not-public-key".into(),
                id: cred,
            }],
            pin_auth: None,
            pin_protocol: None,
        };

        let result = handle(&mut session, req, &mut presence, &mut counter);
        assert_eq!(result.unwrap_err(), CtapError::CredentialNotValid);
    }

    #[test]
    fn picks_most_recent_and_continues_with_the_rest() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let rp = RpId::new("example.com");
        let secret = session.device_master_secret;
        let low = issue(&rp, &secret, 7);
        let high = issue(&rp, &secret, 42);

        let req = GetAssertionRequest {
            rp_id: "example.com".into(),
            client_data_hash: [0u8; 32],
            allow_list: vec![
                crate::cbor::CredentialDescriptor { cred_type: "public-key".into(), id: low },
                crate::cbor::CredentialDescriptor { cred_type: "public-key".into(), id: high.clone() },
            ],
            pin_auth: None,
            pin_protocol: None,
        };

        let response = handle(&mut session, req, &mut presence, &mut counter).unwrap();
        let value: ciborium::Value = ciborium::from_reader(&response[..]).unwrap();
        let map = match value {
            ciborium::Value::Map(m) => m,
            _ => panic!("expected map"),
        };
        let number_of_credentials = map
            .iter()
            .find_map(|(k, v)| {
                (*k == ciborium::Value::Integer(5.into())).then(|| match v {
                    ciborium::Value::Integer(i) => i128::from(*i),
                    _ => panic!("expected integer"),
                })
            })
            .unwrap();
        assert_eq!(number_of_credentials, 2);
        assert_eq!(session.continuation.as_ref().unwrap().remaining.len(), 1);

        let next = handle_get_next_assertion(&mut session, &mut counter).unwrap();
        assert!(!next.is_empty());
        assert!(session.continuation.as_ref().unwrap().remaining.is_empty());

        let exhausted = handle_get_next_assertion(&mut session, &mut counter);
        assert_eq!(exhausted.unwrap_err(), CtapError::NotAllowed);
    }

    #[test]
    fn get_next_assertion_without_prior_get_assertion_is_not_allowed() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let mut counter = SeqCounter(0);
        let result = handle_get_next_assertion(&mut session, &mut counter);
        assert_eq!(result.unwrap_err(), CtapError::NotAllowed);
    }
}
