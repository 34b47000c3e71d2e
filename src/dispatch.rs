//! Command dispatcher (C9). Decodes the command byte, enforces lockout and
//! continuation-eligibility gating, routes to a handler, and turns the
//! result into a status-byte-prefixed response. §4.7.

use log::{debug, warn};

use crate::cbor;
use crate::config::AuthenticatorConfig;
use crate::error::CtapError;
use crate::handlers::{client_pin, get_assertion, get_info, make_credential, reset};
use crate::oracles::{Rng, SignCounter, UserPresence};
use crate::session::AuthenticatorSession;
use crate::status::{self, command};

/// Runs one command end to end, returning the full response packet
/// (status byte followed by the CBOR payload, empty on error).
pub fn handle_packet(
    session: &mut AuthenticatorSession,
    config: &AuthenticatorConfig,
    packet: &[u8],
    presence: &mut dyn UserPresence,
    sign_counter: &mut dyn SignCounter,
    rng: &mut dyn Rng,
) -> Vec<u8> {
    let Some((&cmd, body)) = packet.split_first() else {
        return response_for(Err(CtapError::InvalidCommand));
    };

    debug!("dispatching command 0x{cmd:02x}");

    let gated = matches!(cmd, command::MAKE_CREDENTIAL | command::GET_ASSERTION | command::CLIENT_PIN);
    if gated && session.device_lockout {
        warn!("command 0x{cmd:02x} rejected: device locked out");
        return response_for(Err(CtapError::NotAllowed));
    }

    let result = match cmd {
        command::MAKE_CREDENTIAL => run_make_credential(session, config, body, presence, sign_counter),
        command::GET_ASSERTION => run_get_assertion(session, body, presence, sign_counter),
        command::GET_NEXT_ASSERTION => get_assertion::handle_get_next_assertion(session, sign_counter),
        command::GET_INFO => Ok(get_info::handle(session, config)),
        command::CLIENT_PIN => run_client_pin(session, body, rng),
        command::RESET => reset::handle(session, presence, rng),
        command::CANCEL => Ok(Vec::new()),
        _ => Err(CtapError::InvalidCommand),
    };

    // get-assertion and get-next-assertion manage `last_command` themselves
    // (it's how get-next-assertion eligibility and the saved list line up);
    // CANCEL is a no-op at this layer and must not alter continuation state
    // either (§5); every other command clears it, invalidating any pending
    // continuation.
    if !matches!(cmd, command::GET_ASSERTION | command::GET_NEXT_ASSERTION | command::CANCEL) {
        session.last_command = crate::session::LastCommand::None;
    }

    response_for(result)
}

fn run_make_credential(
    session: &mut AuthenticatorSession,
    config: &AuthenticatorConfig,
    body: &[u8],
    presence: &mut dyn UserPresence,
    sign_counter: &mut dyn SignCounter,
) -> crate::error::Result<Vec<u8>> {
    let map = cbor::parse_request_map(body)?;
    let req = cbor::parse_make_credential(&map)?;
    make_credential::handle(session, config, req, presence, sign_counter)
}

fn run_get_assertion(
    session: &mut AuthenticatorSession,
    body: &[u8],
    presence: &mut dyn UserPresence,
    sign_counter: &mut dyn SignCounter,
) -> crate::error::Result<Vec<u8>> {
    let map = cbor::parse_request_map(body)?;
    let req = cbor::parse_get_assertion(&map)?;
    get_assertion::handle(session, req, presence, sign_counter)
}

fn run_client_pin(
    session: &mut AuthenticatorSession,
    body: &[u8],
    rng: &mut dyn Rng,
) -> crate::error::Result<Vec<u8>> {
    let map = cbor::parse_request_map(body)?;
    let req = cbor::parse_client_pin(&map)?;
    client_pin::handle(session, req, rng)
}

fn response_for(result: crate::error::Result<Vec<u8>>) -> Vec<u8> {
    match result {
        Ok(payload) => {
            let mut out = Vec::with_capacity(1 + payload.len());
            out.push(status::CTAP1_ERR_SUCCESS);
            out.extend_from_slice(&payload);
            out
        }
        Err(err) => vec![err.status_byte()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn get_info_on_fresh_device_reports_no_pin() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let config = AuthenticatorConfig::for_testing();
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let response = handle_packet(
            &mut session,
            &config,
            &[command::GET_INFO],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(response[0], status::CTAP1_ERR_SUCCESS);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let config = AuthenticatorConfig::for_testing();
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let response = handle_packet(&mut session, &config, &[0xEE], &mut presence, &mut counter, &mut rng);
        assert_eq!(response, vec![CtapError::InvalidCommand.status_byte()]);
    }

    #[test]
    fn lockout_blocks_make_credential_and_client_pin_but_not_get_info() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        session.device_lockout = true;
        let config = AuthenticatorConfig::for_testing();
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        let mc = handle_packet(
            &mut session,
            &config,
            &[command::MAKE_CREDENTIAL],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(mc, vec![CtapError::NotAllowed.status_byte()]);

        let info = handle_packet(
            &mut session,
            &config,
            &[command::GET_INFO],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(info[0], status::CTAP1_ERR_SUCCESS);
    }

    #[test]
    fn get_next_assertion_after_get_info_is_not_allowed() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let config = AuthenticatorConfig::for_testing();
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        // Stand in for a prior successful get-assertion without building the
        // full CBOR request body: tests in handlers::get_assertion already
        // exercise the real flow end to end via this same session field.
        session.last_command = crate::session::LastCommand::GetAssertion;
        session.continuation = None;

        handle_packet(
            &mut session,
            &config,
            &[command::GET_INFO],
            &mut presence,
            &mut counter,
            &mut rng,
        );

        let response = handle_packet(
            &mut session,
            &config,
            &[command::GET_NEXT_ASSERTION],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(response, vec![CtapError::NotAllowed.status_byte()]);
    }

    #[test]
    fn cancel_does_not_clear_a_pending_continuation() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let config = AuthenticatorConfig::for_testing();
        let mut presence = AlwaysPresent;
        let mut counter = SeqCounter(0);

        session.last_command = crate::session::LastCommand::GetAssertion;
        session.continuation = Some(crate::session::GetAssertionContinuation {
            client_data_hash: [0u8; 32],
            auth_data_header: vec![0u8; 37],
            remaining: vec![crate::session::SavedCredential {
                credential_id: vec![0xAAu8; crate::credential::CREDENTIAL_ID_SIZE],
                user: crate::credential::UserEntity {
                    id: vec![1, 2, 3],
                    name: String::new(),
                    display_name: "Alice".into(),
                },
            }],
        });

        let cancel = handle_packet(
            &mut session,
            &config,
            &[command::CANCEL],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(cancel[0], status::CTAP1_ERR_SUCCESS);

        let response = handle_packet(
            &mut session,
            &config,
            &[command::GET_NEXT_ASSERTION],
            &mut presence,
            &mut counter,
            &mut rng,
        );
        assert_eq!(response[0], status::CTAP1_ERR_SUCCESS);
    }
}
