//! Lifecycle and session state (C10). `AuthenticatorSession` is the owned
//! value the dispatcher threads through every handler in place of the
//! file-scope statics the reference firmware keeps; see the design notes
//! on why no process-wide singleton is needed here.

use p256::SecretKey;

use crate::crypto::generate_keypair;
use crate::oracles::Rng;

pub const PIN_TOKEN_SIZE: usize = 16;
pub const PIN_RETRIES_MAX: u8 = 8;

/// A sorted, already-validated allow-list entry retained across
/// get-assertion -> get-next-assertion calls.
#[derive(Clone)]
pub struct SavedCredential {
    pub credential_id: Vec<u8>,
    pub user: crate::credential::UserEntity,
}

/// Process-volatile continuation state for the get-assertion family (§4.5).
pub struct GetAssertionContinuation {
    pub client_data_hash: [u8; 32],
    pub auth_data_header: Vec<u8>,
    pub remaining: Vec<SavedCredential>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LastCommand {
    None,
    GetAssertion,
}

/// All state that lives for a device power cycle or longer, threaded
/// through the dispatcher instead of held in statics.
///
/// The sign counter itself is not a field here: §6 models it as an
/// externally-owned oracle (hardware counter in flash), supplied per call
/// through [`crate::oracles::SignCounter`], the same way user presence is.
pub struct AuthenticatorSession {
    // device-persistent
    pub device_master_secret: [u8; 32],
    pub pin_code_set: bool,
    pub pin_code_hash: [u8; 16],
    pub pin_retries: u8,

    // process-volatile
    pub pin_token: [u8; PIN_TOKEN_SIZE],
    pub key_agreement_secret: SecretKey,
    pub key_agreement_pub: [u8; 64],
    pub device_lockout: bool,

    // per-command-transient
    pub continuation: Option<GetAssertionContinuation>,
    pub last_command: LastCommand,
}

impl AuthenticatorSession {
    /// `ctap_init`: resets everything volatile, keeps whatever was already
    /// persisted (a fresh device must instead call [`Self::reset`]).
    pub fn init(device_master_secret: [u8; 32], rng: &mut dyn Rng) -> Self {
        let (key_agreement_secret, key_agreement_pub) = generate_keypair(rng);
        let mut pin_token = [0u8; PIN_TOKEN_SIZE];
        rng.fill(&mut pin_token);

        AuthenticatorSession {
            device_master_secret,
            pin_code_set: false,
            pin_code_hash: [0u8; 16],
            pin_retries: PIN_RETRIES_MAX,
            pin_token,
            key_agreement_secret,
            key_agreement_pub,
            device_lockout: false,
            continuation: None,
            last_command: LastCommand::None,
        }
    }

    /// Factory reset (§4.7): clears PIN, restores retries, drops lockout,
    /// regenerates the key-agreement pair and the master secret.
    pub fn reset(&mut self, rng: &mut dyn Rng) {
        let mut new_secret = [0u8; 32];
        rng.fill(&mut new_secret);
        self.device_master_secret = new_secret;
        self.pin_code_set = false;
        self.pin_code_hash = [0u8; 16];
        self.pin_retries = PIN_RETRIES_MAX;
        self.device_lockout = false;
        self.regenerate_key_agreement(rng);
        self.continuation = None;
        self.last_command = LastCommand::None;
    }

    pub fn regenerate_key_agreement(&mut self, rng: &mut dyn Rng) {
        let (secret, public) = generate_keypair(rng);
        self.key_agreement_secret = secret;
        self.key_agreement_pub = public;
    }

    pub fn record_pin_failure(&mut self, rng: &mut dyn Rng) {
        self.regenerate_key_agreement(rng);
        self.pin_retries = self.pin_retries.saturating_sub(1);
        if self.pin_retries == 0 {
            self.device_lockout = true;
        }
    }

    pub fn record_pin_success(&mut self) {
        self.pin_retries = PIN_RETRIES_MAX;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::OsRng;

    #[test]
    fn init_produces_a_pristine_session() {
        let mut rng = OsRng;
        let session = AuthenticatorSession::init([0u8; 32], &mut rng);
        assert!(!session.pin_code_set);
        assert_eq!(session.pin_retries, PIN_RETRIES_MAX);
        assert!(!session.device_lockout);
    }

    #[test]
    fn eight_failures_trigger_lockout() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        for _ in 0..8 {
            session.record_pin_failure(&mut rng);
        }
        assert!(session.device_lockout);
        assert_eq!(session.pin_retries, 0);
    }

    #[test]
    fn reset_clears_lockout_and_pin() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        session.pin_code_set = true;
        for _ in 0..8 {
            session.record_pin_failure(&mut rng);
        }
        session.reset(&mut rng);
        assert!(!session.device_lockout);
        assert!(!session.pin_code_set);
        assert_eq!(session.pin_retries, PIN_RETRIES_MAX);
    }
}
