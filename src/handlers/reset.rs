//! Factory reset (C10), gated on user presence. §4.7.

use crate::error::{CtapError, Result};
use crate::oracles::{Rng, UserPresence};
use crate::session::AuthenticatorSession;

pub fn handle(
    session: &mut AuthenticatorSession,
    presence: &mut dyn UserPresence,
    rng: &mut dyn Rng,
) -> Result<Vec<u8>> {
    if !presence.test() {
        return Err(CtapError::NotAllowed);
    }
    session.reset(rng);
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracles::OsRng;

    struct Never;
    impl UserPresence for Never {
        fn test(&mut self) -> bool {
            false
        }
    }

    struct Always;
    impl UserPresence for Always {
        fn test(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn requires_user_presence() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        let mut presence = Never;
        let result = handle(&mut session, &mut presence, &mut rng);
        assert_eq!(result.unwrap_err(), CtapError::NotAllowed);
    }

    #[test]
    fn clears_lockout_when_presence_confirmed() {
        let mut rng = OsRng;
        let mut session = AuthenticatorSession::init([0u8; 32], &mut rng);
        session.device_lockout = true;
        session.pin_retries = 0;
        let mut presence = Always;
        handle(&mut session, &mut presence, &mut rng).unwrap();
        assert!(!session.device_lockout);
        assert_eq!(session.pin_retries, 8);
    }
}
