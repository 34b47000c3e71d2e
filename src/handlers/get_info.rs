//! get-info: a pure read of static config plus the current PIN-set flag.

use crate::codec;
use crate::config::AuthenticatorConfig;
use crate::session::AuthenticatorSession;

pub fn handle(session: &AuthenticatorSession, config: &AuthenticatorConfig) -> Vec<u8> {
    codec::get_info_response(config, session.pin_code_set)
}
