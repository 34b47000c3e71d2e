//! Command-processing core of a FIDO2/CTAP2 hardware authenticator.
//!
//! This crate implements the dispatcher and per-command state machines
//! (make-credential, get-assertion/get-next-assertion, client-PIN, reset,
//! get-info), the stateless-credential tag scheme, authenticator-data
//! assembly, and the ECDSA signing pipeline. It does not implement a
//! transport (USB-HID/CTAPHID framing), hardware user-presence/RNG, or
//! persistent storage — those are supplied by the embedder through the
//! traits in [`oracles`] and the value in [`session::AuthenticatorSession`].

pub mod authdata;
pub mod cbor;
pub mod codec;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod oracles;
pub mod session;
pub mod signing;
pub mod status;

pub use config::AuthenticatorConfig;
pub use dispatch::handle_packet;
pub use error::{CtapError, Result};
pub use session::AuthenticatorSession;
