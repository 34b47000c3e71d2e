pub mod client_pin;
pub mod get_assertion;
pub mod get_info;
pub mod make_credential;
pub mod reset;
