//! CTAP2 command and status byte constants (FIDO Alliance CTAP2 spec).

/// First byte of a request packet.
pub mod command {
    pub const MAKE_CREDENTIAL: u8 = 0x01;
    pub const GET_ASSERTION: u8 = 0x02;
    pub const GET_INFO: u8 = 0x04;
    pub const CLIENT_PIN: u8 = 0x06;
    pub const RESET: u8 = 0x07;
    pub const GET_NEXT_ASSERTION: u8 = 0x08;
    pub const CANCEL: u8 = 0x11;
}

/// Client-PIN subcommand byte (`subCommand`, map key 0x02).
pub mod pin_subcommand {
    pub const GET_RETRIES: u8 = 0x01;
    pub const GET_KEY_AGREEMENT: u8 = 0x02;
    pub const SET_PIN: u8 = 0x03;
    pub const CHANGE_PIN: u8 = 0x04;
    pub const GET_PIN_TOKEN: u8 = 0x05;
}

/// First byte of a response packet.
pub const CTAP1_ERR_SUCCESS: u8 = 0x00;
