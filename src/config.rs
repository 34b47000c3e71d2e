use p256::ecdsa::SigningKey;

/// Static, provisioning-time material the dispatcher needs but does not
/// generate itself: the batch attestation key/certificate and the device
/// identity. Supplied once at construction; never mutated by a command.
pub struct AuthenticatorConfig {
    pub aaguid: [u8; 16],
    pub max_msg_size: u32,
    pub attestation_key: SigningKey,
    pub attestation_cert_der: Vec<u8>,
}

impl AuthenticatorConfig {
    pub fn new(aaguid: [u8; 16], attestation_key: SigningKey, attestation_cert_der: Vec<u8>) -> Self {
        AuthenticatorConfig {
            aaguid,
            max_msg_size: 1200,
            attestation_key,
            attestation_cert_der,
        }
    }

    /// A fixed, deterministic config for tests: no real CA involved.
    #[cfg(any(test, feature = "test-support"))]
    pub fn for_testing() -> Self {
        let attestation_key = SigningKey::from_bytes(&[0x55u8; 32].into()).unwrap();
        AuthenticatorConfig::new([0x42u8; 16], attestation_key, vec![0x30, 0x00])
    }
}
