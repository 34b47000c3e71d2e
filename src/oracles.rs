//! Synchronous collaborator interfaces the dispatcher calls into. Real
//! implementations live outside this crate (hardware touch sensor, a
//! monotonic counter backed by flash, a hardware RNG); tests supply
//! deterministic fakes.

/// Tests for physical user presence (e.g. a button press). Treated as a
/// synchronous oracle: no suspension happens inside a command (see §5).
pub trait UserPresence {
    fn test(&mut self) -> bool;
}

/// A strictly monotonic, non-zero 32-bit counter, incremented once per call.
pub trait SignCounter {
    fn increment(&mut self) -> u32;
}

/// Fills a buffer with random bytes.
pub trait Rng {
    fn fill(&mut self, buf: &mut [u8]);
}

/// `rand::rngs::OsRng`-backed `Rng`, the default outside of tests.
#[derive(Default)]
pub struct OsRng;

impl Rng for OsRng {
    fn fill(&mut self, buf: &mut [u8]) {
        use rand::RngCore;
        rand::rngs::OsRng.fill_bytes(buf);
    }
}
