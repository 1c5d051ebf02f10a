//! Random number generation. The free-running mode draws from a
//! ChaCha8 generator seeded by entropy; the predictable mode is a
//! 32-bit xorshift whose state is small enough to persist in saves.
use rand::Rng as _;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Generator-kind tag stored with persisted state
pub const KIND_XORSHIFT: &[u8; 4] = b"XORS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mode {
    Random,
    Predictable,
}

#[derive(Clone)]
pub struct ZRng {
    mode: Mode,
    rng: ChaCha8Rng,
    state: u32,
}

impl Default for ZRng {
    fn default() -> Self {
        ZRng::new()
    }
}

impl ZRng {
    pub fn new() -> ZRng {
        ZRng {
            mode: Mode::Random,
            rng: ChaCha8Rng::from_entropy(),
            state: 1,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Reseeds the generator: 0 returns to the free-running mode from
    /// fresh entropy, any other value enters the predictable mode with
    /// that seed.
    pub fn seed(&mut self, seed: u16) {
        if seed == 0 {
            self.rng = ChaCha8Rng::from_entropy();
            self.mode = Mode::Random;
            debug!(target: "app::state", "RNG reseeded from entropy");
        } else {
            self.state = seed as u32;
            self.mode = Mode::Predictable;
            debug!(target: "app::state", "RNG predictable, seed {}", seed);
        }
    }

    fn next_predictable(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// A random value in 1..=range. A range of 0 yields 1.
    pub fn random(&mut self, range: u16) -> u16 {
        if range == 0 {
            return 1;
        }
        match self.mode {
            Mode::Predictable => (self.next_predictable() % range as u32) as u16 + 1,
            Mode::Random => self.rng.gen_range(1..=range),
        }
    }

    /// The persistable state: only the predictable mode has one. The
    /// free-running generator is reseeded from entropy on restore
    /// instead.
    pub fn predictable_state(&self) -> Option<u32> {
        match self.mode {
            Mode::Predictable => Some(self.state),
            Mode::Random => None,
        }
    }

    /// Re-enters the predictable mode with a persisted state word.
    pub fn restore_state(&mut self, state: u32) {
        // xorshift sticks at 0
        self.state = if state == 0 { 1 } else { state };
        self.mode = Mode::Predictable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_mode_range() {
        let mut rng = ZRng::new();
        assert_eq!(rng.mode(), &Mode::Random);
        for _ in 0..100 {
            let v = rng.random(6);
            assert!((1..=6).contains(&v));
        }
        assert!(rng.predictable_state().is_none());
    }

    #[test]
    fn test_seed_zero_is_random() {
        let mut rng = ZRng::new();
        rng.seed(12345);
        assert_eq!(rng.mode(), &Mode::Predictable);
        rng.seed(0);
        assert_eq!(rng.mode(), &Mode::Random);
        assert!(rng.predictable_state().is_none());
    }

    #[test]
    fn test_predictable_deterministic() {
        let mut a = ZRng::new();
        let mut b = ZRng::new();
        a.seed(12345);
        b.seed(12345);
        for _ in 0..32 {
            assert_eq!(a.random(100), b.random(100));
        }
    }

    #[test]
    fn test_predictable_range() {
        let mut rng = ZRng::new();
        rng.seed(99);
        for _ in 0..100 {
            let v = rng.random(10);
            assert!((1..=10).contains(&v));
        }
    }

    #[test]
    fn test_restore_state_resumes_sequence() {
        let mut a = ZRng::new();
        a.seed(5555);
        a.random(100);
        a.random(100);
        let state = a.predictable_state();
        assert!(state.is_some());

        let mut b = ZRng::new();
        b.restore_state(state.unwrap());
        for _ in 0..16 {
            assert_eq!(a.random(100), b.random(100));
        }
    }

    #[test]
    fn test_restore_state_zero() {
        let mut rng = ZRng::new();
        rng.restore_state(0);
        assert_eq!(rng.mode(), &Mode::Predictable);
        // Must not get stuck yielding a constant
        let first = rng.random(1000);
        let mut varied = false;
        for _ in 0..16 {
            if rng.random(1000) != first {
                varied = true;
            }
        }
        assert!(varied);
    }

    #[test]
    fn test_range_zero() {
        let mut rng = ZRng::new();
        assert_eq!(rng.random(0), 1);
        rng.seed(7);
        assert_eq!(rng.random(0), 1);
    }
}
