use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Chooses an index in `0..len`. `len` is never zero.
pub trait ShufflePicker: Send {
    fn pick(&mut self, len: usize) -> usize;
}

/// Uniform picker over a seeded `StdRng`.
pub struct RandomPicker {
    rng: StdRng,
}

impl RandomPicker {
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        if let Err(err) = getrandom::fill(&mut seed) {
            warn!("Failed to gather a random seed, shuffle falls back to time seed: {}", err);
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos() as u64)
                .unwrap_or_default();
            return Self::seeded(nanos);
        }
        Self {
            rng: StdRng::from_seed(seed),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ShufflePicker for RandomPicker {
    fn pick(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}
