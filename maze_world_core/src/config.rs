use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Static limits and randomness settings for a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub max_height: i32,
    pub max_width: i32,
    /// Seed for the map's random source; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            max_height: 10,
            max_width: 10,
            seed: None,
        }
    }
}

impl MapConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn make_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
