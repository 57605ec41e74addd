use serde::{Deserialize, Serialize};

/// Point-in-time occupancy of the attachment cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub weight: u64,
    pub limit: u64,
    pub count: u64,
}

impl CacheStats {
    /// Fraction of the weight limit currently in use.
    pub fn occupancy(&self) -> f64 {
        if self.limit == 0 {
            return 0.0;
        }
        self.weight as f64 / self.limit as f64
    }
}
