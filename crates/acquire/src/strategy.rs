use std::time::Duration;

use tunepress_config::{NetworkPosture, StrategyConfig};

/// One complete parameter profile for a download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionStrategy {
    pub name: String,
    pub client_profile: String,
    /// Fixed identity; when `None` one is drawn from the rotation pool.
    pub user_agent: Option<String>,
    pub network: NetworkPosture,
    /// Format tokens in preference order.
    pub formats: Vec<String>,
    pub timeout: Duration,
}

impl From<&StrategyConfig> for AcquisitionStrategy {
    fn from(cfg: &StrategyConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            client_profile: cfg.client_profile.clone(),
            user_agent: cfg.user_agent.clone(),
            network: cfg.network.clone(),
            formats: cfg.formats.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

/// Ordered, non-empty list of strategies. Attempt `k` uses entry `k mod len`.
#[derive(Debug, Clone)]
pub struct StrategySet {
    strategies: Vec<AcquisitionStrategy>,
}

impl StrategySet {
    /// `None` when `strategies` is empty.
    pub fn new(strategies: Vec<AcquisitionStrategy>) -> Option<Self> {
        (!strategies.is_empty()).then_some(Self { strategies })
    }

    pub fn from_config(configs: &[StrategyConfig]) -> Option<Self> {
        Self::new(configs.iter().map(AcquisitionStrategy::from).collect())
    }

    /// Strategy for the 0-based attempt index, cycling through the set.
    pub fn for_attempt(&self, attempt: u32) -> (usize, &AcquisitionStrategy) {
        let index = attempt as usize % self.strategies.len();
        (index, &self.strategies[index])
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AcquisitionStrategy> {
        self.strategies.iter()
    }
}
