use dog_core::DogConfigSnapshot;

pub const MAX_DEPTH_KEY: &str = "graph.max_depth";
pub const DEFAULT_LIMIT_KEY: &str = "graph.default_limit";
pub const MAX_LIMIT_KEY: &str = "graph.max_limit";

/// Engine settings read from the app configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    /// Deepest request tree accepted, counting the root selection as 1.
    pub max_depth: usize,
    /// Page size for collection fields when the request gives none.
    pub default_limit: Option<usize>,
    /// Upper clamp for any page size.
    pub max_limit: Option<usize>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_depth: 8,
            default_limit: None,
            max_limit: None,
        }
    }
}

impl GraphSettings {
    pub fn from_config(config: &DogConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            max_depth: config.get_usize(MAX_DEPTH_KEY).unwrap_or(defaults.max_depth),
            default_limit: config.get_usize(DEFAULT_LIMIT_KEY),
            max_limit: config.get_usize(MAX_LIMIT_KEY),
        }
    }

    /// Effective page size for a requested limit.
    pub fn page_limit(&self, requested: Option<usize>) -> Option<usize> {
        match (requested.or(self.default_limit), self.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, max) => max,
            (limit, None) => limit,
        }
    }
}
