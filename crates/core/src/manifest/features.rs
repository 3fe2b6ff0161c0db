use serde::{Deserialize, Serialize};

/// Feature toggles enabled in a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureToggles(pub Vec<String>);

impl FeatureToggles {
    /// Auto-versioning plus the self-updating pipeline job
    pub const UPDATE_PIPELINE: &'static str = "update-pipeline";
    /// Split docker-push into build and publish jobs
    pub const DOCKER_DECOMPOSE: &'static str = "docker-decompose";
    /// Use the v7 cf CLI for deployments
    pub const CF_V7: &'static str = "cf-v7";
    /// Use the newer cf deploy resource
    pub const NEW_DEPLOY_RESOURCE: &'static str = "new-deploy-resource";

    /// Every toggle the compiler understands
    pub const AVAILABLE: [&'static str; 4] = [
        Self::UPDATE_PIPELINE,
        Self::DOCKER_DECOMPOSE,
        Self::CF_V7,
        Self::NEW_DEPLOY_RESOURCE,
    ];

    /// Create from a list of toggle names
    pub fn new<I, S>(toggles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(toggles.into_iter().map(Into::into).collect())
    }

    /// Whether the toggle is enabled
    #[must_use]
    pub fn contains(&self, toggle: &str) -> bool {
        self.0.iter().any(|t| t == toggle)
    }

    /// Whether no toggles are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the pipeline updates itself and versions its builds
    #[must_use]
    pub fn update_pipeline(&self) -> bool {
        self.contains(Self::UPDATE_PIPELINE)
    }

    /// Builds carry a semantic version; currently implied by `update-pipeline`
    #[must_use]
    pub fn versioned(&self) -> bool {
        self.update_pipeline()
    }

    /// Toggles that are not in [`Self::AVAILABLE`]
    pub fn unknown(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .map(String::as_str)
            .filter(|t| !Self::AVAILABLE.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_pipeline() {
        assert!(!FeatureToggles::default().update_pipeline());
        assert!(FeatureToggles::new(["update-pipeline"]).versioned());
    }

    #[test]
    fn test_unknown_toggles() {
        let toggles = FeatureToggles::new(["cf-v7", "bananas", "update-pipeline", "kiwi"]);
        assert_eq!(toggles.unknown().collect::<Vec<_>>(), vec!["bananas", "kiwi"]);
    }
}
