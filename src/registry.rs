//! Model name → loaded speech engine.
//!
//! The process-wide registry is installed once at start-up and only read
//! afterwards.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::error::{DubError, Result};
use crate::tts::TtsEngine;

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub available_voices: Vec<String>,
    pub running: bool,
    pub voice_cloning: bool,
}

#[derive(Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn TtsEngine>>,
    // Configured but not loaded.
    declared: BTreeMap<String, ModelInfo>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, engine: Arc<dyn TtsEngine>) {
        self.models.insert(name.into(), engine);
    }

    /// Records a configured model that could not be loaded, so listings still
    /// show it. Lookups of it fail with [`DubError::ModelNotFound`].
    pub fn declare(&mut self, name: impl Into<String>, available_voices: Vec<String>, voice_cloning: bool) {
        let name = name.into();
        self.declared.insert(
            name.clone(),
            ModelInfo {
                name,
                available_voices,
                running: false,
                voice_cloning,
            },
        );
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn TtsEngine>> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| DubError::ModelNotFound(name.to_string()))
    }

    /// Loaded and declared models by name; a loaded engine wins over a
    /// declaration of the same name.
    pub fn list(&self) -> Vec<ModelInfo> {
        let mut listed: BTreeMap<&str, ModelInfo> = self
            .declared
            .iter()
            .map(|(name, info)| (name.as_str(), info.clone()))
            .collect();
        for (name, engine) in &self.models {
            listed.insert(
                name.as_str(),
                ModelInfo {
                    name: name.clone(),
                    available_voices: engine.available_voices(),
                    running: true,
                    voice_cloning: engine.supports_voice_cloning(),
                },
            );
        }
        listed.into_values().collect()
    }
}

static GLOBAL: OnceLock<ModelRegistry> = OnceLock::new();

/// Installs the process-wide registry. Fails if one is already installed.
pub fn install(registry: ModelRegistry) -> Result<&'static ModelRegistry> {
    GLOBAL
        .set(registry)
        .map_err(|_| DubError::Config("model registry already installed".into()))?;
    global()
}

pub fn global() -> Result<&'static ModelRegistry> {
    GLOBAL
        .get()
        .ok_or_else(|| DubError::Config("model registry not installed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::{SpeechRequest, SpeechResult, Workspace};
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl TtsEngine for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn available_voices(&self) -> Vec<String> {
            vec!["Mute".into()]
        }

        fn supports_voice_cloning(&self) -> bool {
            true
        }

        async fn generate(&self, _: &SpeechRequest, _: Workspace<'_>) -> Result<SpeechResult> {
            Err(DubError::Tts("silent engine".into()))
        }
    }

    #[test]
    fn looks_up_registered_engines() {
        let mut registry = ModelRegistry::new();
        registry.register("silent-1", Arc::new(Silent));

        assert_eq!(registry.get("silent-1").unwrap().name(), "silent");
        assert!(matches!(
            registry.get("missing"),
            Err(DubError::ModelNotFound(name)) if name == "missing"
        ));

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "silent-1");
        assert_eq!(listed[0].available_voices, ["Mute"]);
        assert!(listed[0].running && listed[0].voice_cloning);
    }

    #[test]
    fn declared_models_are_listed_as_not_running() {
        let mut registry = ModelRegistry::new();
        registry.declare("offline-tts", vec!["alloy".into()], false);
        registry.declare("silent-1", Vec::new(), false);
        registry.register("silent-1", Arc::new(Silent));

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "offline-tts");
        assert!(!listed[0].running);
        assert_eq!(listed[0].available_voices, ["alloy"]);
        assert_eq!(listed[1].name, "silent-1");
        assert!(listed[1].running);

        assert!(matches!(
            registry.get("offline-tts"),
            Err(DubError::ModelNotFound(name)) if name == "offline-tts"
        ));
    }

    #[test]
    fn global_installs_once() {
        let mut registry = ModelRegistry::new();
        registry.register("silent-1", Arc::new(Silent));
        install(registry).unwrap();

        assert!(global().unwrap().get("silent-1").is_ok());
        assert!(install(ModelRegistry::new()).is_err());
    }
}
