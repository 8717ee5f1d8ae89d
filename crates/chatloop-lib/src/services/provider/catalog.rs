// Model catalog
// Capability flags of every model the provider offers, loaded once at startup

use std::collections::HashMap;

use serde::Serialize;

use super::{CompletionProvider, ProviderModel, ProviderResult};

/// A chat model and what it can do
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tools: bool,
    pub reasoning: bool,
    pub json: bool,
    pub vision: bool,
    /// Can generate images
    pub images: bool,
}

impl From<&ProviderModel> for Model {
    fn from(model: &ProviderModel) -> Self {
        let supports = |parameter: &str| {
            model
                .supported_parameters
                .iter()
                .any(|supported| supported == parameter)
        };

        let has = |modalities: &[String], modality: &str| modalities.iter().any(|m| m == modality);

        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            description: model.description.clone(),
            tools: supports("tools"),
            reasoning: supports("reasoning"),
            json: supports("response_format") || supports("structured_outputs"),
            vision: has(&model.architecture.input_modalities, "image"),
            images: has(&model.architecture.output_modalities, "image"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<Model>,
    index: HashMap<String, usize>,
}

impl ModelCatalog {
    pub fn new(models: Vec<Model>) -> Self {
        let index = models
            .iter()
            .enumerate()
            .map(|(i, model)| (model.id.clone(), i))
            .collect();

        Self { models, index }
    }

    pub async fn load(provider: &dyn CompletionProvider) -> ProviderResult<Self> {
        let listing = provider.list_models().await?;
        let catalog = Self::new(listing.iter().map(Model::from).collect());

        log::info!(
            "[provider] Loaded {} models from {}",
            catalog.len(),
            provider.name()
        );

        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&Model> {
        self.index.get(id).map(|&i| &self.models[i])
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::testing::ScriptedProvider;
    use crate::services::provider::Architecture;

    fn listing() -> Vec<ProviderModel> {
        vec![
            ProviderModel {
                id: "openai/gpt-4o".to_string(),
                name: "GPT-4o".to_string(),
                description: String::new(),
                supported_parameters: vec![
                    "tools".to_string(),
                    "structured_outputs".to_string(),
                ],
                architecture: Architecture {
                    input_modalities: vec!["text".to_string(), "image".to_string()],
                    output_modalities: vec!["text".to_string()],
                },
            },
            ProviderModel {
                id: "google/gemini-image".to_string(),
                name: "Gemini Image".to_string(),
                description: String::new(),
                supported_parameters: vec!["reasoning".to_string()],
                architecture: Architecture {
                    input_modalities: vec!["text".to_string()],
                    output_modalities: vec!["image".to_string(), "text".to_string()],
                },
            },
        ]
    }

    #[test]
    fn test_capabilities_from_listing() {
        let models: Vec<Model> = listing().iter().map(Model::from).collect();

        assert!(models[0].tools && models[0].json && models[0].vision);
        assert!(!models[0].reasoning && !models[0].images);

        assert!(models[1].reasoning && models[1].images);
        assert!(!models[1].tools && !models[1].json && !models[1].vision);
    }

    #[tokio::test]
    async fn test_load_catalog() {
        let mut provider = ScriptedProvider::new();
        provider.models = listing();

        let catalog = ModelCatalog::load(&provider).await.unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("openai/gpt-4o").unwrap().name, "GPT-4o");
        assert!(catalog.get("unknown/model").is_none());
    }
}
