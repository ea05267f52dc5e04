use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{BoxedCapability, Capability};
use crate::error::Result;
use crate::llm::ModelSettings;
use crate::run::{PreparedRequest, RunContext};
use crate::spec::{SpecParam, SpecType};

/// Layers fixed settings over whatever the request already carries
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettingsCapability {
    settings: ModelSettings,
}

impl ModelSettingsCapability {
    pub fn new(settings: ModelSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Spec type `ModelSettings`: a settings mapping, positional or as keywords
    pub fn spec_type() -> SpecType<BoxedCapability> {
        SpecType::new(
            "ModelSettings",
            vec![SpecParam::required("settings", json!({ "type": "object" }))],
            |mut bound| {
                let settings = bound.remove("settings").unwrap_or(Value::Null);
                let capability: BoxedCapability =
                    Arc::new(ModelSettingsCapability::new(serde_json::from_value(settings)?));
                Ok(capability)
            },
        )
        .with_from_spec(|args, kwargs| {
            let settings = match args.first() {
                Some(value) => value.clone(),
                None => Value::Object(kwargs.clone()),
            };
            let capability: BoxedCapability =
                Arc::new(ModelSettingsCapability::new(serde_json::from_value(settings)?));
            Ok(capability)
        })
    }
}

#[async_trait]
impl Capability for ModelSettingsCapability {
    fn get_model_settings(&self) -> Option<ModelSettings> {
        Some(self.settings.clone())
    }

    async fn before_model_request(
        &self,
        _ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        request.model_settings = request.model_settings.merge(&self.settings);
        Ok(request)
    }
}

/// High-effort reasoning settings for providers that support them
#[derive(Debug, Clone, PartialEq)]
pub struct Thinking {
    inner: ModelSettingsCapability,
}

impl Thinking {
    pub fn new() -> Self {
        let settings = ModelSettings::new()
            .with_extra("openai_reasoning_effort", json!("high"))
            .with_extra("anthropic_thinking", json!({ "type": "adaptive" }));
        Self {
            inner: ModelSettingsCapability::new(settings),
        }
    }

    /// Spec type `Thinking`; arguments are ignored
    pub fn spec_type() -> SpecType<BoxedCapability> {
        let build = || -> BoxedCapability { Arc::new(Thinking::new()) };
        SpecType::new("Thinking", Vec::new(), move |_| Ok(build()))
            .with_from_spec(move |_, _| Ok(build()))
    }
}

impl Default for Thinking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for Thinking {
    fn get_model_settings(&self) -> Option<ModelSettings> {
        self.inner.get_model_settings()
    }

    async fn before_model_request(
        &self,
        ctx: &RunContext,
        request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        self.inner.before_model_request(ctx, request).await
    }
}
