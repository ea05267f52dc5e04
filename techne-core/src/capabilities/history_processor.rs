use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::Capability;
use crate::error::{Result, TechneError};
use crate::messages::ModelMessage;
use crate::run::{PreparedRequest, RunContext};

/// Rewrites the message history before it is sent to the model
#[async_trait]
pub trait HistoryProcessor: Send + Sync {
    async fn process(&self, ctx: &RunContext, messages: Vec<ModelMessage>) -> Result<Vec<ModelMessage>>;
}

/// History processor backed by a plain function
pub struct HistoryProcessorFn<F>(F);

#[async_trait]
impl<F> HistoryProcessor for HistoryProcessorFn<F>
where
    F: Fn(&RunContext, Vec<ModelMessage>) -> Result<Vec<ModelMessage>> + Send + Sync,
{
    async fn process(&self, ctx: &RunContext, messages: Vec<ModelMessage>) -> Result<Vec<ModelMessage>> {
        (self.0)(ctx, messages)
    }
}

pub fn history_processor_fn<F>(processor: F) -> Arc<dyn HistoryProcessor>
where
    F: Fn(&RunContext, Vec<ModelMessage>) -> Result<Vec<ModelMessage>> + Send + Sync + 'static,
{
    Arc::new(HistoryProcessorFn(processor))
}

/// Check a processed history before it is sent
///
/// The history must be non-empty and end with a request. A final request
/// without a timestamp gets the current time.
pub fn validate_history(messages: &mut [ModelMessage]) -> Result<()> {
    match messages.last_mut() {
        None => Err(TechneError::User(
            "Processed history cannot be empty.".to_string(),
        )),
        Some(ModelMessage::Response(_)) => Err(TechneError::User(
            "Processed history must end with a `ModelRequest`.".to_string(),
        )),
        Some(ModelMessage::Request(request)) => {
            if request.timestamp.is_none() {
                request.timestamp = Some(Utc::now());
            }
            Ok(())
        }
    }
}

/// Runs a [`HistoryProcessor`] as part of every model request
#[derive(Clone)]
pub struct HistoryProcessorCapability {
    processor: Arc<dyn HistoryProcessor>,
}

impl HistoryProcessorCapability {
    pub fn new(processor: Arc<dyn HistoryProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Capability for HistoryProcessorCapability {
    async fn before_model_request(
        &self,
        ctx: &RunContext,
        mut request: PreparedRequest,
    ) -> Result<PreparedRequest> {
        let mut messages = self.processor.process(ctx, request.messages).await?;
        validate_history(&mut messages)?;
        request.messages = messages;
        Ok(request)
    }
}
