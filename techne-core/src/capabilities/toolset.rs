use std::sync::Arc;

use super::Capability;
use crate::tools::BoxedToolset;

/// Exposes an existing toolset
///
/// Holds a live object, so it has no spec form.
#[derive(Clone)]
pub struct ToolsetCapability {
    toolset: BoxedToolset,
}

impl ToolsetCapability {
    pub fn new(toolset: BoxedToolset) -> Self {
        Self { toolset }
    }
}

impl Capability for ToolsetCapability {
    fn get_toolset(&self) -> Option<BoxedToolset> {
        Some(Arc::clone(&self.toolset))
    }
}
