use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{BoxedCapability, Capability, Instruction, Instructions};
use crate::spec::{SpecParam, SpecType};

/// Contributes fixed or dynamic instructions
#[derive(Debug, Clone)]
pub struct InstructionsCapability {
    instructions: Instructions,
}

impl InstructionsCapability {
    pub fn new(instructions: impl Into<Instructions>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Spec type `Instructions`: a string or a list of strings
    pub fn spec_type() -> SpecType<BoxedCapability> {
        SpecType::from_deserialize(
            "Instructions",
            vec![SpecParam::required(
                "instructions",
                json!({
                    "anyOf": [
                        { "type": "string" },
                        { "type": "array", "items": { "type": "string" } }
                    ]
                }),
            )],
            |args: InstructionsArgs| {
                let instructions = match args.instructions {
                    TextOrList::Text(text) => Instructions::One(Instruction::Static(text)),
                    TextOrList::List(items) => {
                        Instructions::Many(items.into_iter().map(Instruction::Static).collect())
                    }
                };
                let capability: BoxedCapability = Arc::new(InstructionsCapability { instructions });
                Ok(capability)
            },
        )
    }
}

#[derive(Deserialize)]
struct InstructionsArgs {
    instructions: TextOrList,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl Capability for InstructionsCapability {
    fn get_instructions(&self) -> Option<Instructions> {
        Some(self.instructions.clone())
    }
}
