use serde::{Deserialize, Serialize};

pub const INPUT_NAME: &str = "inputs";
pub const OUTPUT_NAME: &str = "outputs";

/// A named tensor exposed by an exported model. `-1` marks the batch dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<i64>,
    pub dtype: String,
}

impl TensorSpec {
    pub fn f32(name: &str, shape: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            shape,
            dtype: "f32".to_string(),
        }
    }
}

/// Inputs and outputs a serving system can look up by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSignature {
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn input(&self, name: &str) -> Option<&TensorSpec> {
        self.inputs.iter().find(|t| t.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&TensorSpec> {
        self.outputs.iter().find(|t| t.name == name)
    }
}
