use serde::{Deserialize, Serialize};

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Free-text description of the arguments, shown verbatim in the prompt.
    pub parameter_hints: String,
    /// Argument names that must be present before the tool may run.
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolDescriptor {
    pub fn new(
        name: &str,
        description: &str,
        parameter_hints: &str,
        required: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameter_hints: parameter_hints.to_string(),
            required: required.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Prompt-ready description block for this tool.
    pub fn render(&self) -> String {
        format!(
            "> Tool Name: {}\nTool Description: {}\nTool Args: {}\n",
            self.name, self.description, self.parameter_hints
        )
    }
}
