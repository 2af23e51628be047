use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Thought recorded when the model answers without following the protocol.
pub const IMPLICIT_THOUGHT: &str = "(implicit)";

/// One classified unit of model output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// The model asked for a tool to be run.
    Action {
        thought: String,
        action: String,
        action_input: BTreeMap<String, String>,
    },
    /// The model produced its final answer for this turn.
    Answer { thought: String, answer: String },
    /// The output could not be interpreted.
    ParseError { raw_text: String, reason: String },
}

impl ReasoningStep {
    pub fn answer(thought: impl Into<String>, answer: impl Into<String>) -> Self {
        ReasoningStep::Answer {
            thought: thought.into(),
            answer: answer.into(),
        }
    }

    pub fn parse_error(raw_text: impl Into<String>, reason: impl Into<String>) -> Self {
        ReasoningStep::ParseError {
            raw_text: raw_text.into(),
            reason: reason.into(),
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self, ReasoningStep::Action { .. })
    }

    /// Render the step back into protocol text, as the model would have written it.
    pub fn to_protocol_text(&self) -> String {
        match self {
            ReasoningStep::Action {
                thought,
                action,
                action_input,
            } => {
                let input = serde_json::to_string(action_input).unwrap_or_else(|_| "{}".into());
                format!("Thought: {thought}\nAction: {action}\nAction Input: {input}")
            }
            ReasoningStep::Answer { thought, answer } => {
                format!("Thought: {thought}\nAnswer: {answer}")
            }
            ReasoningStep::ParseError { raw_text, .. } => raw_text.clone(),
        }
    }
}

/// An entry of the per-turn reasoning history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScratchpadEntry {
    Step { step: ReasoningStep },
    Observation { content: String },
}

impl ScratchpadEntry {
    pub fn step(step: ReasoningStep) -> Self {
        ScratchpadEntry::Step { step }
    }

    pub fn observation(content: impl Into<String>) -> Self {
        ScratchpadEntry::Observation {
            content: content.into(),
        }
    }

    /// Observations go back as user messages, the model's own steps as assistant messages.
    pub fn to_message(&self) -> Message {
        match self {
            ScratchpadEntry::Step { step } => Message::assistant(step.to_protocol_text()),
            ScratchpadEntry::Observation { content } => {
                Message::user(format!("Observation: {content}"))
            }
        }
    }
}
