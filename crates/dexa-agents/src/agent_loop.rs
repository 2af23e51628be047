use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dexa_models::message::{Message, UserIdentity};
use dexa_models::reasoning::{ReasoningStep, ScratchpadEntry};
use tracing::{debug, error, info, warn};

use crate::dispatcher::ToolDispatcher;
use crate::error::AgentError;
use crate::model::ModelClient;
use crate::parser;
use crate::prompts::{identity_context, PromptFormatter};

/// Reply once the tool-call budget of a turn is spent.
pub const REFUSAL: &str = "Sorry, I cannot answer your query with the provided tools.";

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered,
    /// The model broke the reasoning protocol; its raw text was returned.
    ParseFailed,
    /// `max_iterations` tool calls were made without an answer.
    Exhausted,
    /// The model call failed or timed out.
    ModelFailed,
    /// The system prompt could not be rendered.
    PromptFailed,
}

/// Everything a turn produced, for callers that need more than the reply.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub reply: String,
    pub outcome: TurnOutcome,
    /// Tool calls executed.
    pub iterations: usize,
    pub scratchpad: Vec<ScratchpadEntry>,
}

/// Drives Thought / Action / Observation cycles until the model answers.
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    formatter: PromptFormatter,
    dispatcher: Arc<ToolDispatcher>,
    max_iterations: usize,
    model_timeout: Duration,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn ModelClient>,
        formatter: PromptFormatter,
        dispatcher: Arc<ToolDispatcher>,
        max_iterations: usize,
        model_timeout: Duration,
    ) -> Self {
        Self {
            model,
            formatter,
            dispatcher,
            max_iterations,
            model_timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Answer `query` given the prior `transcript`. Never fails: every error
    /// becomes reply text.
    pub async fn run(&self, query: &str, transcript: &[Message], identity: &UserIdentity) -> String {
        self.run_turn(query, transcript, identity).await.reply
    }

    pub async fn run_turn(
        &self,
        query: &str,
        transcript: &[Message],
        identity: &UserIdentity,
    ) -> TurnReport {
        let start = Instant::now();
        let context = identity_context(identity);
        let tools = self.dispatcher.registry().descriptors();

        let mut conversation = transcript.to_vec();
        conversation.push(Message::user(query));

        let mut scratchpad: Vec<ScratchpadEntry> = Vec::new();
        let mut iterations = 0;

        info!(
            user_id = %identity.user_id,
            model = %self.model.name(),
            history = transcript.len(),
            "Starting turn"
        );

        let (reply, outcome) = loop {
            let prompt = match self
                .formatter
                .format(tools, &conversation, &scratchpad, &context)
            {
                Ok(prompt) => prompt,
                Err(e) => {
                    error!(error = %e, "Failed to build prompt");
                    break (failure_reply(&e), TurnOutcome::PromptFailed);
                }
            };

            let raw = match self.generate(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    error!(error = %e, iterations, "Model call failed");
                    break (failure_reply(&e), TurnOutcome::ModelFailed);
                }
            };

            match parser::parse(&raw) {
                ReasoningStep::Answer { thought, answer } => {
                    debug!(thought = %thought, "Model answered");
                    scratchpad.push(ScratchpadEntry::step(ReasoningStep::answer(
                        thought,
                        answer.clone(),
                    )));
                    break (answer, TurnOutcome::Answered);
                }
                ReasoningStep::ParseError { raw_text, reason } => {
                    warn!(reason = %reason, iterations, "Model output did not follow the protocol");
                    break (
                        format!(
                            "I could not make sense of my own reasoning for that request, \
                             so nothing was executed. Raw output:\n{raw_text}"
                        ),
                        TurnOutcome::ParseFailed,
                    );
                }
                ReasoningStep::Action {
                    thought,
                    action,
                    action_input,
                } => {
                    if iterations >= self.max_iterations {
                        warn!(iterations, action = %action, "Tool budget spent, action not run");
                        break (REFUSAL.to_string(), TurnOutcome::Exhausted);
                    }

                    let observation = self.act(identity, &action, &action_input).await;
                    scratchpad.push(ScratchpadEntry::step(ReasoningStep::Action {
                        thought,
                        action,
                        action_input,
                    }));
                    scratchpad.push(ScratchpadEntry::observation(observation));
                    iterations += 1;

                    if iterations >= self.max_iterations {
                        warn!(iterations, "Tool budget exhausted without an answer");
                        break (REFUSAL.to_string(), TurnOutcome::Exhausted);
                    }
                }
            }
        };

        info!(
            outcome = ?outcome,
            iterations,
            elapsed_ms = start.elapsed().as_millis(),
            "Turn complete"
        );

        TurnReport {
            reply,
            outcome,
            iterations,
            scratchpad,
        }
    }

    async fn generate(&self, prompt: &[Message]) -> Result<String, AgentError> {
        tokio::time::timeout(self.model_timeout, self.model.generate(prompt))
            .await
            .map_err(|_| AgentError::Timeout(self.model_timeout.as_secs()))?
    }

    /// Run the requested tool; failures become observation text for the model.
    async fn act(
        &self,
        identity: &UserIdentity,
        action: &str,
        input: &BTreeMap<String, String>,
    ) -> String {
        match self.dispatcher.invoke(identity, action, input).await {
            Ok(observation) => observation,
            Err(e) => format!("Error: {e}"),
        }
    }
}

fn failure_reply(error: &AgentError) -> String {
    format!("Sorry, I ran into a problem while working on your request: {error}. Please try again.")
}
