use std::collections::{BTreeMap, BTreeSet};

use dexa_models::message::{Message, UserIdentity};
use dexa_models::reasoning::ScratchpadEntry;
use dexa_models::tool::ToolDescriptor;

use crate::error::AgentError;

/// Keys filled by the formatter itself from the tool catalog.
pub const TOOL_KEYS: [&str; 2] = ["tool_desc", "tool_names"];

/// Keys filled from the session's [`UserIdentity`].
pub const IDENTITY_KEYS: [&str; 3] = ["userId", "userName", "displayName"];

/// Built-in ReAct system header. `{name}` is a placeholder; `{{` and `}}` are literal braces.
pub const DEFAULT_SYSTEM_HEADER: &str = "\
You are a trading assistant bot that helps users buy or sell tokens on SUI, as well as \
provide information about tokens, user positions, and wallet details. To assist users \
effectively, follow these guidelines:

### For Buying or Selling Tokens:
1. **Token Address**: Required for trading. If multiple tokens match the query, ask the user to choose one.
2. **Amount**:
   - For buying: Amount in SUI.
   - For selling: Percentage options (25%, 50%, 75%, 100%).
3. **Wallet**: The wallet address to trade from. If the user has several wallets, ask which one.

### For Providing Information:
1. **Token Information**: Use tools to retrieve details like token name, symbol, price, and contract address. Reply with the name, price and contract address.
2. **User Positions**: Use tools to fetch the user's token holdings and balances in their wallets.
3. **Wallet Information**: Use tools to retrieve wallet addresses and balances.

Check the user's intention carefully. If they want to buy, sell, or retrieve information, \
collect all necessary details before proceeding.

If the user's question is not related to the above, answer from your knowledge about \
cryptocurrency, blockchain technology, trading, and market dynamics.
If the user is just greeting, greet back without using any tool.
Never invent input for a tool. If you do not have enough information, ask the user until you do.

## Tools
You are responsible for using the tools in any sequence you deem appropriate to complete \
the task at hand. This may require breaking the task into subtasks and using different \
tools to complete each subtask.

You have access to the following tools:
{tool_desc}

## Output Format
To answer the question, you MUST use the following format and ALWAYS start with `Thought`:

```
Thought: I need to use a tool to help me answer the question.
Action: tool name (one of {tool_names}) if using a tool.
Action Input: the input to the tool, in a JSON format representing the kwargs (e.g. {{\"input\": \"hello world\", \"num_beams\": 5}})
```

Please use a valid JSON format for the Action Input. Do NOT do this {{'input': 'hello world', 'num_beams': 5}}.

If this format is used, the user will respond in the following format:

```
Observation: tool response
```

You should keep repeating the above format until you have enough information to answer \
the question without using any more tools. At that point, you MUST respond in one of the \
following two formats:

```
Thought: I can answer without using any more tools.
Answer: [your answer here]
```

```
Thought: I cannot answer the question with the provided tools.
Answer: Sorry, I cannot answer your query.
```

## Additional Rules
- You MUST obey the function signature of each tool. Do NOT pass in no arguments if the function expects arguments.

## User Information
userId: {userId}, userName: {userName}, displayName: {displayName}

## Current Conversation
Below is the current conversation consisting of interleaving human and assistant messages.
";

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Assembles the system header, transcript and reasoning history into model input.
#[derive(Debug, Clone)]
pub struct PromptFormatter {
    template: String,
}

impl Default for PromptFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_HEADER)
    }
}

impl PromptFormatter {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Load a template from disk.
    pub fn from_path(path: &str) -> Result<Self, AgentError> {
        let template = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("cannot read system prompt {path}: {e}"))
        })?;
        Ok(Self::new(template))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names used by the template, in order of first use.
    pub fn placeholders(&self) -> Result<Vec<String>, AgentError> {
        let mut seen = BTreeSet::new();
        Ok(parse_template(&self.template)?
            .into_iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) if seen.insert(name.clone()) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Check that every placeholder is covered by the tool keys or `context_keys`.
    ///
    /// Called at startup so a broken template aborts before the first turn.
    pub fn validate(&self, context_keys: &[&str]) -> Result<(), AgentError> {
        let missing: Vec<String> = self
            .placeholders()?
            .into_iter()
            .filter(|name| {
                !TOOL_KEYS.contains(&name.as_str()) && !context_keys.contains(&name.as_str())
            })
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Configuration(format!(
                "system prompt uses unknown placeholders: {}",
                missing.join(", ")
            )))
        }
    }

    /// Build the full message list for the next model call.
    pub fn format(
        &self,
        tools: &[ToolDescriptor],
        transcript: &[Message],
        scratchpad: &[ScratchpadEntry],
        context: &BTreeMap<String, String>,
    ) -> Result<Vec<Message>, AgentError> {
        let mut values = context.clone();
        values.insert(
            "tool_desc".to_string(),
            tools
                .iter()
                .map(ToolDescriptor::render)
                .collect::<Vec<_>>()
                .join("\n"),
        );
        values.insert(
            "tool_names".to_string(),
            tools
                .iter()
                .map(|t| t.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        );

        let header = render(&self.template, &values)?;

        let mut messages = Vec::with_capacity(1 + transcript.len() + scratchpad.len());
        messages.push(Message::system(header));
        messages.extend(transcript.iter().cloned());
        messages.extend(scratchpad.iter().map(ScratchpadEntry::to_message));
        Ok(messages)
    }
}

/// Template context for a session's user.
pub fn identity_context(identity: &UserIdentity) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("userId".to_string(), identity.user_id.clone()),
        ("userName".to_string(), identity.user_name.clone()),
        ("displayName".to_string(), identity.display_name.clone()),
    ])
}

fn render(template: &str, values: &BTreeMap<String, String>) -> Result<String, AgentError> {
    let mut out = String::with_capacity(template.len());
    for segment in parse_template(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Placeholder(name) => {
                let value = values.get(&name).ok_or_else(|| {
                    AgentError::Configuration(format!("no value for placeholder {{{name}}}"))
                })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

fn parse_template(template: &str) -> Result<Vec<Segment>, AgentError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
                        Some(c) => {
                            return Err(AgentError::Configuration(format!(
                                "invalid character {c:?} in placeholder {{{name}"
                            )))
                        }
                        None => {
                            return Err(AgentError::Configuration(format!(
                                "unterminated placeholder {{{name}"
                            )))
                        }
                    }
                }
                if name.is_empty() {
                    return Err(AgentError::Configuration(
                        "empty placeholder {} in system prompt".to_string(),
                    ));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name));
            }
            '}' => {
                return Err(AgentError::Configuration(
                    "unmatched '}' in system prompt; use '}}' for a literal brace".to_string(),
                ))
            }
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}
