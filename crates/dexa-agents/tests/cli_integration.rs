//! Integration tests that drive the real Claude CLI.
//!
//! These tests are `#[ignore]` by default. They require:
//! - The `claude` CLI installed and on PATH
//! - Valid Anthropic credentials configured
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p dexa-agents --test cli_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use dexa_agents::claude_cli::{check_cli_available, ClaudeCliModel};
use dexa_agents::parser;
use dexa_agents::test_support::{identity, wallet, MockBackend};
use dexa_agents::{
    AgentLoop, ModelClient, OrderConfirmationPoller, PromptFormatter, StaticCredential,
    ToolDispatcher, ToolRegistry, TradingBackend, TurnOutcome,
};
use dexa_models::message::Message;
use dexa_models::order::PollBudget;
use dexa_models::reasoning::ReasoningStep;

const MODEL: &str = "claude-3-5-haiku-latest";

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(
        check_cli_available().await,
        "claude CLI not found on PATH; install it from https://docs.anthropic.com/en/docs/claude-code"
    );
}

/// The CLI must still follow the reasoning protocol when told to.
///
/// Catches changes in the CLI's output format that would otherwise only
/// surface as parse failures in production.
#[tokio::test]
#[ignore]
async fn cli_output_follows_protocol() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let model = ClaudeCliModel::new(MODEL, Duration::from_secs(60));
    let messages = vec![
        Message::system(concat!(
            "Reply in exactly this format and nothing else:\n",
            "Thought: <one sentence>\n",
            "Answer: <the user's message repeated exactly>",
        )),
        Message::user("ping"),
    ];

    let raw = model
        .generate(&messages)
        .await
        .expect("Claude CLI invocation failed");

    match parser::parse(&raw) {
        ReasoningStep::Answer { answer, .. } => assert!(answer.contains("ping"), "raw: {raw}"),
        other => panic!("expected an answer, got {other:?}\nraw: {raw}"),
    }
}

/// Full turn against the live model with a scripted platform.
#[tokio::test]
#[ignore]
async fn cli_answers_balance_question_with_tool() {
    if !check_cli_available().await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let backend = Arc::new(MockBackend::new().with_wallets(vec![wallet("0xaaa", "42.5")]));
    let dyn_backend = Arc::clone(&backend) as Arc<dyn TradingBackend>;
    let dispatcher = ToolDispatcher::new(
        Arc::new(ToolRegistry::default_catalog()),
        Arc::clone(&dyn_backend),
        Arc::new(StaticCredential::new("jwt")),
        OrderConfirmationPoller::new(dyn_backend, PollBudget::default()),
        "https://suivision.xyz/txblock",
    );
    let agent = AgentLoop::new(
        Arc::new(ClaudeCliModel::new(MODEL, Duration::from_secs(90))),
        PromptFormatter::default(),
        Arc::new(dispatcher),
        5,
        Duration::from_secs(90),
    );

    let report = agent
        .run_turn("What is my SUI balance?", &[], &identity())
        .await;

    eprintln!("reply: {}", report.reply);
    assert_eq!(report.outcome, TurnOutcome::Answered);
    assert_eq!(backend.calls("wallets"), 1);
    assert!(report.reply.contains("42.5"));
}
