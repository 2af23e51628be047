//! End-to-end conversations.
//!
//! Each test scripts the model's completions with `ScriptedModel`, serves the
//! platform from `MockBackend`, and runs a full turn through `AgentLoop`, so
//! parser, dispatcher, poller and prompt assembly are exercised together.

use std::sync::Arc;
use std::time::Duration;

use dexa_agents::test_support::{identity, settled, token, top_pair, MockBackend, ScriptedModel};
use dexa_agents::{
    AgentLoop, ModelClient, OrderConfirmationPoller, PromptFormatter, StaticCredential,
    ToolDispatcher, ToolRegistry, TradingBackend, TurnOutcome, TurnReport, REFUSAL,
};
use dexa_models::market::{PriceChange, TrendingPair};
use dexa_models::message::Message;
use dexa_models::order::{OrderSide, OrderState, OrderStatus, PollBudget};
use dexa_models::reasoning::{ReasoningStep, ScratchpadEntry};
use rust_decimal_macros::dec;

const TRUMP: &str = "0xc6bb::trump::TRUMP";
const WALLET: &str = "0x5a1f0e7d";

struct Harness {
    model: Arc<ScriptedModel>,
    backend: Arc<MockBackend>,
    agent: AgentLoop,
}

impl Harness {
    fn new(model: ScriptedModel, backend: MockBackend) -> Self {
        Self::with_budget(model, backend, 10)
    }

    fn with_budget(model: ScriptedModel, backend: MockBackend, max_iterations: usize) -> Self {
        let model = Arc::new(model);
        let backend = Arc::new(backend);
        let dyn_backend = Arc::clone(&backend) as Arc<dyn TradingBackend>;

        let dispatcher = ToolDispatcher::new(
            Arc::new(ToolRegistry::default_catalog()),
            Arc::clone(&dyn_backend),
            Arc::new(StaticCredential::new("jwt-test")),
            OrderConfirmationPoller::new(dyn_backend, PollBudget::new(3, Duration::from_secs(1))),
            "https://suivision.xyz/txblock",
        );
        let agent = AgentLoop::new(
            Arc::clone(&model) as Arc<dyn ModelClient>,
            PromptFormatter::default(),
            Arc::new(dispatcher),
            max_iterations,
            Duration::from_secs(60),
        );

        Self {
            model,
            backend,
            agent,
        }
    }

    async fn turn(&self, query: &str) -> TurnReport {
        self.agent.run_turn(query, &[], &identity()).await
    }
}

fn observations(report: &TurnReport) -> Vec<&str> {
    report
        .scratchpad
        .iter()
        .filter_map(|e| match e {
            ScratchpadEntry::Observation { content } => Some(content.as_str()),
            ScratchpadEntry::Step { .. } => None,
        })
        .collect()
}

fn pending() -> OrderStatus {
    OrderStatus {
        status: OrderState::Pending,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn search_then_buy_settles() {
    let h = Harness::new(
        ScriptedModel::new([
            "Thought: I need the TRUMP token address first.\n\
             Action: search_token\n\
             Action Input: {\"query\": \"TRUMP\"}",
            format!(
                "Thought: Found it, now buy 2 SUI worth.\n\
                 Action: buy_token\n\
                 Action Input: {{\"token_address\": \"{TRUMP}\", \"amount\": \"2\", \"wallet_address\": \"{WALLET}\"}}"
            )
            .as_str(),
            "Thought: The order settled.\nAnswer: Bought 15000 TRUMP for 2 SUI.",
        ]),
        MockBackend::new()
            .with_search_results(vec![token(TRUMP, "TRUMP", "0.00013")])
            .with_top_pair(top_pair(TRUMP, "TRUMP"))
            .with_statuses(vec![Ok(pending()), Ok(settled("2", "15000"))]),
    );

    let report = h.turn("buy 2 SUI of TRUMP").await;

    assert_eq!(report.outcome, TurnOutcome::Answered);
    assert_eq!(report.reply, "Bought 15000 TRUMP for 2 SUI.");
    assert_eq!(report.iterations, 2);

    let obs = observations(&report);
    assert!(obs[0].contains(TRUMP));
    assert!(obs[1].contains("Received: 15000 tokens"));
    assert!(obs[1].contains("https://suivision.xyz/txblock/"));

    let orders = h.backend.submitted();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].amount, dec!(2));
    assert_eq!(orders[0].wallet_address, WALLET);
    assert_eq!(h.backend.calls("order_status"), 2);
}

#[tokio::test]
async fn missing_trade_details_prompt_a_question() {
    let h = Harness::new(
        ScriptedModel::new([
            "Thought: The user wants to sell.\n\
             Action: sell_token\n\
             Action Input: {'percent': '50'}",
            "Thought: I need the token and wallet.\n\
             Answer: Which token should I sell, and from which wallet?",
        ]),
        MockBackend::new(),
    );

    let report = h.turn("sell half").await;

    assert_eq!(report.reply, "Which token should I sell, and from which wallet?");
    assert_eq!(h.backend.total_calls(), 0);
    let obs = observations(&report);
    assert!(obs[0].contains("Missing required parameters for sell_token: token_address, wallet_address"));

    // The error is what the model saw before answering.
    let last_prompt = h.model.prompts().pop().unwrap();
    assert!(last_prompt
        .last()
        .unwrap()
        .content
        .starts_with("Observation: Error: Missing required parameters"));
}

#[tokio::test(start_paused = true)]
async fn unsettled_order_is_reported_as_pending() {
    let h = Harness::new(
        ScriptedModel::new([
            format!(
                "Thought: Selling everything.\n\
                 Action: sell_token\n\
                 Action Input: {{\"token_address\": \"{TRUMP}\", \"percent\": \"100\", \"wallet_address\": \"{WALLET}\"}}"
            ),
            "Thought: Not confirmed yet.\nAnswer: Your sell order is still settling.".to_string(),
        ]),
        MockBackend::new()
            .with_top_pair(top_pair(TRUMP, "TRUMP"))
            .with_statuses(vec![Ok(pending())]),
    );

    let start = tokio::time::Instant::now();
    let report = h.turn("sell all my TRUMP").await;

    assert_eq!(report.reply, "Your sell order is still settling.");
    let obs = observations(&report);
    assert!(obs[0].contains("not confirmed yet (status: pending)"));
    assert!(!obs[0].contains("failed"));
    assert_eq!(h.backend.calls("order_status"), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn unfilled_order_reports_insufficient_liquidity() {
    let h = Harness::new(
        ScriptedModel::new([
            format!(
                "Thought: Buying.\nAction: buy_token\n\
                 Action Input: {{\"token_address\": \"{TRUMP}\", \"amount\": 5, \"wallet_address\": \"{WALLET}\"}}"
            ),
            "Thought: Liquidity is too thin.\nAnswer: There isn't enough liquidity to buy right now."
                .to_string(),
        ]),
        MockBackend::new()
            .with_top_pair(top_pair(TRUMP, "TRUMP"))
            .with_order_ids(vec![]),
    );

    let report = h.turn("buy 5 SUI of TRUMP").await;

    assert_eq!(report.outcome, TurnOutcome::Answered);
    assert!(observations(&report)[0].contains("Insufficient liquidity"));
    assert_eq!(h.backend.calls("order_status"), 0);
}

#[tokio::test]
async fn single_quoted_input_inside_fences_is_accepted() {
    let h = Harness::new(
        ScriptedModel::new([
            format!(
                "```\nThought: Scan the token.\nAction: scan_token\nAction Input: {{'token_address': '{TRUMP}'}}\n```"
            ),
            "Thought: Done.\nAction: None\nAnswer: TRUMP trades on Cetus.".to_string(),
        ]),
        MockBackend::new().with_top_pair(top_pair(TRUMP, "TRUMP")),
    );

    let report = h.turn("scan TRUMP").await;

    assert_eq!(report.reply, "TRUMP trades on Cetus.");
    assert_eq!(h.backend.requests()[0], ("top_pair", TRUMP.to_string()));
    match &report.scratchpad[0] {
        ScratchpadEntry::Step {
            step: ReasoningStep::Action { action_input, .. },
        } => assert_eq!(action_input["token_address"], TRUMP),
        other => panic!("expected action, got {other:?}"),
    }
}

#[tokio::test]
async fn trending_request_uses_normalized_arguments() {
    let pair = |symbol: &str, liquidity| TrendingPair {
        pair_id: format!("pair-{symbol}"),
        dex: Some("Cetus".to_string()),
        token: token(&format!("0x::{symbol}"), symbol, "1"),
        liquidity_usd: liquidity,
        volume_usd: dec!(100),
        price_change: PriceChange::default(),
    };
    let h = Harness::new(
        ScriptedModel::new([
            "Thought: Fetch trending.\nAction: get_trending_pairs\nAction Input: {\"resolution\": \"7d\", \"limit\": 50}",
            "Thought: Got them.\nAnswer: BLUB leads by liquidity.",
        ]),
        MockBackend::new().with_trending(vec![pair("HOP", dec!(10)), pair("BLUB", dec!(900))]),
    );

    let report = h.turn("what's trending?").await;

    assert_eq!(report.reply, "BLUB leads by liquidity.");
    assert_eq!(
        h.backend.requests(),
        vec![("trending_pairs", "24h:10".to_string())]
    );
    let obs = observations(&report)[0];
    assert!(obs.find("BLUB").unwrap() < obs.find("HOP").unwrap());
}

#[tokio::test]
async fn unknown_tool_is_reported_to_model() {
    let h = Harness::new(
        ScriptedModel::new([
            "Thought: Transfer.\nAction: transfer_sui\nAction Input: {\"to\": \"0x1\"}",
            "Thought: I can't do that.\nAnswer: Transfers are not supported.",
        ]),
        MockBackend::new(),
    );

    let report = h.turn("send 1 SUI to 0x1").await;

    assert_eq!(report.reply, "Transfers are not supported.");
    assert!(observations(&report)[0].contains("Unknown tool 'transfer_sui'"));
    assert_eq!(h.backend.total_calls(), 0);
}

#[tokio::test]
async fn endless_tool_calls_hit_refusal() {
    let call = "Thought: Check again.\nAction: get_all_positions\nAction Input: {}";
    let h = Harness::with_budget(ScriptedModel::new([call, call, call, call]), MockBackend::new(), 3);

    let report = h.turn("positions?").await;

    assert_eq!(report.reply, REFUSAL);
    assert_eq!(report.outcome, TurnOutcome::Exhausted);
    assert_eq!(h.backend.calls("positions"), 3);
    assert_eq!(h.model.calls(), 3);
}

#[tokio::test]
async fn zero_budget_refuses_before_trading() {
    let h = Harness::with_budget(
        ScriptedModel::new([format!(
            "Thought: Buying.\nAction: buy_token\n\
             Action Input: {{\"token_address\": \"{TRUMP}\", \"amount\": \"2\", \"wallet_address\": \"{WALLET}\"}}"
        )]),
        MockBackend::new().with_top_pair(top_pair(TRUMP, "TRUMP")),
        0,
    );

    let report = h.turn("buy 2 SUI of TRUMP").await;

    assert_eq!(report.reply, REFUSAL);
    assert_eq!(report.outcome, TurnOutcome::Exhausted);
    assert_eq!(report.iterations, 0);
    assert!(h.backend.submitted().is_empty());
    assert_eq!(h.backend.total_calls(), 0);
}

#[tokio::test]
async fn history_is_forwarded_to_model() {
    let h = Harness::new(
        ScriptedModel::new(["Thought: Recalled.\nAnswer: You asked about TRUMP."]),
        MockBackend::new(),
    );
    let transcript = vec![
        Message::user("what is TRUMP?"),
        Message::assistant("A meme token on SUI."),
    ];

    let reply = h.agent.run("what did I ask?", &transcript, &identity()).await;

    assert_eq!(reply, "You asked about TRUMP.");
    let prompt = &h.model.prompts()[0];
    assert_eq!(prompt.len(), 4);
    assert_eq!(prompt[1].content, "what is TRUMP?");
    assert_eq!(prompt[3].content, "what did I ask?");
}
