//! Turn loop behaviour against a scripted provider and recording registry.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{kinds, MockProvider, MockRegistry, Round, Step};
use mcp_chat::agent_loop::{StreamEvent, Transcript, TurnController, TurnSummary};
use mcp_chat::types::{FinishReason, FunctionFragment, Message, ResponseFragment, Role, ToolCallFragment};

async fn run(
    provider: Arc<MockProvider>,
    registry: Arc<MockRegistry>,
    input: &str,
) -> (TurnController, Vec<StreamEvent>, TurnSummary) {
    let tools = mcp_chat::tools::ToolRegistry::list_tools(registry.as_ref())
        .await
        .unwrap();
    let mut controller = TurnController::new(provider, registry, Transcript::new("sys")).with_tools(tools);
    let mut events = Vec::new();
    let summary = controller.run_turn(input, |e| events.push(e)).await;
    (controller, events, summary)
}

fn visible_text(events: &[StreamEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Content { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn plain_answer_streams_content_then_completes() {
    let provider = MockProvider::new(vec![Round::text(&["Hel", "lo"])]);
    let registry = Arc::new(MockRegistry::new());
    let (controller, events, summary) = run(provider.clone(), registry, "hi").await;

    assert_eq!(kinds(&events), vec!["content", "content", "complete"]);
    assert_eq!(visible_text(&events), "Hello");
    assert_eq!(events.last().unwrap().error(), None);
    assert_eq!(summary.content, "Hello");
    assert_eq!(summary.rounds, 1);
    assert!(summary.is_success());

    let roles: Vec<Role> = controller.transcript().messages().iter().map(Message::role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn incomplete_tool_call_fragments_count_as_no_calls() {
    let name_only = ToolCallFragment {
        index: 0,
        id: None,
        function: Some(FunctionFragment {
            name: Some("search".into()),
            arguments: Some(r#"{"q":"x"}"#.into()),
        }),
    };
    let id_only = ToolCallFragment {
        index: 1,
        id: Some("call_2".into()),
        function: Some(FunctionFragment {
            name: None,
            arguments: Some("{}".into()),
        }),
    };
    let provider = MockProvider::new(vec![Round::Stream(vec![
        Step::Fragment(ResponseFragment::text("checking")),
        Step::Fragment(ResponseFragment::tool_call(name_only)),
        Step::Fragment(ResponseFragment::tool_call(id_only)),
        Step::Fragment(ResponseFragment::finish(FinishReason::ToolCalls)),
    ])]);
    let registry = Arc::new(MockRegistry::new().with_tool("search", Ok("hits")));
    let (controller, events, summary) = run(provider.clone(), registry.clone(), "hi").await;

    assert_eq!(kinds(&events), vec!["content", "complete"]);
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.content, "checking");
    assert_eq!(summary.tool_count(), 0);
    assert!(registry.calls().is_empty());
    assert_eq!(provider.requests().len(), 1);
    let last = controller.transcript().last().unwrap();
    assert_eq!(last.content(), Some("checking"));
    assert!(last.tool_calls().is_empty());
}

#[tokio::test]
async fn empty_response_is_a_valid_final_answer() {
    let provider = MockProvider::new(vec![Round::Stream(vec![Step::Fragment(
        ResponseFragment::finish(FinishReason::Stop),
    )])]);
    let (controller, events, summary) = run(provider.clone(), Arc::new(MockRegistry::new()), "hi").await;

    assert_eq!(kinds(&events), vec!["complete"]);
    assert_eq!(events[0].error(), None);
    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.content, "");
    assert!(summary.is_success());
    assert_eq!(
        controller.transcript().last(),
        Some(&Message::Assistant {
            content: None,
            tool_calls: Vec::new(),
        })
    );
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tool_calls_run_sequentially_in_index_order() {
    let provider = MockProvider::new(vec![
        Round::tool_calls(&[
            ("call_1", "search", r#"{"q":"rust"}"#),
            ("call_2", "fetch", r#"{"url":"https://example.com"}"#),
        ]),
        Round::text(&["Done"]),
    ]);
    let registry = Arc::new(
        MockRegistry::new()
            .with_tool("search", Ok("3 hits"))
            .with_tool("fetch", Ok("<html>"))
            .with_delay("search", Duration::from_millis(200)),
    );
    let (controller, events, summary) = run(provider.clone(), registry.clone(), "look it up").await;

    assert_eq!(
        kinds(&events),
        vec!["tool_call", "tool_call", "tool_result", "tool_result", "content", "complete"]
    );
    assert_eq!(
        registry.log(),
        vec!["start:search", "end:search", "start:fetch", "end:fetch"]
    );
    assert_eq!(
        registry.calls(),
        vec![
            ("search".to_string(), json!({"q": "rust"})),
            ("fetch".to_string(), json!({"url": "https://example.com"})),
        ]
    );

    match &events[0] {
        StreamEvent::ToolCall { tool_name, tool_arguments, .. } => {
            assert_eq!(tool_name, "search");
            assert_eq!(tool_arguments, &json!({"q": "rust"}));
        }
        other => panic!("expected tool_call, got {other:?}"),
    }

    let transcript = controller.transcript().messages();
    assert_eq!(transcript.len(), 6);
    assert_eq!(transcript[2].tool_calls().len(), 2);
    assert_eq!(transcript[3].tool_call_id(), Some("call_1"));
    assert_eq!(transcript[3].content(), Some("3 hits"));
    assert_eq!(transcript[4].tool_call_id(), Some("call_2"));
    assert_eq!(transcript[5].content(), Some("Done"));

    // The second model request sees the tool results.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 5);
    assert_eq!(requests[0].tools.len(), 2);

    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.tool_count(), 2);
    assert_eq!(summary.content, "Done");
}

#[tokio::test]
async fn thinking_spans_are_separated_from_visible_text() {
    let provider = MockProvider::new(vec![Round::text(&["<think>plan", " more</think>", "Answer"])]);
    let (_, events, summary) = run(provider, Arc::new(MockRegistry::new()), "q").await;

    let thinking: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Thinking { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(thinking, "<think>plan more</think>");
    assert_eq!(visible_text(&events), "Answer");
    assert!(summary.thinking_time.is_some());
}

#[tokio::test]
async fn stream_creation_failure_ends_turn_with_error() {
    let provider = MockProvider::new(vec![Round::CreateError("upstream down".into())]);
    let (controller, events, summary) = run(provider, Arc::new(MockRegistry::new()), "hi").await;

    assert_eq!(kinds(&events), vec!["complete"]);
    let error = events[0].error().unwrap();
    assert!(error.starts_with("Error: Failed to create stream:"), "{error}");
    assert!(error.contains("upstream down"));
    assert!(!summary.is_success());
    // The user message is kept; no assistant message is added.
    assert_eq!(controller.transcript().last(), Some(&Message::user("hi")));
}

#[tokio::test]
async fn read_failure_keeps_partial_text_and_drops_tool_calls() {
    let provider = MockProvider::new(vec![Round::Stream(vec![
        Step::Fragment(ResponseFragment::text("partial ")),
        Step::Fragment(ResponseFragment::tool_call(ToolCallFragment::start(0, "call_1", "search"))),
        Step::Fail("connection reset".into()),
    ])]);
    let registry = Arc::new(MockRegistry::new().with_tool("search", Ok("hits")));
    let (controller, events, summary) = run(provider.clone(), registry.clone(), "hi").await;

    assert_eq!(kinds(&events), vec!["content", "complete"]);
    assert!(summary.partial);
    assert_eq!(summary.content, "partial ");
    assert!(registry.calls().is_empty());
    assert_eq!(provider.requests().len(), 1);
    let last = controller.transcript().last().unwrap();
    assert_eq!(last.content(), Some("partial "));
    assert!(last.tool_calls().is_empty());
}

#[tokio::test]
async fn failing_tool_result_is_fed_back_and_turn_continues() {
    let provider = MockProvider::new(vec![
        Round::tool_calls(&[("call_1", "search", r#"{"q":"x"}"#)]),
        Round::text(&["Sorry, search is down."]),
    ]);
    let registry = Arc::new(MockRegistry::new().with_tool("search", Err("index offline")));
    let (controller, events, summary) = run(provider, registry, "q").await;

    match &events[1] {
        StreamEvent::ToolResult { tool_result, tool_success, .. } => {
            assert!(!tool_success);
            assert!(tool_result.starts_with("Error calling tool:"), "{tool_result}");
            assert!(tool_result.contains("index offline"));
        }
        other => panic!("expected tool_result, got {other:?}"),
    }
    assert_eq!(summary.rounds, 2);
    assert!(!summary.tool_timings[0].success);
    assert!(controller.transcript().messages()[3]
        .content()
        .unwrap()
        .starts_with("Error calling tool:"));
}

#[tokio::test]
async fn malformed_and_empty_arguments_never_reach_the_registry() {
    let provider = MockProvider::new(vec![
        Round::tool_calls(&[("call_1", "search", "{bad json"), ("call_2", "fetch", "")]),
        Round::text(&["ok"]),
    ]);
    let registry = Arc::new(
        MockRegistry::new()
            .with_tool("search", Ok("hits"))
            .with_tool("fetch", Ok("page")),
    );
    let (_, events, _) = run(provider, registry.clone(), "q").await;

    let results: Vec<(&str, bool)> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolResult { tool_result, tool_success, .. } => {
                Some((tool_result.as_str(), *tool_success))
            }
            _ => None,
        })
        .collect();
    assert!(results[0].0.starts_with("Error parsing tool arguments for search"));
    assert_eq!(results[1], ("Error: Empty arguments for tool: fetch", false));
    assert!(registry.calls().is_empty());
}

#[tokio::test]
async fn round_limit_stops_a_looping_model() {
    let provider = MockProvider::new(vec![
        Round::tool_calls(&[("call_1", "search", "{}")]),
        Round::tool_calls(&[("call_2", "search", "{}")]),
    ]);
    let registry = Arc::new(MockRegistry::new().with_tool("search", Ok("again")));
    let mut controller = TurnController::new(provider.clone(), registry, Transcript::new("sys"))
        .with_max_rounds(Some(1));
    let mut events = Vec::new();
    let summary = controller.run_turn("q", |e| events.push(e)).await;

    assert_eq!(summary.rounds, 1);
    assert_eq!(summary.error.as_deref(), Some("Error: stopped after 1 model rounds"));
    assert_eq!(events.last().unwrap().error(), summary.error.as_deref());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn conversation_carries_over_between_turns() {
    let provider = MockProvider::new(vec![Round::text(&["first"]), Round::text(&["second"])]);
    let mut controller = TurnController::new(provider.clone(), Arc::new(MockRegistry::new()), Transcript::new("sys"));

    controller.run_turn("one", |_| {}).await;
    controller.run_turn("two", |_| {}).await;

    let requests = provider.requests();
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].messages[1], Message::user("one"));
    assert_eq!(requests[1].messages[3], Message::user("two"));
    assert_eq!(controller.transcript().len(), 5);
}
