use std::sync::{Arc, Mutex};

use httpmock::prelude::*;
use serde_json::json;
use tau_chat_runtime::{
    ChatRuntimeConfig, ChatSession, ChatSessionEvent, ChatStatus, ChatTransport,
    HttpChatTransport, TurnOutcome,
};
use tau_transcript::{
    compose_prompt_parts, ChatStreamRequest, ContentPart, Segment, ToolLifecycle, Transcript,
    Turn, TurnRole,
};
use tau_ui_stream::{collect_text, decode_events, TextDeltaHandler};

fn config(server: &MockServer) -> ChatRuntimeConfig {
    ChatRuntimeConfig {
        api_url: server.url("/api/v1/chat"),
        chat_id: Some("chat-1".to_string()),
        ..ChatRuntimeConfig::default()
    }
}

#[tokio::test]
async fn integration_two_turns_replay_full_history_over_http() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat")
            .header("x-chat-id", "chat-1")
            .json_body(json!({
                "messages": [{"role": "user", "parts": [{"type": "text", "text": "find x"}]}]
            }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "data: {\"type\":\"start\"}\n\n",
                "data: {\"type\":\"tool-input-start\",\"toolCallId\":\"t1\",\"toolName\":\"search\"}\n\n",
                "data: {\"type\":\"tool-input-delta\",\"toolCallId\":\"t1\",\"inputTextDelta\":\"{\\\"q\\\":\"}\n\n",
                "data: {\"type\":\"tool-input-available\",\"toolCallId\":\"t1\",\"toolName\":\"search\",\"input\":{\"q\":\"x\"}}\n\n",
                "data: {\"type\":\"tool-output-available\",\"toolCallId\":\"t1\",\"output\":{\"result\":\"y\"}}\n\n",
                "data: {\"type\":\"text-delta\",\"delta\":\"Found y.\"}\n\n",
                "data: {\"type\":\"finish\"}\n\n",
                "data: [DONE]\n\n",
            ));
    });
    let second = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat").json_body(json!({
            "messages": [
                {"role": "user", "parts": [{"type": "text", "text": "find x"}]},
                {"role": "assistant", "parts": [
                    {
                        "type": "tool",
                        "toolCallId": "t1",
                        "toolName": "search",
                        "input": {"q": "x"},
                        "output": {"result": "y"},
                        "lifecycle": "output-ready"
                    },
                    {"type": "text", "text": "Found y."}
                ]},
                {"role": "user", "parts": [{"type": "text", "text": "thanks"}]}
            ]
        }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body("data: {\"type\":\"text-delta\",\"delta\":\"Welcome.\"}\n\n");
    });

    let session = ChatSession::from_config(&config(&server)).expect("session");
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    session.subscribe(move |event| sink.lock().expect("events lock").push(event.clone()));

    let outcome = session
        .start_turn(TurnRole::User, vec![ContentPart::text("find x")])
        .await
        .expect("first turn");
    let TurnOutcome::Finished { turn } = outcome else {
        panic!("expected first turn to finish");
    };
    assert_eq!(
        turn.segments,
        vec![
            Segment::Tool {
                tool_call_id: "t1".to_string(),
                tool_name: "search".to_string(),
                input: Some(json!({"q": "x"})),
                output: Some(json!({"result": "y"})),
                lifecycle: ToolLifecycle::OutputReady,
            },
            Segment::text("Found y."),
        ]
    );

    session
        .start_turn(TurnRole::User, vec![ContentPart::text("thanks")])
        .await
        .expect("second turn");
    first.assert();
    second.assert();

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, ChatStatus::Ready);
    assert_eq!(snapshot.transcript.len(), 4);
    assert_eq!(
        snapshot.last_turn().expect("assistant").text_content(),
        "Welcome."
    );
    let finished = events
        .lock()
        .expect("events lock")
        .iter()
        .filter(|event| matches!(event, ChatSessionEvent::TurnFinished { .. }))
        .count();
    assert_eq!(finished, 2);
}

#[tokio::test]
async fn integration_image_submission_sends_file_part_metadata() {
    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat").json_body(json!({
            "messages": [{"role": "user", "parts": [
                {"type": "text", "text": "![Image](https://cdn.example.com/u/scan.TIFF?sig=abc)"},
                {
                    "type": "file",
                    "mediaType": "image/tiff",
                    "filename": "scan.TIFF",
                    "url": "https://cdn.example.com/u/scan.TIFF?sig=abc"
                },
                {"type": "text", "text": "read it"}
            ]}]
        }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body("data: {\"type\":\"text-delta\",\"delta\":\"ok\"}\n\n");
    });

    let session = ChatSession::from_config(&config(&server)).expect("session");
    let parts = compose_prompt_parts(
        "read it",
        &["https://cdn.example.com/u/scan.TIFF?sig=abc".to_string()],
    );
    session
        .start_turn(TurnRole::User, parts)
        .await
        .expect("turn");
    chat.assert();
}

#[tokio::test]
async fn integration_collect_text_drains_http_body_with_callback() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                ": ping\n\n",
                "data: {\"type\":\"reasoning-delta\",\"delta\":\"skip\"}\n\n",
                "data: {\"type\":\"text-delta\",\"delta\":\"Hel\"}\n\n",
                "data: {\"type\":\"text-delta\",\"delta\":\"\"}\n\n",
                "data: {\"type\":\"text-delta\",\"delta\":\"lo\"}",
            ));
    });

    let transport = HttpChatTransport::new(&config(&server)).expect("transport");
    let request =
        ChatStreamRequest::from_transcript(&Transcript::from_turns(vec![Turn::user_text("hi")]));
    let body = transport.open_stream(&request).await.expect("body");

    let deltas = Arc::new(Mutex::new(Vec::new()));
    let sink = deltas.clone();
    let handler: TextDeltaHandler = Arc::new(move |delta: String| {
        sink.lock().expect("delta lock").push(delta);
    });
    let text = collect_text(decode_events(body), Some(handler))
        .await
        .expect("collect");

    assert_eq!(text, "Hello");
    assert_eq!(*deltas.lock().expect("delta lock"), vec!["Hel", "lo"]);
}
