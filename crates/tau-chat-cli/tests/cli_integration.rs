use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::{json, Value};

fn binary_command() -> Command {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("tau-chat"));
    command.env_remove("TAU_CHAT_API_URL").env_remove("TAU_CHAT_ID");
    command
}

const STREAM_BODY: &str = concat!(
    "data: {\"type\":\"start\"}\n\n",
    "data: {\"type\":\"reasoning-start\"}\n\n",
    "data: {\"type\":\"reasoning-delta\",\"delta\":\"thinking\"}\n\n",
    "data: {\"type\":\"reasoning-end\"}\n\n",
    "data: {\"type\":\"text-delta\",\"delta\":\"Hel\"}\n\n",
    "data: not-json\n\n",
    "data: {\"type\":\"text-delta\",\"delta\":\"lo\"}\n\n",
    "data: {\"type\":\"finish\"}\n\n",
);

#[test]
fn integration_text_output_streams_assistant_text() {
    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat")
            .header("x-chat-id", "chat-7")
            .header("authorization", "Bearer t")
            .json_body(json!({
                "messages": [{"role": "user", "parts": [{"type": "text", "text": "say hello"}]}]
            }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(STREAM_BODY);
    });

    let api_url = server.url("/api/v1/chat");
    binary_command()
        .args([
            "--api-url",
            api_url.as_str(),
            "--chat-id",
            "chat-7",
            "--header",
            "Authorization: Bearer t",
            "say",
            "hello",
        ])
        .assert()
        .success()
        .stdout("Hello\n");
    chat.assert();
}

#[test]
fn integration_json_output_prints_final_transcript() {
    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat").json_body(json!({
            "messages": [{
                "role": "user",
                "parts": [
                    {"type": "text", "text": "![Image](https://cdn.example.com/cat.png)"},
                    {
                        "type": "file",
                        "mediaType": "image/png",
                        "filename": "cat.png",
                        "url": "https://cdn.example.com/cat.png"
                    },
                    {"type": "text", "text": "Please analyze this image"}
                ]
            }]
        }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(STREAM_BODY);
    });

    let api_url = server.url("/api/v1/chat");
    let output = binary_command()
        .args([
            "--api-url",
            api_url.as_str(),
            "--file",
            "https://cdn.example.com/cat.png",
            "--output",
            "json",
        ])
        .output()
        .expect("run tau-chat");
    chat.assert();
    assert!(output.status.success());

    let value: Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(value["status"], "ready");
    assert!(value["error"].is_null());
    let assistant = &value["turns"][1];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(
        assistant["segments"],
        json!([
            {"type": "reasoning", "text": "thinking", "lifecycle": "complete"},
            {"type": "text", "text": "Hello", "lifecycle": "complete"}
        ])
    );
}

#[test]
fn regression_non_success_status_exits_with_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat");
        then.status(502).body("bad gateway");
    });

    let api_url = server.url("/api/v1/chat");
    binary_command()
        .args(["--api-url", api_url.as_str(), "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("502"))
        .stderr(predicate::str::contains("bad gateway"));
}

#[test]
fn regression_empty_prompt_is_rejected_without_request() {
    let server = MockServer::start();
    let chat = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat");
        then.status(200);
    });

    let api_url = server.url("/api/v1/chat");
    binary_command()
        .args(["--api-url", api_url.as_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Please enter a message or upload an image",
        ));
    chat.assert_hits(0);
}
