use clap::{Parser, ValueEnum};
use tau_chat_runtime::{
    parse_header_pair, ChatRuntimeConfig, DEFAULT_CHAT_API_URL, DEFAULT_CONNECT_TIMEOUT_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliOutputMode {
    Text,
    Json,
}

fn parse_header_arg(value: &str) -> Result<(String, String), String> {
    parse_header_pair(value).map_err(|error| error.to_string())
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "tau-chat",
    about = "Stream one chat turn from a UI message stream endpoint",
    version
)]
/// Public struct `Cli` used across Tau components.
pub struct Cli {
    #[arg(
        long,
        env = "TAU_CHAT_API_URL",
        default_value = DEFAULT_CHAT_API_URL,
        help = "Chat completion endpoint that answers with a UI message stream"
    )]
    pub api_url: String,

    #[arg(
        long = "header",
        value_name = "NAME:VALUE",
        value_parser = parse_header_arg,
        help = "Extra request header; repeat for more than one"
    )]
    pub headers: Vec<(String, String)>,

    #[arg(
        long,
        env = "TAU_CHAT_ID",
        help = "Persisted chat id sent as the X-Chat-Id header"
    )]
    pub chat_id: Option<String>,

    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_MS,
        value_parser = parse_positive_u64,
        help = "Connection timeout in milliseconds; an open stream is never timed out"
    )]
    pub connect_timeout_ms: u64,

    #[arg(
        long = "file",
        value_name = "URL",
        help = "URL of an uploaded image to attach; repeat for more than one"
    )]
    pub files: Vec<String>,

    #[arg(long, value_enum, default_value_t = CliOutputMode::Text)]
    pub output: CliOutputMode,

    #[arg(value_name = "PROMPT", help = "Message text; words are joined with spaces")]
    pub prompt: Vec<String>,
}

impl Cli {
    pub fn runtime_config(&self) -> ChatRuntimeConfig {
        ChatRuntimeConfig {
            api_url: self.api_url.clone(),
            headers: self.headers.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            chat_id: self.chat_id.clone(),
        }
    }

    pub fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, CliOutputMode};

    #[test]
    fn unit_defaults_point_at_local_endpoint() {
        let cli = Cli::try_parse_from(["tau-chat", "hello", "there"]).expect("parse");
        assert_eq!(cli.api_url, "http://127.0.0.1:8787/api/v1/chat");
        assert_eq!(cli.connect_timeout_ms, 10_000);
        assert_eq!(cli.output, CliOutputMode::Text);
        assert_eq!(cli.prompt_text(), "hello there");
        assert!(cli.files.is_empty());
    }

    #[test]
    fn functional_flags_map_into_runtime_config() {
        let cli = Cli::try_parse_from([
            "tau-chat",
            "--api-url",
            "http://localhost:9000/chat",
            "--header",
            "Authorization: Bearer t",
            "--header",
            "x-tenant:acme",
            "--chat-id",
            "chat-9",
            "--connect-timeout-ms",
            "250",
            "--file",
            "https://cdn.example.com/a.png",
            "--output",
            "json",
            "describe",
        ])
        .expect("parse");

        let config = cli.runtime_config();
        assert_eq!(config.api_url, "http://localhost:9000/chat");
        assert_eq!(
            config.headers,
            vec![
                ("Authorization".to_string(), "Bearer t".to_string()),
                ("x-tenant".to_string(), "acme".to_string()),
            ]
        );
        assert_eq!(config.chat_id.as_deref(), Some("chat-9"));
        assert_eq!(config.connect_timeout_ms, 250);
        assert_eq!(cli.files, vec!["https://cdn.example.com/a.png"]);
        assert_eq!(cli.output, CliOutputMode::Json);
    }

    #[test]
    fn regression_rejects_malformed_header_and_zero_timeout() {
        assert!(Cli::try_parse_from(["tau-chat", "--header", "missing-colon", "hi"]).is_err());
        assert!(Cli::try_parse_from(["tau-chat", "--connect-timeout-ms", "0", "hi"]).is_err());
    }
}
