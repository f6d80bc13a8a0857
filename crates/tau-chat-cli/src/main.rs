mod bootstrap_helpers;
mod cli_args;
mod runtime_output;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tau_chat_runtime::{ChatSession, TurnOutcome};
use tau_transcript::{compose_prompt_parts, TurnRole};

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::{Cli, CliOutputMode};
use crate::runtime_output::{snapshot_to_json, TextRenderer};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}

async fn run_cli(cli: Cli) -> Result<()> {
    let config = cli.runtime_config();
    let session = ChatSession::from_config(&config).context("invalid chat configuration")?;
    let parts = compose_prompt_parts(&cli.prompt_text(), &cli.files);

    let mut snapshots = session.watch();
    let mut turn = tokio::spawn({
        let session = session.clone();
        async move { session.start_turn(TurnRole::User, parts).await }
    });

    let render_text = cli.output == CliOutputMode::Text;
    let mut renderer = TextRenderer::default();
    let mut stdout = std::io::stdout();
    let mut watching = render_text;
    let result = loop {
        tokio::select! {
            result = &mut turn => break result.context("chat turn task failed")?,
            changed = snapshots.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                renderer.render(&snapshot, &mut stdout)?;
            }
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    tracing::info!("cancel requested from terminal");
                }
            }
        }
    };

    let snapshot = session.snapshot();
    match cli.output {
        CliOutputMode::Text => {
            renderer.render(&snapshot, &mut stdout)?;
            if renderer.printed_any() {
                writeln!(stdout)?;
            }
        }
        CliOutputMode::Json => {
            let rendered = serde_json::to_string_pretty(&snapshot_to_json(&snapshot))
                .context("failed to render transcript json")?;
            writeln!(stdout, "{rendered}")?;
        }
    }

    match result.context("chat turn failed")? {
        TurnOutcome::Finished { turn } => {
            tracing::debug!(turn_id = %turn.id, segments = turn.segments.len(), "turn complete");
        }
        TurnOutcome::Cancelled { .. } => eprintln!("turn cancelled"),
    }
    Ok(())
}
