//! `diagnose chat` handler

use crate::cli::{load_config, output, ChatArgs};
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::request::RawRequest;
use crate::types::ConverseOutcome;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Render one outcome for the terminal or as a JSON line.
fn render(outcome: &ConverseOutcome, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string(outcome)?);
    }
    Ok(match outcome {
        ConverseOutcome::Answer(result) => output::format_result_text(result),
        ConverseOutcome::FollowUp(follow_up) => output::format_follow_up_text(follow_up),
    })
}

/// Feed every non-empty line of `input` to `converse` and write the
/// rendered outcomes to `out`. Caller errors are reported inline and the
/// session continues; a forbidden conversation ends it.
pub async fn run_session<R, W>(
    orchestrator: &Orchestrator,
    args: &ChatArgs,
    conversation_id: &str,
    input: R,
    mut out: W,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut turns = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let raw = RawRequest::new(&args.run.caller, &args.run.tier, line)
            .with_conversation(conversation_id);
        let outcome = match orchestrator.normalize(raw) {
            Ok(request) => orchestrator.converse(&request, conversation_id).await,
            Err(e) => Err(e),
        };

        let rendered = match outcome {
            Ok(outcome) => {
                turns += 1;
                render(&outcome, args.run.json)?
            }
            Err(e @ OrchestratorError::Forbidden { .. }) => return Err(e.into()),
            Err(e) => format!("Error: {}", e),
        };
        out.write_all(rendered.as_bytes()).await?;
        out.write_all(b"\n\n").await?;
        out.flush().await?;
    }

    Ok(turns)
}

/// Handle `diagnose chat`.
pub async fn handle_chat(args: &ChatArgs) -> anyhow::Result<()> {
    let config = load_config(&args.run.config, args.run.log_level.as_deref())?;
    let _ = crate::logging::init_tracing(&config.logging);

    let orchestrator = Orchestrator::from_config(&config);
    let cancel_token = CancellationToken::new();
    let maintenance = orchestrator.spawn_maintenance(cancel_token.clone());

    let conversation_id = args
        .conversation
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    eprintln!("Conversation {} (Ctrl-D to end)", conversation_id);

    let result = run_session(
        &orchestrator,
        args,
        &conversation_id,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await;

    cancel_token.cancel();
    let _ = maintenance.await;
    result.map(|_| ())
}
