//! Interactive request loop.

use std::io::Write;
use ticketing_common::TicketRequest;
use ticketing_coordinator::Orchestrator;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, error};

const PROMPT: &str = "ticketing> ";

fn is_exit(line: &str) -> bool {
    matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit")
}

/// Handle one request per input line until `exit`, `quit` or end of input.
///
/// Returns the number of requests handled. A fatal error such as rejected
/// credentials ends the loop with that error.
pub async fn run_loop<R, W>(
    orchestrator: &Orchestrator,
    input: R,
    output: &mut W,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut handled = 0;

    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        let response = orchestrator.handle(TicketRequest::text(line)).await;
        handled += 1;
        writeln!(output, "{}", response.render())?;
        debug!(request_id = %response.request_id, state = %response.state(), "Request answered");

        if response.error().is_some_and(|e| e.is_fatal()) {
            if let Err(err) = response.into_result() {
                error!(error = %err, "Stopping chat after fatal error");
                return Err(err.into());
            }
        }
    }

    Ok(handled)
}

pub async fn run(orchestrator: &Orchestrator) -> anyhow::Result<()> {
    println!("Ticketing assistant. Describe what you need; type 'exit' to quit.");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    let handled = run_loop(orchestrator, stdin, &mut stdout).await?;
    debug!(handled, "Chat ended");
    Ok(())
}
