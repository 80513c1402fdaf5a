//! Command-line helpers.
//!
//! The binary in `main.rs` parses arguments; this module holds the pieces
//! worth testing on their own, like the interactive chat loop.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::agent::Agent;

/// Expand tilde (~) in paths.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

/// Whether a line ends the chat loop.
pub fn is_exit(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit")
}

/// Chat on stdin/stdout until `exit`, `quit` or end of input.
pub async fn run_repl(agent: &Agent, thread_id: &str) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    run_repl_with(agent, thread_id, stdin, &mut stdout).await
}

/// Chat loop over any line source and sink.
pub async fn run_repl_with<R, W>(
    agent: &Agent,
    thread_id: &str,
    input: R,
    output: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        if is_exit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let reply = match agent.invoke(thread_id, &line).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Turn failed on thread {}: {}", thread_id, e);
                format!("❌ {}", e)
            }
        };
        output.write_all(format!("🤖: {}\n", reply).as_bytes()).await?;
    }

    output.flush().await
}
