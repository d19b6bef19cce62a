//! Line-oriented operator control of the sampling loop

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::sync::{Command, SyncHandle, SyncHandleError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Handle(#[from] SyncHandleError),
}

/// Forward commands read line by line from `reader` to `handle`
///
/// Returns once `quit` was processed or the input is closed.
pub async fn drive<R: AsyncBufRead + Unpin>(
    reader: R,
    handle: SyncHandle,
) -> Result<(), ControlError> {
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let command: Command = match input.parse() {
            Ok(command) => command,
            Err(_) => {
                warn!(input = %input, "unknown command, expected one of start, stop, quit");
                continue;
            }
        };

        let state = handle.send(command).await?;
        info!(command = %command, state = %state, "command processed");

        if command == Command::Quit {
            return Ok(());
        }
    }

    debug!("control input closed");
    Ok(())
}
