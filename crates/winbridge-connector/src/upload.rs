//! Chunked file uploads through the command channel.
//!
//! The payload is written to a staging file one base64 chunk per command,
//! then moved over the destination. A failed chunk stops the upload and
//! leaves the staging file behind.

use std::num::NonZeroUsize;

use winbridge_command::upload::{WriteMode, create_empty_command, move_command, write_chunk_command};
use winbridge_core::{ConnectorError, ExecutionRequest, PrintOptions};

use crate::executor::CommandExecutor;

/// Commands that assemble `data` at `temp_path`, in order.
///
/// One command per chunk: the first creates the file, the rest append.
/// An empty payload gets a single command creating an empty file.
#[must_use]
pub fn chunk_commands(data: &[u8], temp_path: &str, chunk_size: NonZeroUsize) -> Vec<String> {
    if data.is_empty() {
        return vec![create_empty_command(temp_path)];
    }
    data.chunks(chunk_size.get())
        .enumerate()
        .map(|(index, chunk)| {
            let mode = if index == 0 {
                WriteMode::Create
            } else {
                WriteMode::Append
            };
            write_chunk_command(chunk, temp_path, mode)
        })
        .collect()
}

/// Uploads payloads through an executor.
pub struct ChunkedUploader<'a> {
    executor: &'a CommandExecutor,
    chunk_size: NonZeroUsize,
}

impl<'a> ChunkedUploader<'a> {
    #[must_use]
    pub const fn new(executor: &'a CommandExecutor, chunk_size: NonZeroUsize) -> Self {
        Self {
            executor,
            chunk_size,
        }
    }

    /// Write `data` to `temp_path`, then move it to `remote_filename`.
    ///
    /// Chunk writes are never echoed; `print` applies to the move only.
    /// Returns `Ok(false)` as soon as a remote command fails.
    ///
    /// # Errors
    /// Returns error only for transport-level failures.
    pub async fn put(
        &self,
        data: &[u8],
        temp_path: &str,
        remote_filename: &str,
        print: PrintOptions,
    ) -> Result<bool, ConnectorError> {
        let commands = chunk_commands(data, temp_path, self.chunk_size);
        tracing::debug!(
            remote_filename,
            temp_path,
            bytes = data.len(),
            commands = commands.len(),
            "Uploading file"
        );

        let relocate = move_command(temp_path, remote_filename);
        let steps = commands
            .iter()
            .map(|command| (command, PrintOptions::default()))
            .chain([(&relocate, print)]);
        for (command, print) in steps {
            let result = self
                .executor
                .run(&ExecutionRequest::new(command), print)
                .await?;
            if !result.success {
                // TODO: delete the staging file once a cleanup command can be
                // issued without masking the original failure.
                tracing::error!("File upload error: {remote_filename}");
                for line in &result.stderr {
                    tracing::error!("{line}");
                }
                return Ok(false);
            }
        }
        Ok(true)
    }
}
