// File: autogram-core/src/eventbus/transcript_handle.rs
//
// A small control handle for forcing flushes in the transcript task.

use tokio::sync::{mpsc, oneshot};
use tracing::trace;
use crate::Error;

/// Commands we can send to the transcript writer's main loop.
#[derive(Debug)]
pub enum TranscriptCommand {
    /// Drain whatever the bus has queued, write the buffer and flush the file.
    /// The oneshot is signalled on completion.
    FlushNow(oneshot::Sender<Result<(), Error>>),
}

/// Cloneable handle for the transcript task.
#[derive(Clone)]
pub struct TranscriptControl {
    cmd_tx: mpsc::Sender<TranscriptCommand>,
}

impl TranscriptControl {
    pub fn new(cmd_tx: mpsc::Sender<TranscriptCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Forces everything published so far onto disk. Errors if the task is
    /// gone or the write fails.
    pub async fn flush_now(&self) -> Result<(), Error> {
        trace!("TranscriptControl: flush_now() called.");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.cmd_tx
            .send(TranscriptCommand::FlushNow(reply_tx))
            .await
            .map_err(|_| Error::EventBus("transcript task is not running".into()))?;

        match reply_rx.await {
            Ok(res) => res,
            Err(_) => Err(Error::EventBus("transcript flush was dropped".into())),
        }
    }
}
