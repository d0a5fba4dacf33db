//! Relay session actor
//!
//! A single task owns the sink and the producers. Control calls are sent to
//! it as commands and answered over oneshot channels, so `attach`,
//! `switch_source` and `close` are sequenced with the forwarding loop no
//! matter which task issues them.
//!
//! The forwarding loop reserves sink capacity before it pulls the next chunk
//! from the producer. A slow consumer therefore stalls the producer instead
//! of growing a buffer.

use super::{RelayError, RelayStream};
use crate::llm::{LlmError, SegmentBody};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

type SinkItem = Result<Bytes, RelayError>;
type Reply = oneshot::Sender<Result<(), RelayError>>;

const COMMAND_BUFFER: usize = 8;

enum Command {
    Attach { body: SegmentBody, reply: Reply },
    Switch { body: SegmentBody, reply: Reply },
    Close { reply: oneshot::Sender<()> },
    Fail { error: RelayError, reply: Reply },
}

/// Control handle of a relay session.
///
/// Protocol:
/// - `attach` installs the first producer (or a producer after the previous
///   one fully drained). Rejected with `SwitchWhileActive` while another is
///   active or queued, and with `AlreadyClosed` after `close`/`fail`.
/// - `switch_source` hands over the next producer. If the current one is
///   still draining, the call waits until it has drained and the new one
///   has taken over; a second switch during that wait is rejected. Each
///   switch that takes effect bumps the counter.
/// - `close` ends the session once the current producer drains. Idempotent.
/// - `fail` is the error-closing variant: the current producer drains, any
///   queued one is discarded (its waiting switch gets the same error), then
///   the consumer receives the error.
///
/// `AlreadyClosed` and `SwitchWhileActive` answered by a live session are
/// protocol misuse and panic in debug builds.
#[derive(Clone)]
pub struct RelayChannel {
    commands: mpsc::Sender<Command>,
    switches: Arc<AtomicU32>,
    cancel: CancellationToken,
}

impl RelayChannel {
    /// Start a session whose sink holds at most `buffer` chunks.
    pub fn new(buffer: usize) -> (Self, RelayStream) {
        let (sink_tx, sink_rx) = mpsc::channel(buffer.max(1));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let switches = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let session = Session {
            commands: cmd_rx,
            commands_open: true,
            sink: sink_tx,
            active: None,
            pending: None,
            closing: None,
            switches: switches.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(session.run().in_current_span());

        let channel = Self {
            commands: cmd_tx,
            switches,
            cancel,
        };
        (channel, RelayStream::new(sink_rx))
    }

    pub async fn attach(&self, body: SegmentBody) -> Result<(), RelayError> {
        self.request("attach", |reply| Command::Attach { body, reply })
            .await
    }

    pub async fn switch_source(&self, body: SegmentBody) -> Result<(), RelayError> {
        self.request("switch_source", |reply| Command::Switch { body, reply })
            .await
    }

    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Close { reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn fail(&self, error: RelayError) -> Result<(), RelayError> {
        self.request("fail", |reply| Command::Fail { error, reply })
            .await
    }

    /// Number of accepted `switch_source` calls
    pub fn switches(&self) -> u32 {
        self.switches.load(Ordering::SeqCst)
    }

    /// Tear the session down from the control side.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when the consumer disconnects (or `cancel` is called)
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send a command and wait for the session's answer.
    ///
    /// A rejection the session reports as misuse panics in debug builds.
    async fn request(
        &self,
        op: &'static str,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<(), RelayError> {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(make(tx)).await.is_err() {
            return Err(self.gone());
        }
        match rx.await {
            Ok(result) => {
                if let Err(e) = &result {
                    debug_assert!(!e.is_misuse(), "relay protocol misuse in {op}: {e}");
                }
                result
            }
            Err(_) => Err(self.gone()),
        }
    }

    /// Error for a command that reached no session
    fn gone(&self) -> RelayError {
        if self.cancel.is_cancelled() {
            RelayError::Cancelled
        } else {
            RelayError::AlreadyClosed
        }
    }
}

enum Closing {
    Clean,
    Failed(RelayError),
}

enum Step {
    Forwarded,
    Drained,
    Failed(LlmError),
    ConsumerGone,
}

struct Session {
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    sink: mpsc::Sender<SinkItem>,
    active: Option<SegmentBody>,
    /// Next producer and the `switch_source` call waiting on it
    pending: Option<(SegmentBody, Reply)>,
    closing: Option<Closing>,
    switches: Arc<AtomicU32>,
    cancel: CancellationToken,
}

impl Session {
    async fn run(mut self) {
        loop {
            if self.active.is_none() && self.closing.is_some() {
                self.finish().await;
                return;
            }

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    self.teardown();
                    return;
                }
                () = self.sink.closed() => {
                    tracing::info!("Relay consumer disconnected, cancelling producer");
                    self.cancel.cancel();
                    self.teardown();
                    return;
                }
                cmd = self.commands.recv(), if self.commands_open => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => self.controller_gone(),
                },
                step = forward(self.active.as_mut(), &self.sink) => match step {
                    Step::Forwarded => {}
                    Step::Drained => {
                        self.active = None;
                        if let Some((body, reply)) = self.pending.take() {
                            self.activate(body, reply);
                        }
                    }
                    Step::Failed(err) => {
                        tracing::warn!(error = %err, "Relay producer failed mid-stream");
                        self.active = None;
                        self.pending = None;
                        let _ = self.sink.send(Err(RelayError::Segment(err))).await;
                        return;
                    }
                    Step::ConsumerGone => {
                        tracing::info!("Relay consumer disconnected, cancelling producer");
                        self.cancel.cancel();
                        self.teardown();
                        return;
                    }
                },
            }
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Attach { body, reply } => {
                let result = if self.closing.is_some() {
                    Err(RelayError::AlreadyClosed)
                } else if self.active.is_some() || self.pending.is_some() {
                    Err(RelayError::SwitchWhileActive)
                } else {
                    self.active = Some(body);
                    Ok(())
                };
                respond(reply, result, "attach");
            }
            Command::Switch { body, reply } => {
                if self.closing.is_some() {
                    respond(reply, Err(RelayError::AlreadyClosed), "switch_source");
                } else if self.pending.is_some() {
                    respond(reply, Err(RelayError::SwitchWhileActive), "switch_source");
                } else if self.active.is_some() {
                    // Answered once the current producer drains
                    self.pending = Some((body, reply));
                } else {
                    self.activate(body, reply);
                }
            }
            Command::Close { reply } => {
                if self.closing.is_none() {
                    self.closing = Some(Closing::Clean);
                }
                let _ = reply.send(());
            }
            Command::Fail { error, reply } => {
                let result = if let Some(Closing::Failed(_)) = self.closing {
                    Err(RelayError::AlreadyClosed)
                } else {
                    if let Some((_, waiting)) = self.pending.take() {
                        let _ = waiting.send(Err(error.clone()));
                    }
                    self.closing = Some(Closing::Failed(error));
                    Ok(())
                };
                respond(reply, result, "fail");
            }
        }
    }

    fn activate(&mut self, body: SegmentBody, reply: Reply) {
        self.active = Some(body);
        let switches = self.switches.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(switches, "Relay switched producer");
        let _ = reply.send(Ok(()));
    }

    /// Every control handle was dropped without closing the session.
    fn controller_gone(&mut self) {
        self.commands_open = false;
        if self.closing.is_none() {
            tracing::warn!("Relay controller dropped without closing");
            self.pending = None;
            self.closing = Some(Closing::Failed(RelayError::Aborted(
                "response ended unexpectedly".to_string(),
            )));
        }
    }

    async fn finish(&mut self) {
        if let Some(Closing::Failed(error)) = self.closing.take() {
            let _ = self.sink.send(Err(error)).await;
        }
        tracing::debug!(switches = self.switches.load(Ordering::SeqCst), "Relay closed");
    }

    fn teardown(&mut self) {
        self.active = None;
        self.pending = None;
        // Only lands if a consumer is still attached (explicit cancel)
        let _ = self.sink.try_send(Err(RelayError::Cancelled));
    }
}

fn respond(reply: Reply, result: Result<(), RelayError>, op: &'static str) {
    if let Err(e) = &result {
        if e.is_misuse() {
            tracing::error!(op, error = %e, "Relay protocol misuse");
        }
    }
    let _ = reply.send(result);
}

/// Move one chunk from the active producer to the sink.
async fn forward(active: Option<&mut SegmentBody>, sink: &mpsc::Sender<SinkItem>) -> Step {
    let Some(body) = active else {
        return std::future::pending().await;
    };
    let Ok(permit) = sink.reserve().await else {
        return Step::ConsumerGone;
    };
    match body.next().await {
        Some(Ok(bytes)) => {
            permit.send(Ok(bytes));
            Step::Forwarded
        }
        Some(Err(err)) => Step::Failed(err),
        None => Step::Drained,
    }
}
