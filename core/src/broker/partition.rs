//! One tokio task per partition owning its stream processor

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::processing::{
    CommandRouter, ProcessingError, ResponseChannel, SideEffectError, StreamProcessor,
};
use crate::state::StateSnapshot;
use crate::types::{
    Key, LogEntry, MessageStartEventSubscriptionRecord, PartitionId, Position, RequestMetadata,
};

pub(crate) type ResponseSender = oneshot::Sender<LogEntry>;

pub(crate) enum PartitionCommand {
    /// A client command; the response arrives once it was processed
    Append {
        command: LogEntry,
        respond_to: ResponseSender,
    },
    /// A command sent by another partition
    Forwarded(LogEntry),
    Inspect(oneshot::Sender<PartitionView>),
    Snapshot(oneshot::Sender<StateSnapshot>),
    Shutdown,
}

/// What a partition knows, for inspection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionView {
    pub partition_id: PartitionId,
    pub position: Position,
    pub workflows: Vec<WorkflowView>,
    pub subscriptions: Vec<MessageStartEventSubscriptionRecord>,
    pub messages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowView {
    pub key: Key,
    pub bpmn_process_id: String,
    pub version: i32,
    pub resource_name: String,
}

/* ===================== Side Effect Channels ===================== */

/// Clients waiting for the response to their command
///
/// Responses are handed over by the side effect phase and delivered once the
/// partition has processed everything the command led to, so a client never
/// observes a partition before its forwards are queued.
#[derive(Clone, Default)]
pub(crate) struct PendingResponses {
    inner: Arc<Mutex<Responses>>,
}

#[derive(Default)]
struct Responses {
    waiting: HashMap<Uuid, ResponseSender>,
    ready: Vec<(ResponseSender, LogEntry)>,
}

impl PendingResponses {
    fn lock(&self) -> MutexGuard<'_, Responses> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn register(&self, request: RequestMetadata, respond_to: ResponseSender) {
        self.lock().waiting.insert(request.request_id, respond_to);
    }

    /// Deliver the responses handed over since the last flush
    fn flush(&self) {
        let ready = std::mem::take(&mut self.lock().ready);
        for (sender, response) in ready {
            if sender.send(response).is_err() {
                debug!("Client stopped waiting for its response");
            }
        }
    }
}

impl ResponseChannel for PendingResponses {
    fn respond(
        &mut self,
        request: RequestMetadata,
        response: &LogEntry,
    ) -> Result<(), SideEffectError> {
        let mut responses = self.lock();
        let sender = responses
            .waiting
            .remove(&request.request_id)
            .ok_or(SideEffectError::ResponseDropped(request.request_id))?;
        responses.ready.push((sender, response.clone()));
        Ok(())
    }
}

/// Partition-addressed command channels
///
/// A busy partition gets the command from a background task once it has room
/// again; the sending partition never waits. Only a stopped partition fails.
#[derive(Clone)]
pub(crate) struct PartitionRouter {
    partitions: HashMap<PartitionId, mpsc::Sender<PartitionCommand>>,
}

impl PartitionRouter {
    pub(crate) fn new(partitions: HashMap<PartitionId, mpsc::Sender<PartitionCommand>>) -> Self {
        Self { partitions }
    }
}

impl CommandRouter for PartitionRouter {
    fn send(
        &mut self,
        partition_id: PartitionId,
        command: LogEntry,
    ) -> Result<(), SideEffectError> {
        let sender = self
            .partitions
            .get(&partition_id)
            .ok_or(SideEffectError::PartitionUnreachable(partition_id))?;

        match sender.try_send(PartitionCommand::Forwarded(command)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                debug!(partition_id, "Partition is busy, forwarding in the background");
                let sender = sender.clone();
                tokio::spawn(async move {
                    if sender.send(command).await.is_err() {
                        warn!(partition_id, "Partition stopped before the forward arrived");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => {
                Err(SideEffectError::PartitionUnreachable(partition_id))
            }
        }
    }
}

/* ===================== Actor ===================== */

pub(crate) struct PartitionActor {
    processor: StreamProcessor,
    responses: PendingResponses,
    commands: mpsc::Receiver<PartitionCommand>,
    shutdown: CancellationToken,
}

impl PartitionActor {
    pub(crate) fn new(
        processor: StreamProcessor,
        responses: PendingResponses,
        commands: mpsc::Receiver<PartitionCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            processor,
            responses,
            commands,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        let partition_id = self.processor.partition_id();
        info!(partition_id, "Partition started");

        loop {
            let command = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                command = self.commands.recv() => command,
            };

            let Some(command) = command else {
                break;
            };

            match self.handle(command) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!(partition_id, error = %e, "Partition stopped processing");
                    break;
                }
            }
        }

        info!(
            partition_id,
            position = self.processor.last_processed_position(),
            "Partition stopped"
        );
    }

    /// Returns false once the partition should stop
    fn handle(&mut self, command: PartitionCommand) -> Result<bool, ProcessingError> {
        match command {
            PartitionCommand::Append {
                command,
                respond_to,
            } => {
                match command.request {
                    Some(request) => self.responses.register(request, respond_to),
                    None => warn!("Client command without request metadata gets no response"),
                }
                let position = self.processor.append_command(command)?;
                debug!(position, "Appended client command");
                let processed = self.processor.process_until_idle();
                self.responses.flush();
                processed?;
            }
            PartitionCommand::Forwarded(command) => {
                let position = self.processor.append_command(command)?;
                debug!(position, "Appended forwarded command");
                let processed = self.processor.process_until_idle();
                self.responses.flush();
                processed?;
            }
            PartitionCommand::Inspect(respond_to) => {
                let _ = respond_to.send(self.view());
            }
            PartitionCommand::Snapshot(respond_to) => {
                let _ = respond_to.send(self.processor.snapshot());
            }
            PartitionCommand::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    fn view(&self) -> PartitionView {
        let state = self.processor.state();
        PartitionView {
            partition_id: self.processor.partition_id(),
            position: self.processor.last_processed_position(),
            workflows: state
                .workflows
                .workflows()
                .iter()
                .map(|w| WorkflowView {
                    key: w.key,
                    bpmn_process_id: w.bpmn_process_id.clone(),
                    version: w.version,
                    resource_name: w.resource_name.clone(),
                })
                .collect(),
            subscriptions: state.subscriptions.subscriptions().cloned().collect(),
            messages: state.messages.len(),
        }
    }
}
