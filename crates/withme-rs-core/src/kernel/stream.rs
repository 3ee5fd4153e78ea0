//! Event plumbing for streamed chat turns.

use super::response::ChatResponse;
use crate::error::KernelError;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use withme_rs_protocol::{EventMsg, EventPayload, EventSink, SessionId, TurnId};

/// Events buffered per streamed turn before the producer waits on the consumer.
pub(crate) const RUN_STREAM_BUFFER: usize = 1024;

/// Handle for a chat turn running in the background.
pub struct ChatStream {
    pub session_id: SessionId,
    pub turn_id: TurnId,
    /// Turn events in emission order. Nothing is dropped; a slow reader
    /// pauses the turn instead.
    pub events: ReceiverStream<EventMsg>,
    handle: JoinHandle<Result<ChatResponse, KernelError>>,
}

impl ChatStream {
    pub(crate) fn new(
        session_id: SessionId,
        turn_id: TurnId,
        events: ReceiverStream<EventMsg>,
        handle: JoinHandle<Result<ChatResponse, KernelError>>,
    ) -> Self {
        Self {
            session_id,
            turn_id,
            events,
            handle,
        }
    }

    /// Drain any unread events, then await the turn and return its response.
    pub async fn finish(mut self) -> Result<ChatResponse, KernelError> {
        while self.events.next().await.is_some() {}
        join(self.handle).await
    }

    /// Stop reading events and wait for the turn to wind down. A turn still
    /// generating its reply ends with [`KernelError::Cancelled`].
    pub async fn cancel(self) -> Result<ChatResponse, KernelError> {
        drop(self.events);
        join(self.handle).await
    }
}

async fn join(
    handle: JoinHandle<Result<ChatResponse, KernelError>>,
) -> Result<ChatResponse, KernelError> {
    handle
        .await
        .map_err(|err| KernelError::Executor(err.to_string()))?
}

/// Lossless per-turn channel feeding a [`ChatStream`].
#[derive(Clone)]
pub(crate) struct RunEventBus {
    sender: mpsc::Sender<EventMsg>,
}

impl RunEventBus {
    pub(crate) fn new(buffer: usize) -> (Self, ReceiverStream<EventMsg>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, ReceiverStream::new(receiver))
    }

    async fn emit(&self, event: EventMsg) {
        let _ = self.sender.send(event).await;
    }

    fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Where one turn's events go: the kernel-wide observer and, for streamed
/// turns, the per-turn bus.
#[derive(Clone)]
pub(crate) struct TurnEvents {
    session_id: SessionId,
    observer: Option<Arc<dyn EventSink>>,
    bus: Option<RunEventBus>,
}

impl TurnEvents {
    pub(crate) fn new(
        session_id: SessionId,
        observer: Option<Arc<dyn EventSink>>,
        bus: Option<RunEventBus>,
    ) -> Self {
        Self {
            session_id,
            observer,
            bus,
        }
    }

    pub(crate) async fn emit(&self, payload: EventPayload) {
        if self.observer.is_none() && self.bus.is_none() {
            return;
        }
        let event = EventMsg::new(self.session_id, payload);
        if let Some(observer) = &self.observer {
            observer.emit(event.clone());
        }
        if let Some(bus) = &self.bus {
            bus.emit(event).await;
        }
    }

    /// True once the streaming consumer dropped its receiver.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.bus.as_ref().is_some_and(RunEventBus::is_abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    #[tokio::test]
    async fn bus_waits_for_reader_instead_of_dropping() {
        let session_id = Uuid::new_v4();
        let turn_id = Uuid::new_v4();
        let (bus, mut receiver) = RunEventBus::new(2);
        let events = TurnEvents::new(session_id, None, Some(bus));
        let producer = tokio::spawn(async move {
            for idx in 0..10 {
                events
                    .emit(EventPayload::ReplyDelta {
                        turn_id,
                        delta: idx.to_string(),
                    })
                    .await;
            }
        });

        let mut deltas = Vec::new();
        while let Some(event) = receiver.next().await {
            if let EventPayload::ReplyDelta { delta, .. } = event.payload {
                deltas.push(delta);
            }
        }
        producer.await.expect("producer");
        let expected = (0..10).map(|idx| idx.to_string()).collect::<Vec<_>>();
        assert_eq!(deltas, expected);
    }

    #[test]
    fn closed_receiver_marks_turn_abandoned() {
        let (bus, receiver) = RunEventBus::new(4);
        let events = TurnEvents::new(Uuid::new_v4(), None, Some(bus));
        assert!(!events.is_abandoned());
        drop(receiver);
        assert!(events.is_abandoned());
        assert!(!TurnEvents::new(Uuid::new_v4(), None, None).is_abandoned());
    }
}
