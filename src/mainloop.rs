//! Event loop
//!
//! One task owns the [`Resources`] (and through them the mesh backend and the
//! diagnostic cache). Requests arrive through a [`Mailbox`], diagnostic
//! replies through the mesh's event channel, and an interval tick drives the
//! completion poller for responses still pending.

use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::mesh::DiagnosticEvents;
use crate::rest::{Request, Resources, Response};

/// Mailbox depth before senders wait
const MAILBOX_CAPACITY: usize = 64;

/// A request addressed to the event loop, with the channel for its answer
#[derive(Debug)]
pub struct Envelope {
    pub id: Uuid,
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// Sending half of the event loop's mailbox
pub type Mailbox = mpsc::Sender<Envelope>;

/// A deferred response waiting for its window to close
struct Pending {
    id: Uuid,
    request: Request,
    response: Response,
    reply: oneshot::Sender<Response>,
}

/// Single-owner loop around the dispatch table
pub struct Mainloop {
    resources: Resources,
    inbox: mpsc::Receiver<Envelope>,
    events: DiagnosticEvents,
    pending: Vec<Pending>,
    tick: Duration,
}

impl Mainloop {
    /// Create the loop and the mailbox that feeds it
    #[must_use]
    pub fn new(resources: Resources, events: DiagnosticEvents, tick: Duration) -> (Self, Mailbox) {
        let (mailbox, inbox) = mpsc::channel(MAILBOX_CAPACITY);
        let mainloop = Self {
            resources,
            inbox,
            events,
            pending: Vec::new(),
            tick,
        };
        (mainloop, mailbox)
    }

    #[must_use]
    pub const fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Number of responses waiting on the completion poller
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Run until `shutdown` fires or every mailbox sender is dropped
    pub async fn run(mut self, mut shutdown: mpsc::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(tick = ?self.tick, "event loop started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                envelope = self.inbox.recv() => {
                    let Some(envelope) = envelope else {
                        tracing::debug!("mailbox closed");
                        break;
                    };
                    self.dispatch(envelope, now());
                }
                Some(event) = self.events.recv() => {
                    self.resources.handle_diagnostic_event(event, now());
                }
                _ = ticker.tick() => self.poll(now()),
            }
        }

        if !self.pending.is_empty() {
            tracing::warn!(count = self.pending.len(), "dropping pending responses");
        }
        tracing::info!("event loop stopped");
    }

    /// Handle one request, answering at once unless completion is deferred
    pub fn dispatch(&mut self, envelope: Envelope, now: Instant) {
        let Envelope { id, request, reply } = envelope;
        tracing::debug!(
            request_id = %id,
            method = %request.method(),
            path = request.path(),
            "dispatching"
        );

        let mut response = Response::new();
        self.resources.handle(&request, &mut response, now);

        if response.is_complete() {
            deliver(id, reply, response);
        } else {
            self.pending.push(Pending {
                id,
                request,
                response,
                reply,
            });
        }
    }

    /// Give every pending response a chance to complete
    pub fn poll(&mut self, now: Instant) {
        let pending = std::mem::take(&mut self.pending);
        for mut entry in pending {
            if entry.reply.is_closed() {
                tracing::debug!(request_id = %entry.id, "requester gone, dropping response");
                continue;
            }
            self.resources
                .handle_callback(&entry.request, &mut entry.response, now);
            if entry.response.is_complete() {
                deliver(entry.id, entry.reply, entry.response);
            } else {
                self.pending.push(entry);
            }
        }
    }
}

/// Current time on the runtime's clock
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn deliver(id: Uuid, reply: oneshot::Sender<Response>, response: Response) {
    tracing::debug!(request_id = %id, status = response.status().code(), "responding");
    if reply.send(response).is_err() {
        tracing::debug!(request_id = %id, "requester gone before response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticEngine;
    use crate::mesh::{SimTopology, SimulatedMesh, diagnostic_channel};
    use crate::rest::{HttpMethod, HttpStatus};

    fn mainloop() -> (Mainloop, Mailbox) {
        let (sink, events) = diagnostic_channel();
        let mesh = SimulatedMesh::new(SimTopology::default(), Some(sink));
        let resources = Resources::new(Box::new(mesh), DiagnosticEngine::default());
        Mainloop::new(resources, events, Duration::from_millis(50))
    }

    fn envelope(method: HttpMethod, path: &str) -> (Envelope, oneshot::Receiver<Response>) {
        let (reply, rx) = oneshot::channel();
        let envelope = Envelope {
            id: Uuid::new_v4(),
            request: Request::new(method, path, Instant::now()),
            reply,
        };
        (envelope, rx)
    }

    #[test]
    fn immediate_responses_are_sent_at_once() {
        let (mut mainloop, _mailbox) = mainloop();
        let (env, mut rx) = envelope(HttpMethod::Get, "/node/rloc16");

        mainloop.dispatch(env, Instant::now());

        let response = rx.try_recv().unwrap();
        assert_eq!(response.status(), HttpStatus::Ok);
        assert_eq!(mainloop.pending_count(), 0);
    }

    #[test]
    fn diagnostics_wait_for_the_poller() {
        let (mut mainloop, _mailbox) = mainloop();
        let (env, mut rx) = envelope(HttpMethod::Get, "/diagnostics");
        let start = Instant::now();

        mainloop.dispatch(env, start);
        assert_eq!(mainloop.pending_count(), 1);
        assert!(rx.try_recv().is_err());

        mainloop.poll(start + Duration::from_millis(1000));
        assert!(rx.try_recv().is_err());

        mainloop.poll(start + Duration::from_millis(2000));
        let response = rx.try_recv().unwrap();
        assert!(response.is_complete());
        assert_eq!(mainloop.pending_count(), 0);
    }

    #[test]
    fn abandoned_requests_are_dropped() {
        let (mut mainloop, _mailbox) = mainloop();
        let (env, rx) = envelope(HttpMethod::Get, "/diagnostics");
        let start = Instant::now();

        mainloop.dispatch(env, start);
        drop(rx);
        mainloop.poll(start + Duration::from_millis(100));
        assert_eq!(mainloop.pending_count(), 0);
    }

    #[tokio::test]
    async fn stops_when_mailbox_closes() {
        let (mainloop, mailbox) = mainloop();
        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
        drop(mailbox);
        mainloop.run(shutdown_rx).await;
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (mainloop, _mailbox) = mainloop();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        shutdown_tx.send(()).await.unwrap();
        mainloop.run(shutdown_rx).await;
    }
}
