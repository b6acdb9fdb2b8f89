//! Asynchronous request dispatch.
//!
//! [`Dispatcher::spawn`] issues one remote call on the tokio runtime and hands
//! its [`Reply`] to a continuation exactly once, whatever the outcome. The
//! caller never blocks on the network.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use holodoc_core::{DocumentService, Endpoint, Reply};

/// Spawns remote calls against a shared [`DocumentService`].
pub struct Dispatcher<S: ?Sized> {
    service: Arc<S>,
    in_flight: Arc<AtomicUsize>,
}

impl<S: ?Sized> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<S: DocumentService + ?Sized> Dispatcher<S> {
    pub fn new(service: Arc<S>) -> Self {
        Self {
            service,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Calls spawned whose continuation has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `request` in the background and pass its reply to `continuation`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, R, Fut, C>(&self, endpoint: Endpoint, request: R, continuation: C) -> JoinHandle<()>
    where
        T: Send + 'static,
        R: FnOnce(Arc<S>) -> Fut,
        Fut: Future<Output = Reply<T>> + Send + 'static,
        C: FnOnce(Reply<T>) + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let future = request(Arc::clone(&self.service));
        let span = tracing::debug_span!(
            "dispatch",
            subsystem = "sync",
            component = "dispatcher",
            op = endpoint.operation()
        );

        tokio::spawn(
            async move {
                let _guard = guard;
                let start = Instant::now();
                let reply = future.await;
                debug!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    success = reply.success,
                    "Remote call finished"
                );
                continuation(reply);
            }
            .instrument(span),
        )
    }
}
