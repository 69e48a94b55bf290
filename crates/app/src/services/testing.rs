//! Scripted in-memory transport shared by the service tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use panelhub_domain::error::TransportError;

use crate::ports::{InboundHandler, PubSubTransport};

/// How [`ScriptedTransport::publish`] behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PublishOutcome {
    Ack,
    /// Never leaves the process.
    Refuse,
    /// Refused, but only after a delay.
    RefuseAfter(Duration),
    /// Handed off, then the connection drops.
    LoseConnection,
    /// No acknowledgement, ever.
    Hang,
}

type Handlers = Arc<Mutex<HashMap<String, Arc<dyn InboundHandler>>>>;

pub(crate) struct ScriptedTransport {
    handlers: Handlers,
    reply: Option<(Duration, Vec<u8>)>,
    reachable: bool,
    stalled: Option<String>,
    publish: PublishOutcome,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Arc::default(),
            reply: None,
            reachable: true,
            stalled: None,
            publish: PublishOutcome::Ack,
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Every new subscription receives `payload` after `delay`.
    pub(crate) fn replying(mut self, delay: Duration, payload: &str) -> Self {
        self.reply = Some((delay, payload.as_bytes().to_vec()));
        self
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Subscribing `topic` never resolves.
    pub(crate) fn stalling(mut self, topic: &str) -> Self {
        self.stalled = Some(topic.to_string());
        self
    }

    pub(crate) fn publishing(mut self, outcome: PublishOutcome) -> Self {
        self.publish = outcome;
        self
    }

    /// Push `payload` to the handler of `topic`. Returns `false` when
    /// nothing is subscribed.
    pub(crate) fn deliver(&self, topic: &str, payload: &str) -> bool {
        deliver(&self.handlers, topic, payload.as_bytes())
    }

    pub(crate) fn is_subscribed(&self, topic: &str) -> bool {
        self.handlers.lock().unwrap().contains_key(topic)
    }

    pub(crate) fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, payload)| (topic.clone(), String::from_utf8_lossy(payload).into_owned()))
            .collect()
    }
}

fn deliver(handlers: &Handlers, topic: &str, payload: &[u8]) -> bool {
    let handler = handlers.lock().unwrap().get(topic).cloned();
    match handler {
        Some(handler) => {
            handler.on_message(topic, payload);
            true
        }
        None => false,
    }
}

impl PubSubTransport for ScriptedTransport {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let outcome = if self.reachable {
            self.publish
        } else {
            PublishOutcome::Refuse
        };
        if !matches!(
            outcome,
            PublishOutcome::Refuse | PublishOutcome::RefuseAfter(_)
        ) {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
        }
        async move {
            match outcome {
                PublishOutcome::Ack => Ok(()),
                PublishOutcome::Refuse => Err(TransportError::NotConnected),
                PublishOutcome::RefuseAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Err(TransportError::NotConnected)
                }
                PublishOutcome::LoseConnection => Err(TransportError::ConnectionLost),
                PublishOutcome::Hang => std::future::pending().await,
            }
        }
    }

    fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn InboundHandler>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        let stalled = self.stalled.as_deref() == Some(topic);
        let result = if stalled {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else if self.reachable {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            self.handlers
                .lock()
                .unwrap()
                .insert(topic.to_string(), handler);
            if let Some((delay, payload)) = self.reply.clone() {
                let handlers = Arc::clone(&self.handlers);
                let topic = topic.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver(&handlers, &topic, &payload);
                });
            }
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        };
        async move {
            if stalled {
                std::future::pending::<()>().await;
            }
            result
        }
    }

    fn unsubscribe(&self, topic: &str) -> impl Future<Output = Result<(), TransportError>> + Send {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.handlers.lock().unwrap().remove(topic);
        async { Ok(()) }
    }
}
