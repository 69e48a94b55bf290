//! Publish acknowledgement tracking.
//!
//! rumqttc reports `Outgoing::Publish(pkid)` in request order, so waiters
//! queue up in the order publishes were handed to the client. QoS 0
//! publishes settle when written; higher levels move to the in-flight map
//! until the broker acknowledges their packet id.

use std::collections::{HashMap, VecDeque};

use rumqttc::QoS;
use tokio::sync::oneshot;

use panelhub_domain::error::TransportError;

pub(crate) type AckSender = oneshot::Sender<Result<(), TransportError>>;

pub(crate) struct AckQueue {
    qos: QoS,
    unwritten: VecDeque<AckSender>,
    in_flight: HashMap<u16, AckSender>,
}

impl AckQueue {
    pub(crate) fn new(qos: QoS) -> Self {
        Self {
            qos,
            unwritten: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, waiter: AckSender) {
        self.unwritten.push_back(waiter);
    }

    /// Take back the most recent waiter after the client refused its
    /// request.
    pub(crate) fn pop_last(&mut self) -> Option<AckSender> {
        self.unwritten.pop_back()
    }

    pub(crate) fn written(&mut self, pkid: u16) {
        let Some(waiter) = self.unwritten.pop_front() else {
            return;
        };
        if self.qos == QoS::AtMostOnce {
            let _ = waiter.send(Ok(()));
        } else {
            self.in_flight.insert(pkid, waiter);
        }
    }

    pub(crate) fn acknowledged(&mut self, pkid: u16) {
        if let Some(waiter) = self.in_flight.remove(&pkid) {
            let _ = waiter.send(Ok(()));
        }
    }

    /// Fail every outstanding publish after the connection dropped.
    pub(crate) fn fail_all(&mut self) -> usize {
        let failed = self.unwritten.len() + self.in_flight.len();
        for waiter in self.unwritten.drain(..).chain(self.in_flight.drain().map(|(_, w)| w)) {
            let _ = waiter.send(Err(TransportError::ConnectionLost));
        }
        failed
    }
}
