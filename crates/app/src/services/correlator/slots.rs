//! Delivery slots — per-caller handoffs keyed by (topic, subscription id).
//!
//! Generic over the delivered value so the table knows nothing about
//! caching or decoding.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use panelhub_domain::id::SubscriptionId;

/// Where one caller wants inbound values delivered.
pub(crate) enum DeliverySlot<V> {
    /// Fulfilled at most once; the sender is taken on first delivery.
    Once(Option<oneshot::Sender<V>>),
    /// Receives every value until the caller releases it.
    Standing(mpsc::Sender<V>),
}

type Topics<V> = HashMap<String, HashMap<SubscriptionId, DeliverySlot<V>>>;

/// All open slots, grouped by topic.
pub(crate) struct SlotTable<V> {
    topics: Mutex<Topics<V>>,
}

impl<V> Default for SlotTable<V> {
    fn default() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> SlotTable<V> {
    pub(crate) fn open(&self, topic: &str, id: SubscriptionId, slot: DeliverySlot<V>) {
        let mut topics = self.lock();
        let previous = topics.entry(topic.to_string()).or_default().insert(id, slot);
        debug_assert!(previous.is_none(), "subscription id reused on {topic}");
    }

    pub(crate) fn remove(&self, topic: &str, id: SubscriptionId) {
        let mut topics = self.lock();
        if let Some(slots) = topics.get_mut(topic) {
            slots.remove(&id);
            if slots.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Drop every slot on `topic`; waiting callers observe a closed channel.
    pub(crate) fn close_topic(&self, topic: &str) -> usize {
        self.lock().remove(topic).map_or(0, |slots| slots.len())
    }

    /// Hand `value` to every slot open on `topic`. Returns how many slots
    /// received it.
    pub(crate) fn fulfil(&self, topic: &str, value: &V) -> usize {
        let mut topics = self.lock();
        let Some(slots) = topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, slot) in slots.iter_mut() {
            match slot {
                DeliverySlot::Once(sender) => {
                    if let Some(tx) = sender.take()
                        && tx.send(value.clone()).is_ok()
                    {
                        delivered += 1;
                    }
                }
                DeliverySlot::Standing(tx) => match tx.try_send(value.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            %topic,
                            subscription = %id,
                            "standing reader lagging, value dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {}
                },
            }
        }
        delivered
    }

    /// Open `slot` and keep it only if the returned reservation is kept.
    pub(crate) fn reserve(
        &self,
        topic: &str,
        id: SubscriptionId,
        slot: DeliverySlot<V>,
    ) -> SlotReservation<'_, V> {
        self.open(topic, id, slot);
        SlotReservation {
            table: self,
            topic: topic.to_string(),
            id,
            kept: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn open_count(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, HashMap::len)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Topics<V>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A slot that is removed again on drop unless [`SlotReservation::keep`]
/// is called.
pub(crate) struct SlotReservation<'a, V: Clone> {
    table: &'a SlotTable<V>,
    topic: String,
    id: SubscriptionId,
    kept: bool,
}

impl<V: Clone> SlotReservation<'_, V> {
    pub(crate) fn keep(mut self) {
        self.kept = true;
    }
}

impl<V: Clone> Drop for SlotReservation<'_, V> {
    fn drop(&mut self) {
        if !self.kept {
            self.table.remove(&self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(value: &str) -> String {
        value.to_string()
    }

    #[test]
    fn should_fulfil_once_slot_only_once() {
        let table = SlotTable::<String>::default();
        let (tx, mut rx) = oneshot::channel();
        table.open("topic/A", SubscriptionId::new(), DeliverySlot::Once(Some(tx)));

        assert_eq!(table.fulfil("topic/A", &reading("1")), 1);
        assert_eq!(table.fulfil("topic/A", &reading("2")), 0);
        assert_eq!(rx.try_recv().unwrap(), reading("1"));
    }

    #[test]
    fn should_not_cross_topics() {
        let table = SlotTable::<String>::default();
        let (tx, mut rx) = oneshot::channel();
        table.open("topic/B", SubscriptionId::new(), DeliverySlot::Once(Some(tx)));

        assert_eq!(table.fulfil("topic/A", &reading("1")), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn should_feed_standing_slot_every_value() {
        let table = SlotTable::<String>::default();
        let (tx, mut rx) = mpsc::channel(4);
        table.open("topic/A", SubscriptionId::new(), DeliverySlot::Standing(tx));

        table.fulfil("topic/A", &reading("1"));
        table.fulfil("topic/A", &reading("2"));
        assert_eq!(rx.try_recv().unwrap(), reading("1"));
        assert_eq!(rx.try_recv().unwrap(), reading("2"));
    }

    #[test]
    fn should_forget_topic_when_last_slot_removed() {
        let table = SlotTable::<String>::default();
        let id = SubscriptionId::new();
        let (tx, _rx) = oneshot::channel();
        table.open("topic/A", id, DeliverySlot::Once(Some(tx)));
        table.remove("topic/A", id);
        assert_eq!(table.open_count("topic/A"), 0);
    }

    #[test]
    fn should_close_all_slots_of_topic() {
        let table = SlotTable::<String>::default();
        let (tx, mut rx) = oneshot::channel::<String>();
        table.open("topic/A", SubscriptionId::new(), DeliverySlot::Once(Some(tx)));

        assert_eq!(table.close_topic("topic/A"), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn should_remove_reserved_slot_unless_kept() {
        let table = SlotTable::<String>::default();
        let (tx, _rx) = oneshot::channel();
        drop(table.reserve("topic/A", SubscriptionId::new(), DeliverySlot::Once(Some(tx))));
        assert_eq!(table.open_count("topic/A"), 0);

        let (tx, _rx) = oneshot::channel();
        table
            .reserve("topic/A", SubscriptionId::new(), DeliverySlot::Once(Some(tx)))
            .keep();
        assert_eq!(table.open_count("topic/A"), 1);
    }
}
