//! Event Channels
//!
//! Typed publish/subscribe used by both engines to announce state changes.
//! Everything runs on the tick thread, so handlers are plain `Fn` closures
//! behind `Rc`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Handle returned by [`EventChannel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Rc<dyn Fn(&T)>;

/// One channel per event kind
///
/// `publish` delivers to a snapshot of the subscriber list taken when the
/// call starts. A handler subscribed during delivery only sees later
/// publishes; a handler unsubscribed during delivery still receives the
/// payload currently in flight.
pub struct EventChannel<T> {
    name: &'static str,
    next_id: Cell<u64>,
    handlers: RefCell<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> EventChannel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: Cell::new(0),
            handlers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a handler; handlers run in subscription order
    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Remove a handler, returning false if it was not subscribed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(sub, _)| *sub != id);
        handlers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Deliver a payload synchronously to every current subscriber
    pub fn publish(&self, payload: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();

        trace!(channel = self.name, subscribers = snapshot.len(), "publish");

        for handler in snapshot {
            handler(payload);
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_in_subscription_order() {
        let channel: EventChannel<u32> = EventChannel::new("numbers");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        channel.subscribe(move |n| log.borrow_mut().push(("first", *n)));
        let log = Rc::clone(&seen);
        channel.subscribe(move |n| log.borrow_mut().push(("second", *n)));

        channel.publish(&7);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let channel: EventChannel<()> = EventChannel::new("unit");
        let count = Rc::new(Cell::new(0));

        let c = Rc::clone(&count);
        let id = channel.subscribe(move |_| c.set(c.get() + 1));
        channel.publish(&());
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.publish(&());

        assert_eq!(count.get(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribe_during_delivery_uses_snapshot() {
        let channel = Rc::new(EventChannel::<u32>::new("snapshot"));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let victim = Rc::new(Cell::new(None));

        // First handler removes the second one mid-delivery
        let ch = Rc::clone(&channel);
        let v = Rc::clone(&victim);
        channel.subscribe(move |_| {
            if let Some(id) = v.take() {
                ch.unsubscribe(id);
            }
        });
        let log = Rc::clone(&seen);
        let id = channel.subscribe(move |n| log.borrow_mut().push(*n));
        victim.set(Some(id));

        channel.publish(&1);
        channel.publish(&2);

        // In-flight payload still delivered, later ones are not
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_subscribe_during_delivery_waits_for_next_publish() {
        let channel = Rc::new(EventChannel::<u32>::new("late"));
        let seen = Rc::new(RefCell::new(Vec::new()));

        let ch = Rc::clone(&channel);
        let log = Rc::clone(&seen);
        let added = Cell::new(false);
        channel.subscribe(move |_| {
            if !added.replace(true) {
                let log = Rc::clone(&log);
                ch.subscribe(move |n| log.borrow_mut().push(*n));
            }
        });

        channel.publish(&1);
        channel.publish(&2);
        assert_eq!(*seen.borrow(), vec![2]);
    }
}
