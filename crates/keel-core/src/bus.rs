use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::rc::Rc;

use crate::message::{ListenerRef, MessageRef, MessageStatus, MessageType};

#[derive(Default)]
struct Registry {
    by_type: HashMap<MessageType, Vec<ListenerRef>>,
    wildcard: Vec<ListenerRef>,
    /// Double buffer: `queues[active]` takes new messages while the other
    /// one is being drained by [`MessageBus::flush`].
    queues: [VecDeque<MessageRef>; 2],
    active: usize,
}

impl Registry {
    fn has_type_listeners(&self, kind: MessageType) -> bool {
        self.by_type.get(&kind).is_some_and(|list| !list.is_empty())
    }
}

/// Type-keyed publish/subscribe bus with immediate and deferred delivery.
///
/// The bus is a cheap shared handle: clones refer to the same registry and
/// queues. That lets listeners keep a clone and enqueue, trigger or
/// (un)register while the bus is dispatching to them. Listener lists are
/// snapshotted before delivery, so registry changes made during a dispatch
/// take effect from the next message on.
///
/// The frame loop uses the bus in two ways:
/// 1. **Trigger** ([`dispatch_now`](Self::dispatch_now)) delivers
///    synchronously, in registration order, before returning.
/// 2. **Queue** ([`enqueue`](Self::enqueue)) holds the message until the next
///    [`flush`](Self::flush); a message nobody consumes is queued again.
#[derive(Clone, Default)]
pub struct MessageBus {
    inner: Rc<RefCell<Registry>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for messages of `kind`.
    ///
    /// Returns `false` and leaves the registry unchanged if this exact
    /// listener is already registered for `kind`.
    pub fn register_listener(&self, listener: ListenerRef, kind: MessageType) -> bool {
        let mut registry = self.inner.borrow_mut();
        let list = registry.by_type.entry(kind).or_default();
        if list.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        list.push(listener);
        tracing::debug!(kind, listeners = list.len(), "listener registered");
        true
    }

    /// Register `listener` for every message type. Returns `false` on a
    /// duplicate.
    pub fn register_wildcard_listener(&self, listener: ListenerRef) -> bool {
        let mut registry = self.inner.borrow_mut();
        if registry.wildcard.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        registry.wildcard.push(listener);
        tracing::debug!(listeners = registry.wildcard.len(), "wildcard listener registered");
        true
    }

    /// Remove `listener` from `kind`. Returns whether anything was removed.
    pub fn unregister_listener(&self, listener: &ListenerRef, kind: MessageType) -> bool {
        let mut registry = self.inner.borrow_mut();
        let Some(list) = registry.by_type.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !Rc::ptr_eq(l, listener));
        let removed = list.len() != before;
        if list.is_empty() {
            registry.by_type.remove(&kind);
        }
        removed
    }

    /// Remove `listener` from the wildcard list. Returns whether anything was
    /// removed.
    pub fn unregister_wildcard_listener(&self, listener: &ListenerRef) -> bool {
        let mut registry = self.inner.borrow_mut();
        let before = registry.wildcard.len();
        registry.wildcard.retain(|l| !Rc::ptr_eq(l, listener));
        registry.wildcard.len() != before
    }

    /// Return `true` if at least one type-bound listener exists for `kind`.
    pub fn has_listeners(&self, kind: MessageType) -> bool {
        self.inner.borrow().has_type_listeners(kind)
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: MessageType) -> usize {
        self.inner.borrow().by_type.get(&kind).map_or(0, Vec::len)
    }

    /// Number of wildcard listeners.
    pub fn wildcard_count(&self) -> usize {
        self.inner.borrow().wildcard.len()
    }

    /// Deliver `message` now: type-bound listeners first, then wildcard
    /// listeners, each in registration order.
    ///
    /// Every listener is called even after one consumes the message. If no
    /// type-bound listener exists the result is `NoListener`, unless a
    /// wildcard listener consumed it, which always yields `Consumed`.
    pub fn dispatch_now(&self, message: &MessageRef) -> MessageStatus {
        let (targets, wildcard) = {
            let registry = self.inner.borrow();
            let targets = registry
                .by_type
                .get(&message.kind())
                .filter(|list| !list.is_empty())
                .cloned();
            (targets, registry.wildcard.clone())
        };

        let mut status = if targets.is_some() {
            MessageStatus::NotConsumed
        } else {
            MessageStatus::NoListener
        };

        for listener in targets.iter().flatten().chain(wildcard.iter()) {
            if listener.on_message(message) {
                status = MessageStatus::Consumed;
            }
        }

        tracing::trace!(kind = message.kind(), %status, "message dispatched");
        status
    }

    /// Queue `message` for the next [`flush`](Self::flush).
    ///
    /// Fails with `NoListener` when no type-bound listener exists for the
    /// message type; wildcard listeners do not count. This keeps messages
    /// nobody can consume out of the queue.
    pub fn enqueue(&self, message: MessageRef) -> MessageStatus {
        let mut registry = self.inner.borrow_mut();
        if !registry.has_type_listeners(message.kind()) {
            tracing::trace!(kind = message.kind(), "enqueue rejected: no listener");
            return MessageStatus::NoListener;
        }
        let active = registry.active;
        registry.queues[active].push_back(message);
        MessageStatus::Success
    }

    /// Deliver every message queued since the last flush.
    ///
    /// The fill queue is swapped out first, so messages enqueued while this
    /// runs land in the fresh buffer and wait for the next flush. A message
    /// whose dispatch ends `NotConsumed` is queued again; `Consumed` and
    /// `NoListener` drop it. Returns how many messages were dispatched.
    pub fn flush(&self) -> usize {
        let (ready_idx, mut ready) = {
            let mut registry = self.inner.borrow_mut();
            let ready_idx = registry.active;
            registry.active ^= 1;
            let fill = registry.active;
            registry.queues[fill].clear();
            (ready_idx, mem::take(&mut registry.queues[ready_idx]))
        };

        let mut dispatched = 0;
        let mut requeued = 0;
        while let Some(message) = ready.pop_front() {
            dispatched += 1;
            if self.dispatch_now(&message) == MessageStatus::NotConsumed {
                let mut registry = self.inner.borrow_mut();
                let fill = registry.active;
                registry.queues[fill].push_back(message);
                requeued += 1;
            }
        }

        // Hand the drained buffer back so its allocation is reused.
        let mut registry = self.inner.borrow_mut();
        if registry.queues[ready_idx].is_empty() {
            registry.queues[ready_idx] = ready;
        }

        if dispatched > 0 {
            tracing::trace!(dispatched, requeued, "message queue flushed");
        }
        dispatched
    }

    /// Number of messages waiting for the next flush.
    pub fn pending(&self) -> usize {
        let registry = self.inner.borrow();
        registry.queues[registry.active].len()
    }

    /// Drop every listener and every queued message.
    pub fn clear(&self) {
        let mut registry = self.inner.borrow_mut();
        registry.by_type.clear();
        registry.wildcard.clear();
        for queue in &mut registry.queues {
            queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{listener_fn, Listener, Message};
    use std::cell::{Cell, RefCell};

    /// Records every message kind it sees under its own tag.
    struct Recorder {
        tag: &'static str,
        consume: Cell<bool>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        fn new(tag: &'static str, consume: bool, log: &Rc<RefCell<Vec<String>>>) -> Rc<Self> {
            Rc::new(Self {
                tag,
                consume: Cell::new(consume),
                log: Rc::clone(log),
            })
        }
    }

    impl Listener for Recorder {
        fn on_message(&self, message: &MessageRef) -> bool {
            self.log
                .borrow_mut()
                .push(format!("{}:{}", self.tag, message.kind()));
            self.consume.get()
        }
    }

    fn new_log() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn duplicate_registration_rejected() {
        let bus = MessageBus::new();
        let log = new_log();
        let l: ListenerRef = Recorder::new("a", true, &log);
        assert!(bus.register_listener(l.clone(), 1));
        assert!(!bus.register_listener(l.clone(), 1));
        assert_eq!(bus.listener_count(1), 1);

        let _ = bus.dispatch_now(&Message::new(1, 0.0));
        assert_eq!(log.borrow().as_slice(), &["a:1"]);
    }

    #[test]
    fn same_listener_may_bind_several_types() {
        let bus = MessageBus::new();
        let log = new_log();
        let l: ListenerRef = Recorder::new("a", true, &log);
        assert!(bus.register_listener(l.clone(), 1));
        assert!(bus.register_listener(l, 2));
        assert!(bus.has_listeners(1));
        assert!(bus.has_listeners(2));
    }

    #[test]
    fn duplicate_wildcard_rejected() {
        let bus = MessageBus::new();
        let log = new_log();
        let w: ListenerRef = Recorder::new("w", false, &log);
        assert!(bus.register_wildcard_listener(w.clone()));
        assert!(!bus.register_wildcard_listener(w));
        assert_eq!(bus.wildcard_count(), 1);
    }

    #[test]
    fn dispatch_order_type_then_wildcard() {
        let bus = MessageBus::new();
        let log = new_log();
        let w: ListenerRef = Recorder::new("w", false, &log);
        let a: ListenerRef = Recorder::new("a", false, &log);
        let b: ListenerRef = Recorder::new("b", false, &log);
        assert!(bus.register_wildcard_listener(w));
        assert!(bus.register_listener(a, 5));
        assert!(bus.register_listener(b, 5));

        let status = bus.dispatch_now(&Message::new(5, 0.0));
        assert_eq!(status, MessageStatus::NotConsumed);
        assert_eq!(log.borrow().as_slice(), &["a:5", "b:5", "w:5"]);
    }

    #[test]
    fn dispatch_does_not_short_circuit() {
        let bus = MessageBus::new();
        let log = new_log();
        assert!(bus.register_listener(Recorder::new("a", true, &log), 2));
        assert!(bus.register_listener(Recorder::new("b", true, &log), 2));
        let status = bus.dispatch_now(&Message::new(2, 0.0));
        assert_eq!(status, MessageStatus::Consumed);
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn dispatch_without_type_listener_still_reaches_wildcards() {
        let bus = MessageBus::new();
        let log = new_log();
        let w = Recorder::new("w", false, &log);
        assert!(bus.register_wildcard_listener(w.clone()));

        assert_eq!(bus.dispatch_now(&Message::new(9, 0.0)), MessageStatus::NoListener);
        assert_eq!(log.borrow().as_slice(), &["w:9"]);

        // Wildcard consumption upgrades NoListener to Consumed.
        w.consume.set(true);
        assert_eq!(bus.dispatch_now(&Message::new(9, 0.0)), MessageStatus::Consumed);
    }

    #[test]
    fn enqueue_requires_type_listener() {
        let bus = MessageBus::new();
        let log = new_log();
        assert!(bus.register_wildcard_listener(Recorder::new("w", true, &log)));
        assert_eq!(bus.enqueue(Message::new(4, 0.0)), MessageStatus::NoListener);
        assert_eq!(bus.pending(), 0);

        assert!(bus.register_listener(Recorder::new("a", true, &log), 4));
        assert_eq!(bus.enqueue(Message::new(4, 0.0)), MessageStatus::Success);
        assert_eq!(bus.pending(), 1);
    }

    #[test]
    fn flush_delivers_and_drops_consumed() {
        let bus = MessageBus::new();
        let log = new_log();
        assert!(bus.register_listener(Recorder::new("a", true, &log), 1));
        assert_eq!(bus.enqueue(Message::new(1, 0.0)), MessageStatus::Success);

        assert!(log.borrow().is_empty());
        assert_eq!(bus.flush(), 1);
        assert_eq!(log.borrow().as_slice(), &["a:1"]);
        assert_eq!(bus.pending(), 0);
        assert_eq!(bus.flush(), 0);
    }

    #[test]
    fn unconsumed_message_requeued_exactly_once() {
        let bus = MessageBus::new();
        let log = new_log();
        let a = Recorder::new("a", false, &log);
        assert!(bus.register_listener(a.clone(), 1));
        let _ = bus.enqueue(Message::new(1, 0.0));

        for round in 1..=5 {
            assert_eq!(bus.flush(), 1);
            assert_eq!(bus.pending(), 1, "round {round}");
            assert_eq!(log.borrow().len(), round);
        }

        a.consume.set(true);
        assert_eq!(bus.flush(), 1);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn requeued_message_dropped_once_listener_leaves() {
        let bus = MessageBus::new();
        let log = new_log();
        let a: ListenerRef = Recorder::new("a", false, &log);
        assert!(bus.register_listener(a.clone(), 1));
        let _ = bus.enqueue(Message::new(1, 0.0));
        bus.flush();
        assert_eq!(bus.pending(), 1);

        assert!(bus.unregister_listener(&a, 1));
        bus.flush();
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn messages_enqueued_during_flush_wait_for_next_flush() {
        let bus = MessageBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let relay_bus = bus.clone();
        let relay_seen = Rc::clone(&seen);
        let relay = listener_fn(move |m: &MessageRef| {
            relay_seen.borrow_mut().push(m.kind());
            let _ = relay_bus.enqueue(Message::new(2, m.timestamp()));
            true
        });
        let sink_seen = Rc::clone(&seen);
        let sink = listener_fn(move |m: &MessageRef| {
            sink_seen.borrow_mut().push(m.kind());
            true
        });
        assert!(bus.register_listener(relay, 1));
        assert!(bus.register_listener(sink, 2));

        let _ = bus.enqueue(Message::new(1, 0.0));
        assert_eq!(bus.flush(), 1);
        assert_eq!(seen.borrow().as_slice(), &[1]);
        assert_eq!(bus.pending(), 1);

        assert_eq!(bus.flush(), 1);
        assert_eq!(seen.borrow().as_slice(), &[1, 2]);
        assert_eq!(bus.pending(), 0);
    }

    #[test]
    fn listener_may_register_during_dispatch() {
        let bus = MessageBus::new();
        let log = new_log();
        let late: ListenerRef = Recorder::new("late", true, &log);

        let registrar_bus = bus.clone();
        let registrar = listener_fn(move |_m: &MessageRef| {
            let _ = registrar_bus.register_listener(late.clone(), 3);
            false
        });
        assert!(bus.register_listener(registrar, 3));

        // The snapshot taken before delivery does not include `late`.
        assert_eq!(bus.dispatch_now(&Message::new(3, 0.0)), MessageStatus::NotConsumed);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.dispatch_now(&Message::new(3, 0.0)), MessageStatus::Consumed);
        assert_eq!(log.borrow().as_slice(), &["late:3"]);
    }

    #[test]
    fn unregister_is_idempotent() {
        let bus = MessageBus::new();
        let log = new_log();
        let a: ListenerRef = Recorder::new("a", true, &log);
        let w: ListenerRef = Recorder::new("w", true, &log);
        assert!(!bus.unregister_listener(&a, 1));
        assert!(!bus.unregister_wildcard_listener(&w));

        assert!(bus.register_listener(a.clone(), 1));
        assert!(bus.register_wildcard_listener(w.clone()));
        assert!(bus.unregister_listener(&a, 1));
        assert!(!bus.unregister_listener(&a, 1));
        assert!(bus.unregister_wildcard_listener(&w));
        assert!(!bus.has_listeners(1));
        assert_eq!(bus.dispatch_now(&Message::new(1, 0.0)), MessageStatus::NoListener);
    }

    #[test]
    fn clear_drops_listeners_and_queue() {
        let bus = MessageBus::new();
        let log = new_log();
        assert!(bus.register_listener(Recorder::new("a", false, &log), 1));
        assert!(bus.register_wildcard_listener(Recorder::new("w", false, &log)));
        let _ = bus.enqueue(Message::new(1, 0.0));

        bus.clear();
        assert_eq!(bus.pending(), 0);
        assert_eq!(bus.wildcard_count(), 0);
        assert_eq!(bus.flush(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn clones_share_state() {
        let bus = MessageBus::new();
        let other = bus.clone();
        let log = new_log();
        assert!(other.register_listener(Recorder::new("a", true, &log), 8));
        assert!(bus.has_listeners(8));
    }
}
