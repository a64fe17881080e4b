use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Application-defined message tag.
pub type MessageType = u32;

/// Shared handle to an immutable message.
pub type MessageRef = Rc<Message>;

/// Shared handle to a listener. Identity is the allocation, so registering
/// two clones of the same `Rc` counts as a duplicate.
pub type ListenerRef = Rc<dyn Listener>;

/// An immutable message carried by the [`MessageBus`](crate::bus::MessageBus).
///
/// Messages are created once, stamped with the engine time at send time and
/// shared read-only between the bus and every listener that sees them.
pub struct Message {
    kind: MessageType,
    timestamp: f64,
    payload: Option<Box<dyn Any>>,
}

impl Message {
    /// Create a message without a payload.
    pub fn new(kind: MessageType, timestamp: f64) -> MessageRef {
        Rc::new(Self {
            kind,
            timestamp,
            payload: None,
        })
    }

    /// Create a message carrying a typed value, retrievable with
    /// [`payload`](Self::payload).
    pub fn with_payload<T: Any>(kind: MessageType, timestamp: f64, payload: T) -> MessageRef {
        Rc::new(Self {
            kind,
            timestamp,
            payload: Some(Box::new(payload)),
        })
    }

    /// Type used to route the message to listeners.
    pub fn kind(&self) -> MessageType {
        self.kind
    }

    /// Engine time, in seconds, when the message was created.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Borrow the payload if one is present and it has type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Whether the message carries any payload.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("timestamp", &self.timestamp)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Outcome of sending a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MessageStatus {
    /// Every listener that saw the message declined it.
    NotConsumed,
    /// At least one listener, type-bound or wildcard, consumed it.
    Consumed,
    /// No listener is registered for the message type.
    NoListener,
    /// The message was queued for the next flush.
    Success,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::NotConsumed => write!(f, "NOTCONSUMED"),
            MessageStatus::Consumed => write!(f, "CONSUMED"),
            MessageStatus::NoListener => write!(f, "NOLISTENER"),
            MessageStatus::Success => write!(f, "SUCCESS"),
        }
    }
}

/// Something that wants to hear about messages.
///
/// Listeners take `&self` because the bus may call them again while they are
/// still handling a message (a listener that triggers another message, for
/// instance). Keep mutable state behind `Cell`/`RefCell`.
pub trait Listener {
    /// Try to handle `message`. Return `true` if it was consumed.
    fn on_message(&self, message: &MessageRef) -> bool;
}

impl<F> Listener for F
where
    F: Fn(&MessageRef) -> bool,
{
    fn on_message(&self, message: &MessageRef) -> bool {
        self(message)
    }
}

/// Wrap a closure as a shareable listener.
pub fn listener_fn<F>(f: F) -> ListenerRef
where
    F: Fn(&MessageRef) -> bool + 'static,
{
    Rc::new(f)
}
