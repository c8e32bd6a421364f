//! Message events and event listeners

use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::Window;
use crate::error::Result;
use crate::runtime::Value;

/// Event type names
pub mod event_types {
    /// A delivered message
    pub const MESSAGE: &str = "message";
    /// A message that could not be deserialized
    pub const MESSAGE_ERROR: &str = "messageerror";
}

/// Event fired at a window by the message delivery pipeline
#[derive(Clone)]
pub struct MessageEvent {
    pub event_type: &'static str,
    /// Serialized origin of the sender
    pub origin: String,
    /// The sending window
    pub source: Option<Rc<Window>>,
    /// Deserialized payload; undefined for "messageerror"
    pub data: Value,
    /// Transferred message ports, in transfer-list order
    pub ports: Vec<Value>,
}

impl MessageEvent {
    pub fn is_error(&self) -> bool {
        self.event_type == event_types::MESSAGE_ERROR
    }
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("event_type", &self.event_type)
            .field("origin", &self.origin)
            .field("source", &self.source.as_ref().map(|w| w.id()))
            .field("data", &self.data)
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// A message event handler
#[derive(Clone)]
pub struct EventListener(Rc<dyn Fn(&MessageEvent) -> Result<()>>);

impl EventListener {
    pub fn new(f: impl Fn(&MessageEvent) -> Result<()> + 'static) -> Self {
        Self(Rc::new(f))
    }

    fn call(&self, event: &MessageEvent) -> Result<()> {
        (self.0)(event)
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventListener")
    }
}

/// Registration handle returned by [`Window::add_event_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(super) struct RegisteredListener {
    id: ListenerId,
    event_type: String,
    listener: EventListener,
}

impl Window {
    pub fn add_event_listener(&self, event_type: &str, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_listener_id.get());
        self.next_listener_id.set(id.0 + 1);
        self.listeners.borrow_mut().push(RegisteredListener {
            id,
            event_type: event_type.to_string(),
            listener,
        });
        id
    }

    /// Returns false if `id` was not registered
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|registered| registered.id != id);
        listeners.len() != before
    }

    /// Invoke the listeners registered for the event's type, in registration
    /// order, and return how many ran. Listener errors are reported and do
    /// not stop the remaining listeners.
    pub fn dispatch_event(&self, event: &MessageEvent) -> usize {
        let snapshot: Vec<(ListenerId, EventListener)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|registered| registered.event_type == event.event_type)
            .map(|registered| (registered.id, registered.listener.clone()))
            .collect();

        let mut invoked = 0;
        for (id, listener) in snapshot {
            // Skip listeners removed by an earlier listener.
            let still_registered = self.listeners.borrow().iter().any(|r| r.id == id);
            if !still_registered {
                continue;
            }
            invoked += 1;
            if let Err(error) = listener.call(event) {
                self.report_exception(&error);
            }
        }

        trace!(
            target: "skylight::message",
            window = self.id(),
            event_type = event.event_type,
            invoked,
            "dispatched event"
        );
        invoked
    }
}
