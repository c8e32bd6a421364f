//! Shared test helpers for integration tests

use std::cell::RefCell;
use std::rc::Rc;

use skylight::window::{event_types, EventListener, MessageEvent};
use skylight::{EventLoop, NavigableRegistry, Window, WindowConfig};

/// An event loop with a registry of navigables on top of it
pub struct Session {
    pub event_loop: Rc<EventLoop>,
    pub registry: Rc<NavigableRegistry>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(WindowConfig::default())
    }

    pub fn with_config(config: WindowConfig) -> Self {
        let event_loop = Rc::new(EventLoop::with_config(&config));
        let registry = NavigableRegistry::new(event_loop.clone(), config);
        Self {
            event_loop,
            registry,
        }
    }

    /// Open a top-level window showing `url`
    pub fn window(&self, url: &str) -> Rc<Window> {
        self.registry
            .create_top_level(url)
            .unwrap_or_else(|e| panic!("failed to create window at {}: {}", url, e))
    }

    pub fn run(&self) -> usize {
        self.event_loop.run_until_idle().tasks_run
    }
}

/// A shared, append-only log for callbacks to write into
pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn new_log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// Record every "message" and "messageerror" event fired at `window`
#[allow(dead_code)]
pub fn record_messages(window: &Rc<Window>) -> Log<MessageEvent> {
    let events = new_log();
    for event_type in [event_types::MESSAGE, event_types::MESSAGE_ERROR] {
        let events = events.clone();
        window.add_event_listener(
            event_type,
            EventListener::new(move |event| {
                events.borrow_mut().push(event.clone());
                Ok(())
            }),
        );
    }
    events
}
