//! Prelude module for convenient imports
//!
//! ```no_run
//! use skylight::prelude::*;
//! ```

// Window and callback types
pub use crate::window::{
    EventListener, FrameRequestCallback, IdleDeadline, IdleRequestCallback, IdleRequestOptions,
    MessageEvent, PopupDecision, Window, WindowPostMessageOptions,
};

// Collaborators
pub use crate::event_loop::{EventLoop, TaskSource};
pub use crate::navigable::{Navigable, NavigableRegistry, WindowType};
pub use crate::origin::{Origin, Url, UrlResolver};
pub use crate::runtime::{CloneCodec, Value};

// Configuration and errors
pub use crate::config::WindowConfig;
pub use crate::error::{Error, ErrorKind, Result};
