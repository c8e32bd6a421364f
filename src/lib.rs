//! Skylight: the scheduling and messaging core of a browser window global
//!
//! Skylight implements the parts of the `Window` object that are small
//! state machines rather than plain data access: `window.open`,
//! `postMessage`, idle callbacks and animation frame callbacks. Everything
//! they depend on (the task queue, the URL parser, the structured clone
//! codec, navigables) is consumed through narrow interfaces with in-memory
//! default implementations.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::rc::Rc;
//! use skylight::{EventLoop, NavigableRegistry, Value, WindowConfig};
//!
//! fn main() -> skylight::Result<()> {
//!     let event_loop = Rc::new(EventLoop::new());
//!     let registry = NavigableRegistry::new(event_loop.clone(), WindowConfig::default());
//!     let window = registry.create_top_level("https://example.com/")?;
//!
//!     if let Some(popup) = window.open("about:blank", "_blank", "width=400")? {
//!         popup.post_message(&window, &Value::from("hello"), "*", &[])?;
//!     }
//!     event_loop.run_until_idle();
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Window** | [`window`] (open, messaging, idle, animation, events) |
//! | **Collaborators** | [`event_loop`], [`origin`], [`navigable`], [`runtime`] |
//! | **Support** | [`config`], [`error`](Error), [`prelude`] |
#![allow(clippy::new_without_default)]

pub mod config;
pub mod event_loop;
pub mod navigable;
pub mod origin;
pub mod prelude;
pub mod runtime;
pub mod window;

mod error;

pub use config::WindowConfig;
pub use error::{messages, Error, ErrorKind, Result};
pub use event_loop::{EventLoop, TaskSource};
pub use navigable::{Navigable, NavigableRegistry, WindowType};
pub use runtime::{ObjectKind, Value};
pub use window::Window;

/// Skylight version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
