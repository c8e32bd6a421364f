//! The Window global
//!
//! A [`Window`] is the global object of one document. It owns the per-window
//! schedulers (idle callbacks, animation frames), its event listeners and its
//! error sink, and it reaches everything else (event loop, URL parser, clone
//! codec, navigable) through shared collaborators.
//!
//! Windows are always handled as `Rc<Window>`: queued tasks and opener links
//! keep references to them.

mod animation;
mod events;
pub mod features;
mod idle;
mod messaging;
mod open;
pub mod popup;

pub use animation::{AnimationFrameCallbackDriver, FrameRequestCallback};
pub use events::{event_types, EventListener, ListenerId, MessageEvent};
pub use features::{tokenize_features, FeatureMap};
pub use idle::{IdleDeadline, IdleRequestCallback, IdleRequestOptions, IdleScheduler};
pub use messaging::{TargetOrigin, WindowPostMessageOptions};
pub use popup::{check_if_a_popup_window_is_requested, parse_boolean_feature, PopupDecision};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::config::WindowConfig;
use crate::error::{Error, Result};
use crate::event_loop::EventLoop;
use crate::navigable::Navigable;
use crate::origin::{self, Origin, StandardUrlResolver, Url, UrlResolver};
use crate::runtime::{CloneCodec, CloneOptions, StructuredCloneCodec};

use events::RegisteredListener;

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

/// A browsing-context global
pub struct Window {
    id: u64,
    config: WindowConfig,
    event_loop: Rc<EventLoop>,
    url_resolver: Rc<dyn UrlResolver>,
    codec: Rc<dyn CloneCodec>,
    document_url: RefCell<Url>,
    origin: RefCell<Origin>,
    navigable: RefCell<Option<Weak<dyn Navigable>>>,
    opener: RefCell<Option<Weak<Window>>>,
    status: RefCell<String>,
    last_activation_timestamp: Cell<Option<f64>>,
    listeners: RefCell<Vec<RegisteredListener>>,
    next_listener_id: Cell<u64>,
    idle_callbacks: RefCell<IdleScheduler>,
    animation_frames: RefCell<AnimationFrameCallbackDriver>,
    reported_exceptions: RefCell<Vec<String>>,
}

/// Builder for [`Window`]
pub struct WindowBuilder {
    event_loop: Rc<EventLoop>,
    config: WindowConfig,
    url: Option<Url>,
    origin: Option<Origin>,
    url_resolver: Option<Rc<dyn UrlResolver>>,
    codec: Option<Rc<dyn CloneCodec>>,
}

impl WindowBuilder {
    /// Per-window settings. The scheduling fields (`max_idle_period_ms`,
    /// `max_tasks_per_drain`) belong to the shared event loop and are taken
    /// from the config it was created with, not from this one.
    pub fn config(mut self, config: WindowConfig) -> Self {
        self.config = config;
        self
    }

    /// Document URL (defaults to about:blank)
    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Document origin (defaults to the URL's origin)
    pub fn origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn url_resolver(mut self, resolver: Rc<dyn UrlResolver>) -> Self {
        self.url_resolver = Some(resolver);
        self
    }

    pub fn codec(mut self, codec: Rc<dyn CloneCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn build(self) -> Result<Rc<Window>> {
        let url = match self.url {
            Some(url) => url,
            None => origin::about_blank()?,
        };
        let origin = self.origin.unwrap_or_else(|| url.origin());
        let url_resolver: Rc<dyn UrlResolver> = match self.url_resolver {
            Some(resolver) => resolver,
            None => Rc::new(StandardUrlResolver),
        };
        let codec: Rc<dyn CloneCodec> = match self.codec {
            Some(codec) => codec,
            None => Rc::new(StructuredCloneCodec::new(CloneOptions {
                max_depth: self.config.clone_max_depth,
            })),
        };

        Ok(Rc::new(Window {
            id: NEXT_WINDOW_ID.fetch_add(1, Ordering::Relaxed),
            config: self.config,
            event_loop: self.event_loop,
            url_resolver,
            codec,
            document_url: RefCell::new(url),
            origin: RefCell::new(origin),
            navigable: RefCell::new(None),
            opener: RefCell::new(None),
            status: RefCell::new(String::new()),
            last_activation_timestamp: Cell::new(None),
            listeners: RefCell::new(Vec::new()),
            next_listener_id: Cell::new(1),
            idle_callbacks: RefCell::new(IdleScheduler::new()),
            animation_frames: RefCell::new(AnimationFrameCallbackDriver::new()),
            reported_exceptions: RefCell::new(Vec::new()),
        }))
    }
}

impl Window {
    pub fn builder(event_loop: Rc<EventLoop>) -> WindowBuilder {
        WindowBuilder {
            event_loop,
            config: WindowConfig::default(),
            url: None,
            origin: None,
            url_resolver: None,
            codec: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    pub fn document_url(&self) -> Url {
        self.document_url.borrow().clone()
    }

    /// Origin of the active document
    pub fn origin(&self) -> Origin {
        self.origin.borrow().clone()
    }

    /// Replace the active document's URL. A non-about:blank URL also
    /// replaces the origin.
    pub fn set_document_url(&self, url: Url) {
        if !origin::url_matches_about_blank(&url) {
            *self.origin.borrow_mut() = url.origin();
        }
        *self.document_url.borrow_mut() = url;
    }

    pub fn navigable(&self) -> Option<Rc<dyn Navigable>> {
        self.navigable.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_navigable(&self, navigable: &Rc<dyn Navigable>) {
        *self.navigable.borrow_mut() = Some(Rc::downgrade(navigable));
    }

    /// The window that opened this one, if it is still alive
    pub fn opener(&self) -> Option<Rc<Window>> {
        self.opener.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_opener(&self, opener: Option<&Rc<Window>>) {
        *self.opener.borrow_mut() = opener.map(Rc::downgrade);
    }

    /// The navigable's target name, or "" without a navigable
    pub fn name(&self) -> String {
        self.navigable()
            .map(|navigable| navigable.target_name())
            .unwrap_or_default()
    }

    pub fn set_name(&self, name: &str) {
        if let Some(navigable) = self.navigable() {
            navigable.set_target_name(name);
        }
    }

    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn set_status(&self, status: &str) {
        *self.status.borrow_mut() = status.to_string();
    }

    /// Record a user activation at the current time
    pub fn notify_activation(&self) {
        self.last_activation_timestamp
            .set(Some(self.event_loop.current_time()));
    }

    /// Whether a user activation happened within the transient activation duration
    pub fn has_transient_activation(&self) -> bool {
        let Some(last) = self.last_activation_timestamp.get() else {
            return false;
        };
        let now = self.event_loop.current_time();
        last <= now && now < last + self.config.transient_activation_duration_ms
    }

    /// Names of the optional debugging interfaces this window exposes
    pub fn exposed_interfaces(&self) -> Vec<&'static str> {
        let mut interfaces = Vec::new();
        if self.config.expose_inspector {
            interfaces.push("inspector");
        }
        if self.config.expose_internals {
            interfaces.push("internals");
        }
        interfaces
    }

    /// Report an uncaught callback error to the window's error sink
    pub fn report_exception(&self, error: &Error) {
        warn!(target: "skylight::window", window = self.id, %error, "uncaught exception");
        self.reported_exceptions.borrow_mut().push(error.to_string());
    }

    /// Every error reported so far, oldest first
    pub fn reported_exceptions(&self) -> Vec<String> {
        self.reported_exceptions.borrow().clone()
    }

    pub(crate) fn url_resolver(&self) -> &Rc<dyn UrlResolver> {
        &self.url_resolver
    }

    pub(crate) fn codec(&self) -> &Rc<dyn CloneCodec> {
        &self.codec
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.id)
            .field("url", &self.document_url.borrow().as_str())
            .field("origin", &self.origin.borrow().ascii_serialization())
            .finish_non_exhaustive()
    }
}
