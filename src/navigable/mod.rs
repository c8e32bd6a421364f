//! Navigables
//!
//! A navigable is a browsing target (tab, popup) hosting one active window.
//! The window core only consumes navigables through the [`Navigable`] trait;
//! [`NavigableRegistry`] is an in-memory set of top-level navigables that
//! implements the rules for choosing a navigable and commits navigations
//! asynchronously on the shared event loop.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::config::WindowConfig;
use crate::error::{Error, Result};
use crate::event_loop::{EventLoop, TaskSource};
use crate::origin::{self, Origin, StandardUrlResolver, Url, UrlResolver};
use crate::runtime::{CloneCodec, CloneOptions, StructuredCloneCodec};
use crate::window::{PopupDecision, Window};

/// How a navigable was obtained by [`Navigable::choose_a_navigable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// An existing navigable was reused (or none was found)
    ExistingTarget,
    /// A new navigable with an opener relationship
    NewUnrestricted,
    /// A new navigable without an opener relationship
    NewNoOpener,
}

/// Referrer policy used for a navigation started by `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferrerPolicy {
    /// No explicit policy
    #[default]
    EmptyString,
    /// "no-referrer"
    NoReferrer,
}

impl ReferrerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferrerPolicy::EmptyString => "",
            ReferrerPolicy::NoReferrer => "no-referrer",
        }
    }
}

/// A navigation request
#[derive(Debug, Clone)]
pub struct NavigateParams {
    /// Destination URL
    pub url: Url,
    /// Origin of the window that started the navigation
    pub initiator_origin: Origin,
    /// Referrer sent with the request, `None` under "no-referrer"
    pub referrer: Option<Url>,
    /// Policy the referrer was computed with
    pub referrer_policy: ReferrerPolicy,
}

/// Outcome of choosing a navigable
#[derive(Clone)]
pub struct ChosenNavigable {
    pub navigable: Option<Rc<dyn Navigable>>,
    pub window_type: WindowType,
}

impl ChosenNavigable {
    /// No navigable could be chosen
    pub fn none() -> Self {
        Self {
            navigable: None,
            window_type: WindowType::ExistingTarget,
        }
    }
}

impl fmt::Debug for ChosenNavigable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChosenNavigable")
            .field("navigable", &self.navigable.as_ref().map(|n| n.target_name()))
            .field("window_type", &self.window_type)
            .finish()
    }
}

/// A browsing target that hosts a window and can be navigated
pub trait Navigable {
    /// The navigable's target name ("" if unnamed)
    fn target_name(&self) -> String;

    fn set_target_name(&self, name: &str);

    fn is_popup(&self) -> PopupDecision;

    fn set_is_popup(&self, popup: PopupDecision);

    /// The window of the active document
    fn active_window(&self) -> Option<Rc<Window>>;

    /// Map `name` to a navigable, using `self` as the source navigable
    fn choose_a_navigable(&self, name: &str, no_opener: bool) -> ChosenNavigable;

    /// Start a navigation. Loading happens later; only a refusal to start is
    /// reported here.
    fn navigate(&self, params: NavigateParams) -> Result<()>;

    /// Replace the active document's URL without a real navigation
    fn perform_url_and_history_update(&self, url: &Url);

    /// Make `opener` the opener of the active window
    fn set_opener(&self, opener: &Rc<Window>) {
        if let Some(window) = self.active_window() {
            window.set_opener(Some(opener));
        }
    }
}

/// A top-level navigable owned by a [`NavigableRegistry`]
pub struct TopLevelNavigable {
    id: u64,
    registry: Weak<NavigableRegistry>,
    self_ref: Weak<TopLevelNavigable>,
    target_name: RefCell<String>,
    is_popup: Cell<PopupDecision>,
    active_window: RefCell<Option<Rc<Window>>>,
    navigations: RefCell<Vec<NavigateParams>>,
    history: RefCell<Vec<Url>>,
}

impl TopLevelNavigable {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Every navigation started on this navigable, oldest first
    pub fn navigations(&self) -> Vec<NavigateParams> {
        self.navigations.borrow().clone()
    }

    /// URLs committed to the session history, oldest first
    pub fn history(&self) -> Vec<Url> {
        self.history.borrow().clone()
    }

    /// URL of the active document
    pub fn current_url(&self) -> Option<Url> {
        self.active_window().map(|w| w.document_url())
    }

    fn commit(&self, url: &Url) {
        if let Some(window) = self.active_window() {
            window.set_document_url(url.clone());
        }
        self.history.borrow_mut().push(url.clone());
    }
}

impl Navigable for TopLevelNavigable {
    fn target_name(&self) -> String {
        self.target_name.borrow().clone()
    }

    fn set_target_name(&self, name: &str) {
        *self.target_name.borrow_mut() = name.to_string();
    }

    fn is_popup(&self) -> PopupDecision {
        self.is_popup.get()
    }

    fn set_is_popup(&self, popup: PopupDecision) {
        self.is_popup.set(popup);
    }

    fn active_window(&self) -> Option<Rc<Window>> {
        self.active_window.borrow().clone()
    }

    fn choose_a_navigable(&self, name: &str, no_opener: bool) -> ChosenNavigable {
        let current = self
            .self_ref
            .upgrade()
            .map(|n| n as Rc<dyn Navigable>);

        let keyword = name.to_ascii_lowercase();
        if name.is_empty() || matches!(keyword.as_str(), "_self" | "_parent" | "_top") {
            return ChosenNavigable {
                navigable: current,
                window_type: WindowType::ExistingTarget,
            };
        }

        let Some(registry) = self.registry.upgrade() else {
            return ChosenNavigable::none();
        };

        if keyword != "_blank" {
            if let Some(existing) = registry.find(name) {
                return ChosenNavigable {
                    navigable: Some(existing as Rc<dyn Navigable>),
                    window_type: WindowType::ExistingTarget,
                };
            }
        }

        if !registry.popups_allowed() {
            debug!(target: "skylight::open", name, "popup blocked");
            return ChosenNavigable::none();
        }

        let (window_type, origin) = if no_opener {
            (WindowType::NewNoOpener, origin::new_opaque_origin())
        } else {
            let origin = self
                .active_window()
                .map(|w| w.origin())
                .unwrap_or_else(origin::new_opaque_origin);
            (WindowType::NewUnrestricted, origin)
        };
        let new_name = if keyword == "_blank" { "" } else { name };

        match registry.create_navigable(new_name, origin) {
            Ok(navigable) => {
                if window_type == WindowType::NewUnrestricted {
                    if let Some(opener) = self.active_window() {
                        navigable.set_opener(&opener);
                    }
                }
                ChosenNavigable {
                    navigable: Some(navigable as Rc<dyn Navigable>),
                    window_type,
                }
            }
            Err(e) => {
                warn!(target: "skylight::open", error = %e, "failed to create navigable");
                ChosenNavigable::none()
            }
        }
    }

    fn navigate(&self, params: NavigateParams) -> Result<()> {
        if params.url.scheme() == "javascript" {
            return Err(Error::Navigation(format!(
                "Refusing to navigate to '{}'",
                params.url
            )));
        }
        let Some(registry) = self.registry.upgrade() else {
            return Err(Error::Navigation("Navigable has been discarded".to_string()));
        };

        debug!(
            target: "skylight::open",
            navigable = self.id,
            url = %params.url,
            referrer_policy = params.referrer_policy.as_str(),
            "navigation started"
        );
        let url = params.url.clone();
        self.navigations.borrow_mut().push(params);

        let this = self.self_ref.clone();
        registry.event_loop.queue_task(TaskSource::Navigation, move || {
            if let Some(navigable) = this.upgrade() {
                navigable.commit(&url);
            }
        });
        Ok(())
    }

    fn perform_url_and_history_update(&self, url: &Url) {
        self.commit(url);
    }
}

impl fmt::Debug for TopLevelNavigable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopLevelNavigable")
            .field("id", &self.id)
            .field("target_name", &self.target_name.borrow())
            .field("is_popup", &self.is_popup.get())
            .finish_non_exhaustive()
    }
}

/// The set of top-level navigables sharing one event loop
pub struct NavigableRegistry {
    event_loop: Rc<EventLoop>,
    config: WindowConfig,
    url_resolver: Rc<dyn UrlResolver>,
    codec: Rc<dyn CloneCodec>,
    navigables: RefCell<Vec<Rc<TopLevelNavigable>>>,
    popups_allowed: Cell<bool>,
    next_id: Cell<u64>,
    self_ref: Weak<NavigableRegistry>,
}

impl NavigableRegistry {
    /// Create a registry whose windows use the default URL parser and codec
    pub fn new(event_loop: Rc<EventLoop>, config: WindowConfig) -> Rc<Self> {
        let codec = StructuredCloneCodec::new(CloneOptions {
            max_depth: config.clone_max_depth,
        });
        Self::with_collaborators(event_loop, config, Rc::new(StandardUrlResolver), Rc::new(codec))
    }

    pub fn with_collaborators(
        event_loop: Rc<EventLoop>,
        config: WindowConfig,
        url_resolver: Rc<dyn UrlResolver>,
        codec: Rc<dyn CloneCodec>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            event_loop,
            config,
            url_resolver,
            codec,
            navigables: RefCell::new(Vec::new()),
            popups_allowed: Cell::new(true),
            next_id: Cell::new(1),
            self_ref: self_ref.clone(),
        })
    }

    pub fn event_loop(&self) -> &Rc<EventLoop> {
        &self.event_loop
    }

    /// Open a top-level navigable showing `url` and return its window
    pub fn create_top_level(&self, url: &str) -> Result<Rc<Window>> {
        let url = self
            .url_resolver
            .parse_url(url, None)
            .ok_or_else(|| Error::syntax_error(crate::error::messages::invalid_url(url)))?;
        let origin = url.origin();
        let navigable = self.create_navigable_at("", url, origin)?;
        navigable
            .active_window()
            .ok_or_else(|| Error::Navigation("Navigable has no active window".to_string()))
    }

    /// Allow or block the creation of new navigables by `open`
    pub fn set_popups_allowed(&self, allowed: bool) {
        self.popups_allowed.set(allowed);
    }

    pub fn popups_allowed(&self) -> bool {
        self.popups_allowed.get()
    }

    /// Find a navigable by target name
    pub fn find(&self, name: &str) -> Option<Rc<TopLevelNavigable>> {
        self.navigables
            .borrow()
            .iter()
            .find(|n| *n.target_name.borrow() == name)
            .cloned()
    }

    pub fn navigables(&self) -> Vec<Rc<TopLevelNavigable>> {
        self.navigables.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.navigables.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.navigables.borrow().is_empty()
    }

    fn create_navigable(&self, name: &str, origin: Origin) -> Result<Rc<TopLevelNavigable>> {
        self.create_navigable_at(name, origin::about_blank()?, origin)
    }

    fn create_navigable_at(
        &self,
        name: &str,
        url: Url,
        origin: Origin,
    ) -> Result<Rc<TopLevelNavigable>> {
        let window = Window::builder(self.event_loop.clone())
            .config(self.config.clone())
            .url(url)
            .origin(origin)
            .url_resolver(self.url_resolver.clone())
            .codec(self.codec.clone())
            .build()?;

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let navigable = Rc::new_cyclic(|self_ref| TopLevelNavigable {
            id,
            registry: self.self_ref.clone(),
            self_ref: self_ref.clone(),
            target_name: RefCell::new(name.to_string()),
            is_popup: Cell::new(PopupDecision::Tab),
            active_window: RefCell::new(Some(window.clone())),
            navigations: RefCell::new(Vec::new()),
            history: RefCell::new(vec![window.document_url()]),
        });
        let as_dyn: Rc<dyn Navigable> = navigable.clone();
        window.set_navigable(&as_dyn);

        self.navigables.borrow_mut().push(navigable.clone());
        debug!(target: "skylight::open", navigable = id, name, "created navigable");
        Ok(navigable)
    }
}

impl fmt::Debug for NavigableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigableRegistry")
            .field("navigables", &self.navigables.borrow().len())
            .field("popups_allowed", &self.popups_allowed.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Rc<NavigableRegistry> {
        NavigableRegistry::new(Rc::new(EventLoop::new()), WindowConfig::default())
    }

    fn navigable_of(window: &Rc<Window>) -> Rc<dyn Navigable> {
        window.navigable().unwrap()
    }

    #[test]
    fn test_create_top_level() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(window.origin().ascii_serialization(), "https://example.com");
        assert_eq!(navigable_of(&window).target_name(), "");
    }

    #[test]
    fn test_create_top_level_rejects_bad_url() {
        let registry = registry();
        assert!(registry.create_top_level("not a url").unwrap_err().is_syntax_error());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_choose_self_keywords() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let source = navigable_of(&window);
        for name in ["", "_self", "_parent", "_TOP"] {
            let chosen = source.choose_a_navigable(name, false);
            assert_eq!(chosen.window_type, WindowType::ExistingTarget);
            let chosen_window = chosen.navigable.unwrap().active_window().unwrap();
            assert!(Rc::ptr_eq(&chosen_window, &window));
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_choose_blank_creates_new() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let chosen = navigable_of(&window).choose_a_navigable("_blank", false);
        assert_eq!(chosen.window_type, WindowType::NewUnrestricted);
        let new_window = chosen.navigable.unwrap().active_window().unwrap();
        assert_eq!(new_window.origin(), window.origin());
        assert_eq!(new_window.opener().unwrap().id(), window.id());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_choose_named_reuses() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let source = navigable_of(&window);

        let first = source.choose_a_navigable("results", false);
        assert_eq!(first.window_type, WindowType::NewUnrestricted);
        assert_eq!(first.navigable.as_ref().unwrap().target_name(), "results");

        let second = source.choose_a_navigable("results", false);
        assert_eq!(second.window_type, WindowType::ExistingTarget);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_choose_noopener_gets_opaque_origin() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let chosen = navigable_of(&window).choose_a_navigable("_blank", true);
        assert_eq!(chosen.window_type, WindowType::NewNoOpener);
        let new_window = chosen.navigable.unwrap().active_window().unwrap();
        assert_ne!(new_window.origin(), window.origin());
        assert!(new_window.opener().is_none());
    }

    #[test]
    fn test_popup_blocker() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        registry.set_popups_allowed(false);
        let chosen = navigable_of(&window).choose_a_navigable("_blank", false);
        assert!(chosen.navigable.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_navigation_commits_in_a_task() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let navigable = navigable_of(&window);
        let url = Url::parse("https://other.example/page").unwrap();

        navigable
            .navigate(NavigateParams {
                url: url.clone(),
                initiator_origin: window.origin(),
                referrer: None,
                referrer_policy: ReferrerPolicy::NoReferrer,
            })
            .unwrap();
        assert_eq!(window.document_url().as_str(), "https://example.com/");
        assert_eq!(registry.event_loop().pending_sources(), vec![TaskSource::Navigation]);

        registry.event_loop().run_until_idle();
        assert_eq!(window.document_url(), url);
        assert_eq!(window.origin().ascii_serialization(), "https://other.example");
    }

    #[test]
    fn test_javascript_navigation_refused() {
        let registry = registry();
        let window = registry.create_top_level("https://example.com/").unwrap();
        let err = navigable_of(&window)
            .navigate(NavigateParams {
                url: Url::parse("javascript:alert(1)").unwrap(),
                initiator_origin: window.origin(),
                referrer: None,
                referrer_policy: ReferrerPolicy::EmptyString,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
        assert!(!registry.event_loop().has_pending_tasks());
    }

    #[test]
    fn test_referrer_policy_strings() {
        assert_eq!(ReferrerPolicy::default().as_str(), "");
        assert_eq!(ReferrerPolicy::NoReferrer.as_str(), "no-referrer");
    }
}
