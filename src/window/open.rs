//! `window.open`

use std::rc::Rc;

use tracing::debug;

use super::features::tokenize_features;
use super::popup::{check_if_a_popup_window_is_requested, parse_boolean_feature};
use super::Window;
use crate::error::{messages, Error, Result};
use crate::navigable::{NavigateParams, ReferrerPolicy, WindowType};
use crate::origin::{self, Url};

impl Window {
    /// Open `url` in the navigable named `target`.
    ///
    /// Returns the target's window, or `None` when nothing was opened or the
    /// result must not be exposed to the caller (noopener). Fails with a
    /// SyntaxError if `url` cannot be resolved, and with a navigation error
    /// if the navigable refuses to start navigating.
    pub fn open(
        self: &Rc<Self>,
        url: &str,
        target: &str,
        features: &str,
    ) -> Result<Option<Rc<Window>>> {
        if self.event_loop().termination_nesting_level() != 0 {
            debug!(target: "skylight::open", window = self.id(), "open during termination");
            return Ok(None);
        }

        let target = if target.is_empty() { "_blank" } else { target };

        let mut features = tokenize_features(features);
        let mut no_opener = features
            .remove("noopener")
            .is_some_and(|value| parse_boolean_feature(&value));
        let no_referrer = features
            .remove("noreferrer")
            .is_some_and(|value| parse_boolean_feature(&value));

        let mut referrer_policy = ReferrerPolicy::EmptyString;
        if no_referrer {
            no_opener = true;
            referrer_policy = ReferrerPolicy::NoReferrer;
        }

        let Some(source) = self.navigable() else {
            debug!(target: "skylight::open", window = self.id(), "window has no navigable");
            return Ok(None);
        };

        let chosen = source.choose_a_navigable(target, no_opener);
        let Some(target_navigable) = chosen.navigable else {
            debug!(target: "skylight::open", target_name = target, "no navigable chosen");
            return Ok(None);
        };

        match chosen.window_type {
            WindowType::NewUnrestricted | WindowType::NewNoOpener => {
                target_navigable.set_is_popup(check_if_a_popup_window_is_requested(&features));

                let url_record = if url.is_empty() {
                    origin::about_blank()?
                } else {
                    self.resolve_url(url)?
                };

                if origin::url_matches_about_blank(&url_record) {
                    target_navigable.perform_url_and_history_update(&url_record);
                } else {
                    target_navigable.navigate(self.navigate_params(url_record, referrer_policy))?;
                }
            }
            WindowType::ExistingTarget => {
                if !url.is_empty() {
                    let url_record = self.resolve_url(url)?;
                    target_navigable.navigate(self.navigate_params(url_record, referrer_policy))?;
                }
                if !no_opener {
                    target_navigable.set_opener(self);
                }
            }
        }

        debug!(
            target: "skylight::open",
            window = self.id(),
            target_name = target,
            window_type = ?chosen.window_type,
            no_opener,
            "opened"
        );

        if no_opener || chosen.window_type == WindowType::NewNoOpener {
            return Ok(None);
        }
        Ok(target_navigable.active_window())
    }

    fn resolve_url(&self, url: &str) -> Result<Url> {
        let base = self.document_url();
        self.url_resolver()
            .parse_url(url, Some(&base))
            .ok_or_else(|| Error::syntax_error(messages::invalid_url(url)))
    }

    fn navigate_params(&self, url: Url, referrer_policy: ReferrerPolicy) -> NavigateParams {
        let referrer = match referrer_policy {
            ReferrerPolicy::NoReferrer => None,
            ReferrerPolicy::EmptyString => Some(self.document_url()),
        };
        NavigateParams {
            url,
            initiator_origin: self.origin(),
            referrer,
            referrer_policy,
        }
    }
}
