//! Integration tests for `window.open`

mod common;

use std::rc::Rc;

use common::Session;
use skylight::navigable::ReferrerPolicy;
use skylight::window::PopupDecision;
use skylight::{Error, TaskSource};

mod targets {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_target_means_blank() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let first = window.open("", "", "").unwrap().unwrap();
        let second = window.open("", "", "").unwrap().unwrap();

        assert_eq!(session.registry.len(), 3);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.name(), "");
    }

    #[test]
    fn test_named_target_is_reused() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let first = window.open("", "results", "").unwrap().unwrap();
        let second = window.open("", "results", "").unwrap().unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "results");
        assert_eq!(session.registry.len(), 2);
    }

    #[test]
    fn test_self_navigates_the_caller() {
        let session = Session::new();
        let window = session.window("https://example.com/start");

        let same = window.open("/next", "_self", "").unwrap().unwrap();
        assert!(Rc::ptr_eq(&same, &window));

        session.run();
        assert_eq!(window.document_url().as_str(), "https://example.com/next");
    }

    #[test]
    fn test_renamed_window_can_be_targeted() {
        let session = Session::new();
        let window = session.window("https://example.com/");
        let other = session.window("https://example.com/other");
        other.set_name("sidebar");

        let found = window.open("", "sidebar", "").unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &other));
    }

    #[test]
    fn test_popup_blocked_returns_none() {
        let session = Session::new();
        let window = session.window("https://example.com/");
        session.registry.set_popups_allowed(false);

        assert!(window.open("https://example.com/ad", "_blank", "").unwrap().is_none());
        assert_eq!(session.registry.len(), 1);
    }
}

mod urls {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_url_is_about_blank_without_navigation() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let popup = window.open("", "_blank", "").unwrap().unwrap();
        assert_eq!(popup.document_url().as_str(), "about:blank");
        assert_eq!(popup.origin(), window.origin());
        assert!(!session
            .event_loop
            .pending_sources()
            .contains(&TaskSource::Navigation));
    }

    #[test]
    fn test_url_resolved_against_caller() {
        let session = Session::new();
        let window = session.window("https://example.com/a/b.html");

        let popup = window.open("../c.html?x=1", "_blank", "").unwrap().unwrap();
        assert_eq!(popup.document_url().as_str(), "about:blank");

        session.run();
        assert_eq!(popup.document_url().as_str(), "https://example.com/c.html?x=1");
    }

    #[test]
    fn test_invalid_url_is_syntax_error() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let err = window.open("http://exa mple.com", "_blank", "").unwrap_err();
        assert!(err.is_syntax_error());
        assert_eq!(
            err.to_string(),
            "SyntaxError: URL is not valid: 'http://exa mple.com'"
        );
    }

    #[test]
    fn test_invalid_url_on_existing_target_is_syntax_error() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let err = window.open("http://[::1", "_self", "").unwrap_err();
        assert!(err.is_syntax_error());
        assert!(!session.event_loop.has_pending_tasks());
    }

    #[test]
    fn test_refused_navigation_propagates() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let err = window.open("javascript:void(0)", "_self", "").unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
    }
}

mod features {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_popup_decision_recorded_on_navigable() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        let popup = window.open("", "_blank", "popup").unwrap().unwrap();
        let tab = window
            .open(
                "",
                "_blank",
                "location,toolbar,menubar,resizable,scrollbars,status",
            )
            .unwrap()
            .unwrap();

        assert_eq!(popup.navigable().unwrap().is_popup(), PopupDecision::Popup);
        assert_eq!(tab.navigable().unwrap().is_popup(), PopupDecision::Tab);
    }

    #[test]
    fn test_noopener_hides_the_new_window() {
        let session = Session::new();
        let window = session.window("https://example.com/");

        assert!(window.open("", "named", "noopener").unwrap().is_none());
        let created = session.registry.find("named").unwrap();
        let created_window = skylight::Navigable::active_window(&*created).unwrap();

        assert!(created_window.opener().is_none());
        assert_ne!(created_window.origin(), window.origin());
    }

    #[test]
    fn test_noreferrer_strips_referrer() {
        let session = Session::new();
        let window = session.window("https://example.com/page");

        assert!(window
            .open("https://example.org/", "_blank", "noreferrer=1")
            .unwrap()
            .is_none());
        let created = session.registry.navigables().pop().unwrap();
        let navigation = created.navigations().pop().unwrap();
        assert_eq!(navigation.referrer_policy, ReferrerPolicy::NoReferrer);
        assert_eq!(navigation.referrer, None);
    }

    #[test]
    fn test_referrer_sent_by_default() {
        let session = Session::new();
        let window = session.window("https://example.com/page");

        window.open("https://example.org/", "_blank", "").unwrap().unwrap();
        let created = session.registry.navigables().pop().unwrap();
        let navigation = created.navigations().pop().unwrap();
        assert_eq!(navigation.referrer_policy, ReferrerPolicy::EmptyString);
        assert_eq!(
            navigation.referrer.map(|u| u.to_string()),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(navigation.initiator_origin, window.origin());
    }

    #[test]
    fn test_existing_target_gets_opener() {
        let session = Session::new();
        let window = session.window("https://example.com/");
        let other = session.window("https://example.com/other");
        other.set_name("reused");

        window.open("", "reused", "").unwrap().unwrap();
        assert_eq!(other.opener().unwrap().id(), window.id());
    }

    #[test]
    fn test_existing_target_with_noopener_keeps_opener_unset() {
        let session = Session::new();
        let window = session.window("https://example.com/");
        let other = session.window("https://example.com/other");
        other.set_name("reused");

        assert!(window.open("", "reused", "noopener").unwrap().is_none());
        assert!(other.opener().is_none());
    }
}

mod termination {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_open_during_termination_returns_none() {
        let session = Session::new();
        let window = session.window("https://example.com/");
        session.event_loop.increment_termination_nesting_level();

        for (url, target, features) in [
            ("", "", ""),
            ("https://example.org/", "_blank", "popup"),
            ("http://[bad", "_self", ""),
        ] {
            assert!(window.open(url, target, features).unwrap().is_none());
        }
        assert_eq!(session.registry.len(), 1);
        assert!(!session.event_loop.has_pending_tasks());

        session.event_loop.decrement_termination_nesting_level();
        assert!(window.open("", "", "").unwrap().is_some());
    }
}
