//! URL resolution and origins
//!
//! The URL parser is consumed as a black box through [`UrlResolver`]; the
//! default implementation is backed by the `url` crate. Origins are the
//! `url` crate's [`Origin`], which already implements the same-origin
//! comparison (tuple origins by scheme/host/port, opaque origins by identity).

pub use url::{Origin, Url};

use crate::error::{messages, Error, Result};

/// The about:blank URL string
pub const ABOUT_BLANK: &str = "about:blank";

/// The URL parser contract
pub trait UrlResolver {
    /// Parse `input`, relative to `base` when one is given. `None` means failure.
    fn parse_url(&self, input: &str, base: Option<&Url>) -> Option<Url>;
}

/// WHATWG URL parsing via the `url` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardUrlResolver;

impl UrlResolver for StandardUrlResolver {
    fn parse_url(&self, input: &str, base: Option<&Url>) -> Option<Url> {
        match base {
            Some(base) => base.join(input).ok(),
            None => Url::parse(input).ok(),
        }
    }
}

/// The `about:blank` URL record
pub fn about_blank() -> Result<Url> {
    Url::parse(ABOUT_BLANK).map_err(|_| Error::syntax_error(messages::invalid_url(ABOUT_BLANK)))
}

/// Whether `url` matches about:blank: scheme "about", path "blank", no
/// credentials and no host. Query and fragment are ignored.
pub fn url_matches_about_blank(url: &Url) -> bool {
    url.scheme() == "about"
        && url.path() == "blank"
        && url.username().is_empty()
        && url.password().is_none()
        && url.host().is_none()
}

/// A fresh opaque origin, never same-origin with anything but itself
pub fn new_opaque_origin() -> Origin {
    Origin::new_opaque()
}

/// Same-origin comparison
pub fn is_same_origin(a: &Origin, b: &Origin) -> bool {
    a == b
}

/// ASCII serialization of an origin ("null" for opaque origins)
pub fn serialize_origin(origin: &Origin) -> String {
    origin.ascii_serialization()
}
