//! Request URI parsing and validation
//!
//! Each handler binary receives exactly one argument: the URI the desktop
//! shell asked it to open. The scheme is fixed per binary, so a mismatch is a
//! misconfigured invocation and is treated as a precondition violation rather
//! than recoverable user input. Everything else (path shape, `linkid`) is
//! validated here, before any engine call is made.

use std::collections::HashMap;
use std::fmt;
use strum::{Display, EnumString};
use thiserror::Error;
use url::Url;

/// URI schemes handled by this crate, one per binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Scheme {
    /// `appstream://<component-id>`
    #[strum(serialize = "appstream")]
    AppStream,
    /// `kns://<catalog>/<providerId>/<entryId>[?linkid=<int>]`
    Kns,
}

/// Errors raised while parsing or validating a request URI
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UriError {
    /// The argument is not a syntactically valid URI
    #[error("malformed URI {uri:?}: {source}")]
    Malformed {
        uri: String,
        source: url::ParseError,
    },

    /// The scheme is neither `appstream` nor `kns`
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// The URI carries no host token (catalog name / component id)
    #[error("wrongly formatted URI {0:?}: missing host")]
    MissingHost(String),

    /// The path does not split into the expected number of segments
    #[error("wrong format in the url path: expected {expected} segments, got {got}")]
    PathShape { expected: usize, got: usize },

    /// The `linkid` query parameter is present but not an integer
    #[error("linkid is not an integer: {0:?}")]
    BadLinkId(String),
}

impl From<UriError> for crate::error::HandlerError {
    fn from(err: UriError) -> Self {
        crate::error::HandlerError::uri(err.to_string())
    }
}

/// A parsed handler argument.
///
/// `host` carries the catalog/provider-config key for `kns` URIs and the
/// component id for `appstream` URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri {
    pub scheme: Scheme,
    pub host: String,
    pub segments: Vec<String>,
    pub query: HashMap<String, String>,
}

impl RequestUri {
    /// Parse the single command-line argument into a request URI.
    pub fn parse(raw: &str) -> Result<Self, UriError> {
        let url = Url::parse(raw).map_err(|source| UriError::Malformed {
            uri: raw.to_string(),
            source,
        })?;

        let scheme: Scheme = url
            .scheme()
            .parse()
            .map_err(|_| UriError::UnsupportedScheme(url.scheme().to_string()))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| UriError::MissingHost(raw.to_string()))?
            .to_string();

        let segments = url
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            scheme,
            host,
            segments,
            query,
        })
    }

    /// Abort if this URI does not carry the scheme the handler was built for.
    ///
    /// A mismatch means the desktop shell invoked the wrong binary; there is
    /// nothing sensible to recover to.
    pub fn assert_scheme(&self, expected: Scheme) {
        assert_eq!(
            self.scheme, expected,
            "handler invoked with {} URI, expected {}",
            self.scheme, expected
        );
    }
}

impl fmt::Display for RequestUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// A fully validated `kns://` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnsRequest {
    /// Catalog/provider-config key (the URI host)
    pub catalog: String,
    /// Provider the resolved entry must belong to
    pub provider_id: String,
    /// Entry to resolve and install
    pub entry_id: String,
    /// Download link to install, defaults to 1
    pub link_id: i32,
}

impl KnsRequest {
    /// Validate the path shape and optional `linkid` of a parsed `kns` URI.
    pub fn from_uri(uri: &RequestUri) -> Result<Self, UriError> {
        if uri.segments.len() != 2 {
            return Err(UriError::PathShape {
                expected: 2,
                got: uri.segments.len(),
            });
        }

        // Signed: engines accept any integer here and own its meaning.
        let link_id = match uri.query.get("linkid") {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| UriError::BadLinkId(raw.clone()))?,
            None => 1,
        };

        Ok(Self {
            catalog: uri.host.clone(),
            provider_id: uri.segments[0].clone(),
            entry_id: uri.segments[1].clone(),
            link_id,
        })
    }
}
