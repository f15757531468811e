//! Input origins: where a filter field reads its raw value from.
//!
//! An origin is written `"source:path"` or just `"source"`, in which case the
//! path defaults to the field name. Keyed sources (`data`, `post`, `query`,
//! `cookie`, `header`, `file`, `server`, `attribute`) use the dotted path to
//! pick a value out of a bag; scalar sources (`uri`, `path`, `method`,
//! `isSecure`, `isAjax`, `isJsonExpected`, `remoteAddress`) describe the
//! request itself and ignore the path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Input source keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "data")]
    Data,
    #[serde(rename = "post")]
    Post,
    #[serde(rename = "query")]
    Query,
    #[serde(rename = "cookie")]
    Cookie,
    #[serde(rename = "header")]
    Header,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "attribute")]
    Attribute,
    #[serde(rename = "uri")]
    Uri,
    #[serde(rename = "path")]
    Path,
    #[serde(rename = "method")]
    Method,
    #[serde(rename = "isSecure")]
    IsSecure,
    #[serde(rename = "isAjax")]
    IsAjax,
    #[serde(rename = "isJsonExpected")]
    IsJsonExpected,
    #[serde(rename = "remoteAddress")]
    RemoteAddress,
}

impl Source {
    /// Every recognized keyword, in declaration order.
    pub const ALL: [Source; 15] = [
        Source::Data,
        Source::Post,
        Source::Query,
        Source::Cookie,
        Source::Header,
        Source::File,
        Source::Server,
        Source::Attribute,
        Source::Uri,
        Source::Path,
        Source::Method,
        Source::IsSecure,
        Source::IsAjax,
        Source::IsJsonExpected,
        Source::RemoteAddress,
    ];

    /// The keyword as written in schema declarations.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Post => "post",
            Self::Query => "query",
            Self::Cookie => "cookie",
            Self::Header => "header",
            Self::File => "file",
            Self::Server => "server",
            Self::Attribute => "attribute",
            Self::Uri => "uri",
            Self::Path => "path",
            Self::Method => "method",
            Self::IsSecure => "isSecure",
            Self::IsAjax => "isAjax",
            Self::IsJsonExpected => "isJsonExpected",
            Self::RemoteAddress => "remoteAddress",
        }
    }

    /// Whether this source is a bag addressed by a dotted path.
    #[must_use]
    pub fn is_keyed(self) -> bool {
        matches!(
            self,
            Self::Data
                | Self::Post
                | Self::Query
                | Self::Cookie
                | Self::Header
                | Self::File
                | Self::Server
                | Self::Attribute
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a recognized source keyword.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown input source: {0}")]
pub struct UnknownSource(pub String);

impl FromStr for Source {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// Resolved origin of a field: a source keyword plus a dotted path.
///
/// For scalar sources the path is kept (it defaults to the field name) but
/// never used for lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    /// Source keyword.
    pub source: Source,
    /// Dotted path inside the source bag.
    pub path: String,
}

impl Origin {
    /// Creates an origin from its parts.
    #[must_use]
    pub fn new(source: Source, path: impl Into<String>) -> Self {
        Self {
            source,
            path: path.into(),
        }
    }

    /// Public path used as the error key for this origin.
    ///
    /// Keyed sources expose their dotted path; scalar sources (and an empty
    /// root path) fall back to the field name.
    #[must_use]
    pub fn public_path<'a>(&'a self, field: &'a str) -> &'a str {
        if self.source.is_keyed() && !self.path.is_empty() {
            &self.path
        } else {
            field
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.path)
    }
}

/// Checks that a dotted path has no empty segments.
pub(crate) fn is_well_formed_path(path: &str) -> bool {
    !path.is_empty() && path.split('.').all(|segment| !segment.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_round_trips() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>(), Ok(source));
        }
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        assert_eq!(
            "pots".parse::<Source>(),
            Err(UnknownSource("pots".to_string()))
        );
        // keywords are case-sensitive
        assert!("issecure".parse::<Source>().is_err());
    }

    #[test]
    fn keyed_and_scalar_sources() {
        assert!(Source::File.is_keyed());
        assert!(Source::Attribute.is_keyed());
        assert!(!Source::Method.is_keyed());
        assert!(!Source::RemoteAddress.is_keyed());
    }

    #[test]
    fn public_path_strips_source() {
        let origin = Origin::new(Source::File, "images.preview");
        assert_eq!(origin.public_path("preview"), "images.preview");
        let origin = Origin::new(Source::Method, "verb");
        assert_eq!(origin.public_path("verb"), "verb");
        assert_eq!(origin.to_string(), "method:verb");
    }

    #[test]
    fn path_shape() {
        assert!(is_well_formed_path("a.b"));
        assert!(!is_well_formed_path(""));
        assert!(!is_well_formed_path("a..b"));
        assert!(!is_well_formed_path(".a"));
    }
}
