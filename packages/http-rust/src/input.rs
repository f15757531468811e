//! Request input sources backed by an HTTP request.
//!
//! [`RequestInput`] splits a request into the bags filters read from:
//!
//! | source | contents |
//! |---|---|
//! | `query` | query string, bracket keys (`a[b]`, `a[]`) nest |
//! | `post` | JSON or form body |
//! | `data` | `query` merged with `post`; body values win |
//! | `header` | headers by lowercase name |
//! | `cookie` | cookies from the `Cookie` header |
//! | `file`, `server`, `attribute` | supplied through [`RequestBags`] |
//!
//! Scalar sources (`uri`, `path`, `method`, `isSecure`, `isAjax`,
//! `isJsonExpected`, `remoteAddress`) describe the request itself.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use filterkit_core::{InputResolver, ResolveError, Source, Value};
use http::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use http::request::Parts;
use http::uri::Scheme;
use http::HeaderMap;

use crate::config::HttpConfig;

/// Malformed request input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("malformed query string: {0}")]
    Query(#[source] serde_urlencoded::de::Error),
    #[error("malformed form body: {0}")]
    Form(#[source] serde_urlencoded::de::Error),
    #[error("malformed JSON body: {0}")]
    Json(#[source] serde_json::Error),
}

/// Input bags that do not come from the request line, headers or body.
///
/// Insert into the request extensions (e.g. from a multipart or auth
/// middleware) and [`RequestInput::from_parts`] picks them up.
#[derive(Debug, Clone, Default)]
pub struct RequestBags {
    pub files: Value,
    pub server: Value,
    pub attributes: Value,
}

/// [`InputResolver`] over one HTTP request.
#[derive(Debug, Clone)]
pub struct RequestInput {
    query: Value,
    post: Value,
    data: Value,
    headers: Value,
    cookies: Value,
    bags: RequestBags,
    uri: String,
    path: String,
    method: String,
    secure: bool,
    ajax: bool,
    json_expected: bool,
    remote_addr: Option<SocketAddr>,
}

impl RequestInput {
    /// Parses the request head and body.
    ///
    /// JSON bodies (`application/json`, `*+json`) and form bodies
    /// (`application/x-www-form-urlencoded`) populate `post`; any other body
    /// is ignored. The remote address is taken from axum's
    /// [`ConnectInfo`] when present.
    ///
    /// # Errors
    ///
    /// Returns [`InputError`] for a query string or body that cannot be
    /// parsed.
    pub fn from_parts(parts: &Parts, body: &[u8], config: &HttpConfig) -> Result<Self, InputError> {
        let query = match parts.uri.query() {
            Some(query) => parse_urlencoded(query.as_bytes()).map_err(InputError::Query)?,
            None => Value::Map(BTreeMap::new()),
        };
        let post = parse_body(&parts.headers, body)?;
        let data = merge(query.clone(), post.clone());

        let headers = &parts.headers;
        let forwarded_https = config.trust_forwarded_proto
            && header_str(headers, "x-forwarded-proto")
                .and_then(|proto| proto.split(',').next())
                .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
        let secure = parts.uri.scheme() == Some(&Scheme::HTTPS) || forwarded_https;

        Ok(Self {
            query,
            post,
            data,
            headers: header_bag(headers),
            cookies: cookie_bag(headers),
            bags: parts.extensions.get::<RequestBags>().cloned().unwrap_or_default(),
            uri: parts.uri.to_string(),
            path: parts.uri.path().to_string(),
            method: parts.method.as_str().to_string(),
            secure,
            ajax: header_str(headers, "x-requested-with")
                .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest")),
            json_expected: header_str(headers, ACCEPT.as_str())
                .is_some_and(|v| v.to_ascii_lowercase().contains("json")),
            remote_addr: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        })
    }

    /// Replaces the uploaded-file bag.
    #[must_use]
    pub fn with_files(mut self, files: impl Into<Value>) -> Self {
        self.bags.files = files.into();
        self
    }

    /// Replaces the server/environment bag.
    #[must_use]
    pub fn with_server(mut self, server: impl Into<Value>) -> Self {
        self.bags.server = server.into();
        self
    }

    /// Replaces the request-attribute bag.
    #[must_use]
    pub fn with_attributes(mut self, attributes: impl Into<Value>) -> Self {
        self.bags.attributes = attributes.into();
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    fn bag(&self, source: Source) -> Option<&Value> {
        match source {
            Source::Data => Some(&self.data),
            Source::Post => Some(&self.post),
            Source::Query => Some(&self.query),
            Source::Cookie => Some(&self.cookies),
            Source::Header => Some(&self.headers),
            Source::File => Some(&self.bags.files),
            Source::Server => Some(&self.bags.server),
            Source::Attribute => Some(&self.bags.attributes),
            _ => None,
        }
    }

    fn scalar(&self, source: Source) -> Value {
        match source {
            Source::Uri => Value::from(self.uri.as_str()),
            Source::Path => Value::from(self.path.as_str()),
            Source::Method => Value::from(self.method.as_str()),
            Source::IsSecure => Value::Bool(self.secure),
            Source::IsAjax => Value::Bool(self.ajax),
            Source::IsJsonExpected => Value::Bool(self.json_expected),
            Source::RemoteAddress => self
                .remote_addr
                .map_or(Value::Null, |addr| Value::String(addr.ip().to_string())),
            _ => Value::Null,
        }
    }
}

impl InputResolver for RequestInput {
    fn resolve(&self, source: Source, path: &str) -> Result<Option<Value>, ResolveError> {
        match self.bag(source) {
            Some(bag) if source == Source::Header => {
                Ok(bag.lookup(&path.to_ascii_lowercase()).cloned())
            }
            Some(bag) => Ok(bag.lookup(path).cloned()),
            None => Ok(Some(self.scalar(source))),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, InputError> {
    if body.is_empty() {
        return Ok(Value::Map(BTreeMap::new()));
    }
    let mime = header_str(headers, CONTENT_TYPE.as_str())
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if mime == "application/json" || mime.ends_with("+json") {
        let json: serde_json::Value = serde_json::from_slice(body).map_err(InputError::Json)?;
        Ok(Value::from(json))
    } else if mime == "application/x-www-form-urlencoded" {
        parse_urlencoded(body).map_err(InputError::Form)
    } else {
        tracing::debug!(content_type = %mime, "ignoring request body of unsupported type");
        Ok(Value::Map(BTreeMap::new()))
    }
}

/// Parses `a=1&b[c]=2&d[]=3&d[]=4` into nested values.
///
/// Later duplicates of a plain key win; `[]` appends; maps whose keys are
/// exactly `0..n` become arrays.
fn parse_urlencoded(input: &[u8]) -> Result<Value, serde_urlencoded::de::Error> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(input)?;
    let mut root = Value::Map(BTreeMap::new());
    for (key, value) in pairs {
        insert_segments(&mut root, &split_key(&key), Value::String(value));
    }
    Ok(normalize(root))
}

/// `a[b][]` -> `["a", "b", ""]`. Keys without brackets, or with a
/// malformed bracket suffix, are used literally up to the last well-formed
/// segment.
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[').filter(|&open| open > 0) else {
        return vec![key];
    };
    let mut segments = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    segments
}

fn insert_segments(target: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    if first.is_empty() {
        if !matches!(target, Value::Array(_)) {
            *target = Value::Array(Vec::new());
        }
        if let Value::Array(items) = target {
            items.push(Value::Null);
            if let Some(last) = items.last_mut() {
                insert_segments(last, rest, value);
            }
        }
        return;
    }
    if !matches!(target, Value::Map(_)) {
        *target = Value::Map(BTreeMap::new());
    }
    if let Value::Map(map) = target {
        let slot = map.entry((*first).to_string()).or_insert(Value::Null);
        insert_segments(slot, rest, value);
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Map(map) => {
            let sequential = !map.is_empty()
                && (0..map.len()).all(|i| map.contains_key(&i.to_string()));
            if sequential {
                let mut indexed: Vec<(usize, Value)> = map
                    .into_iter()
                    .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, normalize(v))))
                    .collect();
                indexed.sort_by_key(|(i, _)| *i);
                Value::Array(indexed.into_iter().map(|(_, v)| v).collect())
            } else {
                Value::Map(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Deep-merges `overlay` onto `base`; overlay values win.
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Map(mut base), Value::Map(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Map(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

fn header_bag(headers: &HeaderMap) -> Value {
    let mut bag: BTreeMap<String, Value> = BTreeMap::new();
    for name in headers.keys() {
        let values: Vec<&str> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !values.is_empty() {
            bag.insert(name.as_str().to_string(), Value::String(values.join(", ")));
        }
    }
    Value::Map(bag)
}

fn cookie_bag(headers: &HeaderMap) -> Value {
    let cookies = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), Value::String(value.trim().to_string())))
        .collect();
    Value::Map(cookies)
}

#[cfg(test)]
mod tests {
    use http::Request;
    use serde_json::json;

    use super::*;

    fn parts(builder: http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    fn input(builder: http::request::Builder, body: &str) -> RequestInput {
        RequestInput::from_parts(&parts(builder), body.as_bytes(), &HttpConfig::default()).unwrap()
    }

    fn get(input: &RequestInput, source: Source, path: &str) -> serde_json::Value {
        input
            .resolve(source, path)
            .unwrap()
            .map_or(serde_json::Value::Null, serde_json::Value::from)
    }

    #[test]
    fn query_brackets_build_nested_values() {
        let input = input(
            Request::get("/users?name=Ann&address[city]=Oslo&tags[]=a&tags[]=b&items[1]=y&items[0]=x"),
            "",
        );
        assert_eq!(get(&input, Source::Query, "name"), json!("Ann"));
        assert_eq!(get(&input, Source::Query, "address.city"), json!("Oslo"));
        assert_eq!(get(&input, Source::Query, "tags"), json!(["a", "b"]));
        assert_eq!(get(&input, Source::Query, "items"), json!(["x", "y"]));
        assert_eq!(get(&input, Source::Query, "missing"), serde_json::Value::Null);
    }

    #[test]
    fn json_body_populates_post_and_wins_in_data() {
        let input = input(
            Request::post("/users?name=query&page=2").header(CONTENT_TYPE, "application/json; charset=utf-8"),
            r#"{"name":"body","address":{"city":"Oslo"}}"#,
        );
        assert_eq!(get(&input, Source::Post, "name"), json!("body"));
        assert_eq!(get(&input, Source::Post, "page"), serde_json::Value::Null);
        assert_eq!(get(&input, Source::Data, "name"), json!("body"));
        assert_eq!(get(&input, Source::Data, "page"), json!("2"));
        assert_eq!(get(&input, Source::Data, "address.city"), json!("Oslo"));
    }

    #[test]
    fn form_body_is_parsed_like_a_query() {
        let input = input(
            Request::post("/").header(CONTENT_TYPE, "application/x-www-form-urlencoded"),
            "user[name]=Ann+Lee&user[age]=41",
        );
        assert_eq!(get(&input, Source::Post, "user"), json!({ "name": "Ann Lee", "age": "41" }));
    }

    #[test]
    fn unsupported_body_is_ignored() {
        let input = input(Request::post("/").header(CONTENT_TYPE, "text/plain"), "hello");
        assert_eq!(get(&input, Source::Post, ""), json!({}));
    }

    #[test]
    fn malformed_json_is_an_input_error() {
        let result = RequestInput::from_parts(
            &parts(Request::post("/").header(CONTENT_TYPE, "application/json")),
            b"{nope",
            &HttpConfig::default(),
        );
        assert!(matches!(result, Err(InputError::Json(_))));
    }

    #[test]
    fn headers_and_cookies() {
        let input = input(
            Request::get("/")
                .header("X-Api-Version", "3")
                .header(COOKIE, "sid=abc; theme=dark")
                .header("x-requested-with", "XMLHttpRequest")
                .header(ACCEPT, "application/json"),
            "",
        );
        assert_eq!(get(&input, Source::Header, "X-API-VERSION"), json!("3"));
        assert_eq!(get(&input, Source::Cookie, "theme"), json!("dark"));
        assert_eq!(get(&input, Source::IsAjax, ""), json!(true));
        assert_eq!(get(&input, Source::IsJsonExpected, ""), json!(true));
    }

    #[test]
    fn request_line_scalars() {
        let input = input(Request::put("https://example.org/users/7?x=1"), "");
        assert_eq!(get(&input, Source::Method, ""), json!("PUT"));
        assert_eq!(get(&input, Source::Path, ""), json!("/users/7"));
        assert_eq!(get(&input, Source::Uri, ""), json!("https://example.org/users/7?x=1"));
        assert_eq!(get(&input, Source::IsSecure, ""), json!(true));
        assert_eq!(get(&input, Source::RemoteAddress, ""), serde_json::Value::Null);

        let addr: SocketAddr = "10.0.0.5:4000".parse().unwrap();
        let input = input.with_remote_addr(addr);
        assert_eq!(get(&input, Source::RemoteAddress, ""), json!("10.0.0.5"));
    }

    #[test]
    fn forwarded_proto_requires_trust() {
        let builder = || Request::get("/").header("x-forwarded-proto", "https");
        let untrusted = input(builder(), "");
        assert_eq!(get(&untrusted, Source::IsSecure, ""), json!(false));

        let config = HttpConfig {
            trust_forwarded_proto: true,
            ..HttpConfig::default()
        };
        let trusted = RequestInput::from_parts(&parts(builder()), b"", &config).unwrap();
        assert_eq!(get(&trusted, Source::IsSecure, ""), json!(true));
    }

    #[test]
    fn caller_supplied_bags() {
        let mut request = Request::post("/").body(()).unwrap();
        request.extensions_mut().insert(RequestBags {
            attributes: Value::from(json!({ "route": { "id": "7" } })),
            ..RequestBags::default()
        });
        let (parts, ()) = request.into_parts();
        let input = RequestInput::from_parts(&parts, b"", &HttpConfig::default())
            .unwrap()
            .with_files(Value::from(json!({ "avatar": { "name": "a.png", "size": 3 } })));
        assert_eq!(get(&input, Source::Attribute, "route.id"), json!("7"));
        assert_eq!(get(&input, Source::File, "avatar.size"), json!(3));
        assert_eq!(get(&input, Source::Server, "x"), serde_json::Value::Null);
    }

    #[test]
    fn split_key_edge_cases() {
        assert_eq!(split_key("a"), ["a"]);
        assert_eq!(split_key("a[b][]"), ["a", "b", ""]);
        assert_eq!(split_key("[x]"), ["[x]"]);
        assert_eq!(split_key("a[b"), ["a"]);
    }
}
