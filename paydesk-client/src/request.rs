//! Request descriptors and the builder that turns them into URLs and headers

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use crate::config::{ClientConfig, REFRESH_ROUTE};
use crate::error::{ApiError, Result};
use crate::session::SessionStore;

/// Keys whose string values are pre-formatted filter expressions and go out
/// verbatim
const VERBATIM_KEYS: [&str; 2] = ["expand", "status_id"];

/// A single query parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::UInt(u) => write!(f, "{}", u),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Str(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

macro_rules! scalar_from_int {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(impl From<$t> for Scalar {
            fn from(i: $t) -> Self {
                Scalar::$variant(<$wide>::from(i))
            }
        })*
    };
}

scalar_from_int!(Int as i64: i32, i64);
scalar_from_int!(UInt as u64: u32, u64);

impl From<usize> for Scalar {
    fn from(i: usize) -> Self {
        // usize is at most 64 bits on every supported target
        Scalar::UInt(i as u64)
    }
}

/// Query parameter value: one scalar or a list emitted as repeated keys
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl From<Scalar> for QueryValue {
    fn from(value: Scalar) -> Self {
        QueryValue::Scalar(value)
    }
}

impl From<Vec<Scalar>> for QueryValue {
    fn from(values: Vec<Scalar>) -> Self {
        QueryValue::List(values)
    }
}

macro_rules! query_value_from {
    ($($t:ty),*) => {
        $(impl From<$t> for QueryValue {
            fn from(value: $t) -> Self {
                QueryValue::Scalar(value.into())
            }
        })*
    };
}

query_value_from!(&str, String, bool, f64, i32, i64, u32, u64, usize);

/// Everything needed to issue one call
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    route: String,
    query: Vec<(String, QueryValue)>,
    requires_auth: bool,
    default_headers: bool,
    extra_headers: Vec<(String, String)>,
    external: bool,
    body: Option<serde_json::Value>,
}

impl RequestDescriptor {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            query: Vec::new(),
            requires_auth: false,
            default_headers: true,
            extra_headers: Vec::new(),
            external: false,
            body: None,
        }
    }

    /// Attach `Authorization: Bearer <token>` from the session store
    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn param_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.query.push((key.into(), QueryValue::List(values)));
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = (String, QueryValue)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Start from an empty header map instead of the JSON defaults
    pub fn without_default_headers(mut self) -> Self {
        self.default_headers = false;
        self
    }

    /// Treat `route` as an absolute URL
    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn body<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Route with one leading slash stripped and the query string appended
    pub fn path_and_query(&self) -> String {
        let mut url = if self.external {
            self.route.clone()
        } else {
            self.route
                .strip_prefix('/')
                .unwrap_or(&self.route)
                .to_string()
        };

        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&build_query(&self.query));
        }
        url
    }

    /// Default headers, then extra headers, then the bearer token
    pub fn headers(&self, session: &SessionStore) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        if self.default_headers {
            let json = HeaderValue::from_static("application/json");
            headers.insert(header::CONTENT_TYPE, json.clone());
            headers.insert(header::ACCEPT, json);
        }

        for (name, value) in &self.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| ApiError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        if self.requires_auth {
            if let Some(token) = session.get_token() {
                headers.insert(header::AUTHORIZATION, bearer(&token)?);
            } else {
                tracing::debug!(route = %self.route, "No access token stored for authenticated request");
            }
        }

        Ok(headers)
    }

    /// Resolve against the base URL and the live session.
    ///
    /// POST, PUT and PATCH default to an empty JSON object body.
    pub fn prepare(
        &self,
        method: Method,
        config: &ClientConfig,
        session: &SessionStore,
    ) -> Result<PreparedRequest> {
        let path = self.path_and_query();
        let url = if self.external {
            path.clone()
        } else {
            config.url_for(&path)
        };
        reqwest::Url::parse(&url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", url, e)))?;

        let body = match (&self.body, method_has_body(&method)) {
            (Some(body), _) => Some(body.clone()),
            (None, true) => Some(serde_json::Value::Object(Default::default())),
            (None, false) => None,
        };

        Ok(PreparedRequest {
            method,
            url,
            route: path,
            headers: self.headers(session)?,
            body,
            requires_auth: self.requires_auth,
        })
    }
}

/// A descriptor resolved into something sendable
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    /// Normalized route plus query string, relative to the base URL
    pub route: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    pub requires_auth: bool,
}

impl PreparedRequest {
    pub fn set_bearer(&mut self, token: &str) -> Result<()> {
        self.headers.insert(header::AUTHORIZATION, bearer(token)?);
        Ok(())
    }

    /// Token currently carried in the Authorization header
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    pub fn is_refresh_call(&self) -> bool {
        self.route.contains(REFRESH_ROUTE)
    }
}

fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::InvalidHeader("authorization".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn method_has_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

/// `key=value` pairs joined by `&`, in insertion order
pub fn build_query(params: &[(String, QueryValue)]) -> String {
    params
        .iter()
        .flat_map(|(key, value)| match value {
            QueryValue::List(items) => items
                .iter()
                .map(|item| format!("{}={}", key, urlencoding::encode(&item.to_string())))
                .collect::<Vec<_>>(),
            QueryValue::Scalar(Scalar::Str(s)) if VERBATIM_KEYS.contains(&key.as_str()) => {
                vec![format!("{}={}", key, s)]
            }
            QueryValue::Scalar(scalar) => {
                vec![format!("{}={}", key, urlencoding::encode(&scalar.to_string()))]
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_leading_slash_stripped() {
        assert_eq!(RequestDescriptor::new("/auth/login/").path_and_query(), "auth/login/");
        assert_eq!(RequestDescriptor::new("//double").path_and_query(), "/double");
        assert_eq!(RequestDescriptor::new("plain/").path_and_query(), "plain/");
    }

    #[test]
    fn test_no_query_string_without_params() {
        let path = RequestDescriptor::new("organization-payment/").path_and_query();
        assert!(!path.contains('?'));
    }

    #[test]
    fn test_query_order_and_lists() {
        let path = RequestDescriptor::new("/organization-payment/")
            .param("page", 2)
            .param_list("payment_type", ["pix", "credit"])
            .param("paid", true)
            .param("search", "rent & co")
            .path_and_query();

        assert_eq!(
            path,
            "organization-payment/?page=2&payment_type=pix&payment_type=credit&paid=true&search=rent%20%26%20co"
        );
    }

    #[test]
    fn test_wide_integers_keep_their_value() {
        let path = RequestDescriptor::new("x")
            .param("id", u64::MAX)
            .param("offset", i64::MIN)
            .param("n", usize::MAX)
            .path_and_query();
        assert_eq!(
            path,
            format!("x?id=18446744073709551615&offset=-9223372036854775808&n={}", usize::MAX)
        );
    }

    #[test]
    fn test_verbatim_keys() {
        let query = build_query(&[
            ("expand".to_string(), "user,items.tags".into()),
            ("status_id".to_string(), "1|2".into()),
            ("filter".to_string(), "1|2".into()),
        ]);
        assert_eq!(query, "expand=user,items.tags&status_id=1|2&filter=1%7C2");
    }

    #[test]
    fn test_verbatim_only_for_strings() {
        let query = build_query(&[
            ("status_id".to_string(), QueryValue::List(vec!["a b".into()])),
            ("expand".to_string(), 3.into()),
        ]);
        assert_eq!(query, "status_id=a%20b&expand=3");
    }

    #[test]
    fn test_default_headers_and_overrides() {
        let session = SessionStore::in_memory();
        let headers = RequestDescriptor::new("x")
            .header("Accept", "text/csv")
            .header("X-Trace", "abc")
            .headers(&session)
            .unwrap();

        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::ACCEPT], "text/csv");
        assert_eq!(headers["x-trace"], "abc");
    }

    #[test]
    fn test_without_default_headers() {
        let session = SessionStore::in_memory();
        let headers = RequestDescriptor::new("x")
            .without_default_headers()
            .headers(&session)
            .unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_bearer_overrides_custom_authorization() {
        let session = SessionStore::in_memory();
        session.set_token("T1");

        let headers = RequestDescriptor::new("x")
            .authenticated()
            .header("Authorization", "Basic abc")
            .headers(&session)
            .unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer T1");
    }

    #[test]
    fn test_unauthenticated_never_carries_token() {
        let session = SessionStore::in_memory();
        session.set_token("T1");

        let headers = RequestDescriptor::new("auth/login/").headers(&session).unwrap();
        assert!(headers.get(header::AUTHORIZATION).is_none());
    }

    #[test]
    fn test_invalid_header_name() {
        let session = SessionStore::in_memory();
        let err = RequestDescriptor::new("x")
            .header("bad header", "v")
            .headers(&session)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(_)));
    }

    #[test]
    fn test_prepare_joins_base_and_defaults_body() {
        let session = SessionStore::in_memory();
        let config = ClientConfig::with_base_url("http://localhost:8000/api");

        let prepared = RequestDescriptor::new("/auth/logout/")
            .prepare(Method::POST, &config, &session)
            .unwrap();
        assert_eq!(prepared.url, "http://localhost:8000/api/auth/logout/");
        assert_eq!(prepared.body, Some(serde_json::json!({})));

        let prepared = RequestDescriptor::new("organization-payment/")
            .prepare(Method::GET, &config, &session)
            .unwrap();
        assert!(prepared.body.is_none());
    }

    #[test]
    fn test_external_route_used_as_is() {
        let session = SessionStore::in_memory();
        let config = ClientConfig::default();

        let prepared = RequestDescriptor::new("https://files.example.com/receipt/1")
            .external()
            .prepare(Method::GET, &config, &session)
            .unwrap();
        assert_eq!(prepared.url, "https://files.example.com/receipt/1");
    }

    #[test]
    fn test_refresh_route_detection() {
        let session = SessionStore::in_memory();
        let config = ClientConfig::default();

        let prepared = RequestDescriptor::new("/auth/refresh/")
            .prepare(Method::POST, &config, &session)
            .unwrap();
        assert!(prepared.is_refresh_call());
    }
}
