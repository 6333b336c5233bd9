use reqwest::Method;
use std::time::Duration;

/// Full description of an initiating request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Target URL
    pub url: String,

    /// HTTP method (GET by default)
    pub method: Method,

    /// Extra request headers
    pub headers: Vec<(String, String)>,

    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,

    /// Request body
    pub body: Option<String>,

    /// Per-request timeout overriding the client default
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates options for a plain GET against `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates options for a POST against `url`
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
