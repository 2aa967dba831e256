//! Parsed view of one HTTP/1.1 request.

/// HTTP request methods.
///
/// Only GET and POST are served; anything else is rejected with 400 while
/// the request line is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    Get,
    /// POST - Submit a body, then retrieve a resource
    Post,
}

impl Method {
    /// Parses a request-line method token, case-insensitively.
    ///
    /// # Example
    ///
    /// ```
    /// # use rampart::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Some(Method::Get));
    /// assert_eq!(Method::from_token("post"), Some(Method::Post));
    /// assert_eq!(Method::from_token("PUT"), None);
    /// ```
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("GET") {
            Some(Method::Get)
        } else if token.eq_ignore_ascii_case("POST") {
            Some(Method::Post)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Fields accumulated while a request is parsed incrementally.
///
/// A connection resets this to defaults after every keep-alive cycle.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request path, always starting with `/`; `/` itself is rewritten to
    /// `/index.html` during request-line parsing.
    pub path: String,
    /// Host header, stored verbatim when present.
    pub host: Option<String>,
    /// Declared body length; zero when the header is absent.
    pub content_length: usize,
    /// Set iff a `Connection: keep-alive` header was seen.
    pub keep_alive: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: Method::Get,
            path: String::new(),
            host: None,
            content_length: 0,
            keep_alive: false,
        }
    }
}
