//! Incremental HTTP parsing primitives.
//!
//! These functions are pure: they look at byte slices and report what they
//! found, while the connection owns the buffer and the cursors. That keeps
//! the resumption logic (partial lines, partial bodies) in one place and the
//! token rules testable on their own.

use thiserror::Error;

use crate::http::request::Method;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line")]
    BadRequestLine,
    #[error("unsupported method")]
    BadMethod,
    #[error("unsupported protocol version")]
    BadVersion,
    #[error("malformed url")]
    BadUrl,
}

/// Result of scanning the unchecked region of the read buffer for a CRLF.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// A full line ends (exclusive) at `line_end`; scanning resumes at
    /// `next`, just past the CRLF.
    Complete { line_end: usize, next: usize },
    /// No terminator yet; the caller has to wait for more input.
    Open,
    /// A bare `\n` without a preceding `\r`, or a `\r` followed by anything
    /// but `\n`. Fatal for the request.
    Malformed,
}

/// Scans `buf[checked..read_end]` for the next line terminator.
pub fn scan_line(buf: &[u8], checked: usize, read_end: usize) -> LineOutcome {
    let mut at = checked;
    while at < read_end {
        match buf[at] {
            b'\r' => {
                // Terminator may be split across reads.
                if at + 1 == read_end {
                    return LineOutcome::Open;
                }
                if buf[at + 1] == b'\n' {
                    return LineOutcome::Complete {
                        line_end: at,
                        next: at + 2,
                    };
                }
                return LineOutcome::Malformed;
            }
            b'\n' => {
                if at > 0 && buf[at - 1] == b'\r' {
                    return LineOutcome::Complete {
                        line_end: at - 1,
                        next: at + 1,
                    };
                }
                return LineOutcome::Malformed;
            }
            _ => at += 1,
        }
    }
    LineOutcome::Open
}

/// Splits a request line into method and path.
///
/// Accepts only GET and POST (case-insensitive) and exactly `HTTP/1.1`;
/// strips an optional `http://` or `https://` prefix from the url; requires
/// the remaining path to start with `/` and substitutes `/index.html` for a
/// bare `/`.
pub fn parse_request_line(line: &[u8]) -> Result<(Method, String), ParseError> {
    let text = std::str::from_utf8(line).map_err(|_| ParseError::BadRequestLine)?;
    let mut parts = text.split_ascii_whitespace();

    let method_token = parts.next().ok_or(ParseError::BadRequestLine)?;
    let url = parts.next().ok_or(ParseError::BadRequestLine)?;
    let version = parts.next().ok_or(ParseError::BadRequestLine)?;
    if parts.next().is_some() {
        return Err(ParseError::BadRequestLine);
    }

    let method = Method::from_token(method_token).ok_or(ParseError::BadMethod)?;
    if !version.eq_ignore_ascii_case("HTTP/1.1") {
        return Err(ParseError::BadVersion);
    }

    let path = strip_scheme(url)?;
    if !path.starts_with('/') {
        return Err(ParseError::BadUrl);
    }
    let path = if path == "/" { "/index.html" } else { path };
    Ok((method, path.to_string()))
}

/// Drops an absolute-url scheme and authority, keeping the path.
fn strip_scheme(url: &str) -> Result<&str, ParseError> {
    for scheme in ["http://", "https://"] {
        if url.len() >= scheme.len() && url[..scheme.len()].eq_ignore_ascii_case(scheme) {
            let rest = &url[scheme.len()..];
            return rest.find('/').map(|at| &rest[at..]).ok_or(ParseError::BadUrl);
        }
    }
    Ok(url)
}

/// A recognized (or deliberately ignored) header line.
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderField {
    /// `Connection:`; true iff the value is `keep-alive` (case-insensitive).
    Connection { keep_alive: bool },
    /// `Content-Length:` parsed as a non-negative integer; unparseable
    /// values fall back to zero, matching the server's lenient reading.
    ContentLength(usize),
    /// `Host:`, value stored verbatim.
    Host(String),
    /// Anything else; accepted and ignored.
    Other,
}

/// Classifies one non-empty header line. Never fails: unknown or malformed
/// headers are tolerated, only the framing (CRLF discipline) is strict.
pub fn parse_header(line: &[u8]) -> HeaderField {
    let Ok(text) = std::str::from_utf8(line) else {
        return HeaderField::Other;
    };
    let Some((name, value)) = text.split_once(':') else {
        return HeaderField::Other;
    };
    let value = value.trim_start_matches([' ', '\t']);
    if name.eq_ignore_ascii_case("Connection") {
        HeaderField::Connection {
            keep_alive: value.eq_ignore_ascii_case("keep-alive"),
        }
    } else if name.eq_ignore_ascii_case("Content-Length") {
        HeaderField::ContentLength(value.trim().parse().unwrap_or(0))
    } else if name.eq_ignore_ascii_case("Host") {
        HeaderField::Host(value.to_string())
    } else {
        HeaderField::Other
    }
}
