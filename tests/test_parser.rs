use rampart::http::parser::{
    parse_header, parse_request_line, scan_line, HeaderField, LineOutcome, ParseError,
};
use rampart::http::request::Method;

#[test]
fn test_request_line_get_and_post() {
    let (method, path) = parse_request_line(b"GET /a.html HTTP/1.1").unwrap();
    assert_eq!(method, Method::Get);
    assert_eq!(path, "/a.html");

    let (method, path) = parse_request_line(b"post /submit HTTP/1.1").unwrap();
    assert_eq!(method, Method::Post);
    assert_eq!(path, "/submit");
}

#[test]
fn test_request_line_missing_version_is_rejected() {
    assert_eq!(parse_request_line(b"GET /a.html"), Err(ParseError::BadRequestLine));
}

#[test]
fn test_request_line_wrong_version_is_rejected() {
    assert_eq!(
        parse_request_line(b"GET /a.html HTTP/1.0"),
        Err(ParseError::BadVersion)
    );
}

#[test]
fn test_unsupported_method_is_rejected() {
    assert_eq!(
        parse_request_line(b"DELETE /a.html HTTP/1.1"),
        Err(ParseError::BadMethod)
    );
}

#[test]
fn test_extra_tokens_are_rejected() {
    assert_eq!(
        parse_request_line(b"GET /a.html HTTP/1.1 extra"),
        Err(ParseError::BadRequestLine)
    );
}

#[test]
fn test_bare_root_becomes_index() {
    let (_, path) = parse_request_line(b"GET / HTTP/1.1").unwrap();
    assert_eq!(path, "/index.html");
}

#[test]
fn test_absolute_urls_keep_only_the_path() {
    let (_, path) = parse_request_line(b"GET http://host:8080/img/logo.png HTTP/1.1").unwrap();
    assert_eq!(path, "/img/logo.png");
    let (_, path) = parse_request_line(b"GET HTTPS://host/a HTTP/1.1").unwrap();
    assert_eq!(path, "/a");
}

#[test]
fn test_relative_url_without_slash_is_rejected() {
    assert_eq!(parse_request_line(b"GET a.html HTTP/1.1"), Err(ParseError::BadUrl));
    assert_eq!(
        parse_request_line(b"GET http://hostonly HTTP/1.1"),
        Err(ParseError::BadUrl)
    );
}

#[test]
fn test_headers_are_classified_case_insensitively() {
    assert_eq!(
        parse_header(b"connection: Keep-Alive"),
        HeaderField::Connection { keep_alive: true }
    );
    assert_eq!(
        parse_header(b"Connection: close"),
        HeaderField::Connection { keep_alive: false }
    );
    assert_eq!(parse_header(b"content-length: 42"), HeaderField::ContentLength(42));
    assert_eq!(
        parse_header(b"Host:\t example.com"),
        HeaderField::Host("example.com".to_string())
    );
    assert_eq!(parse_header(b"X-Custom: whatever"), HeaderField::Other);
}

#[test]
fn test_unparseable_content_length_falls_back_to_zero() {
    assert_eq!(parse_header(b"Content-Length: banana"), HeaderField::ContentLength(0));
}

#[test]
fn test_header_without_colon_is_ignored() {
    assert_eq!(parse_header(b"not a header"), HeaderField::Other);
}

// Scanning must reach the same verdict no matter where the buffer is cut:
// every prefix of a valid line is Open, and the full line is Complete at
// the same offsets.
#[test]
fn test_scan_is_fragmentation_independent() {
    let buf = b"GET /index.html HTTP/1.1\r\n";
    for end in 0..buf.len() {
        assert_eq!(scan_line(buf, 0, end), LineOutcome::Open, "cut at {end}");
    }
    assert_eq!(
        scan_line(buf, 0, buf.len()),
        LineOutcome::Complete { line_end: buf.len() - 2, next: buf.len() }
    );
}

#[test]
fn test_scan_resumes_mid_buffer() {
    let buf = b"line one\r\nline two\r\n";
    let LineOutcome::Complete { next, .. } = scan_line(buf, 0, buf.len()) else {
        panic!("first line should be complete");
    };
    assert_eq!(
        scan_line(buf, next, buf.len()),
        LineOutcome::Complete { line_end: buf.len() - 2, next: buf.len() }
    );
}

#[test]
fn test_cr_followed_by_garbage_is_malformed() {
    let buf = b"GET / HTTP/1.1\rX";
    assert_eq!(scan_line(buf, 0, buf.len()), LineOutcome::Malformed);
}
