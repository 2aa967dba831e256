//! HTTP status codes and the canned bodies sent with error responses.

/// Status codes the server produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Error
    InternalError,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalError => 500,
        }
    }

    pub fn reason_phrase(self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalError => "Internal Error",
        }
    }

    /// Fixed body text for error responses. 200 responses carry file
    /// contents instead and never use this.
    pub fn canned_body(self) -> &'static str {
        match self {
            StatusCode::Ok => "",
            StatusCode::BadRequest => {
                "Your request has bad syntax or is inherently impossible to satisfy.\n"
            }
            StatusCode::Forbidden => {
                "You do not have permission to get file from this server.\n"
            }
            StatusCode::NotFound => "The requested file was not found on this server.\n",
            StatusCode::InternalError => {
                "There was an unusual problem serving the request file.\n"
            }
        }
    }
}

/// Body served for a zero-length file, where mapping is skipped entirely.
pub const EMPTY_PAGE: &str = "<html><body></body></html>";
