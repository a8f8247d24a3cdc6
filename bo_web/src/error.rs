//! ABOUTME: Page-level errors rendered as HTML responses
//! ABOUTME: Maps core errors to 404 and 500 pages

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use askama::Template;
use std::fmt;
use tracing::error;

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate<'a> {
    status: u16,
    title: &'a str,
    detail: &'a str,
}

/// Error returned by page handlers
#[derive(Debug)]
pub enum PageError {
    NotFound(String),
    Internal(String),
}

impl PageError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::NotFound(detail) => write!(f, "Not Found: {}", detail),
            PageError::Internal(detail) => write!(f, "Internal Server Error: {}", detail),
        }
    }
}

impl ResponseError for PageError {
    fn status_code(&self) -> StatusCode {
        match self {
            PageError::NotFound(_) => StatusCode::NOT_FOUND,
            PageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Internal details stay in the logs
        let (title, detail) = match self {
            PageError::NotFound(_) => ("Page not found", "The requested page does not exist."),
            PageError::Internal(_) => ("Server error", "Something went wrong on our side."),
        };
        let page = ErrorTemplate {
            status: status.as_u16(),
            title,
            detail,
        };
        match page.render() {
            Ok(html) => HttpResponse::build(status)
                .content_type("text/html; charset=utf-8")
                .body(html),
            Err(e) => {
                error!("Failed to render error page: {}", e);
                HttpResponse::build(status).body(title)
            }
        }
    }
}

impl From<bo_core::Error> for PageError {
    fn from(err: bo_core::Error) -> Self {
        match err {
            bo_core::Error::NotFound(detail) => Self::NotFound(detail),
            other => {
                error!("Request failed: {}", other);
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<askama::Error> for PageError {
    fn from(err: askama::Error) -> Self {
        error!("Template rendering failed: {}", err);
        Self::Internal(format!("Template error: {}", err))
    }
}
