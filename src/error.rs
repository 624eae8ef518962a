use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::web::pages;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    /// Carries the percent-encoded path the visitor was trying to reach.
    #[error("Authentication required")]
    AuthenticationRequired { next: String },
    #[error("Permission denied")]
    Forbidden,
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// `302 Found` pointing at `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(what) => {
                (StatusCode::NOT_FOUND, Html(pages::render_not_found(&what))).into_response()
            }
            Self::AuthenticationRequired { next } => found(&format!("/login/?next={next}")),
            Self::Forbidden => found("/forbidden/"),
            Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                error!("Request failed: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(pages::render_server_error()),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        let response = AppError::NotFound("Ticket".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_authentication_required_redirects_to_login() {
        let response = AppError::AuthenticationRequired {
            next: "/tickets/".into(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
            Some(&b"/login/?next=/tickets/"[..])
        );
    }

    #[test]
    fn test_forbidden_redirects() {
        let response = AppError::Forbidden.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
            Some(&b"/forbidden/"[..])
        );
    }

    #[test]
    fn test_database_error_hides_detail() {
        let response = AppError::Database(diesel::result::Error::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
