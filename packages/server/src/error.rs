//! API errors and their HTTP mapping.

use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use park_map_database::DbError;
use park_map_explore::ExploreError;
use park_map_server_models::ApiErrorBody;
use thiserror::Error;

/// Errors surfaced by the API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A referenced resource, row, slug or id does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request's parameters are malformed or not allowed.
    #[error("{0}")]
    BadRequest(String),

    /// The catalog store failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// A response object could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ExploreError> for ApiError {
    fn from(e: ExploreError) -> Self {
        match e {
            ExploreError::Database(e) => Self::Database(e),
            e => Self::NotFound(e.to_string()),
        }
    }
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the error as a JSON response. Server-side failures are
    /// logged and their details withheld from the client.
    #[must_use]
    pub fn into_response(self) -> HttpResponse {
        let status = self.status();
        let error = if status.is_server_error() {
            log::error!("Failed to serve catalog request: {self}");
            "Failed to query catalog".to_string()
        } else {
            log::debug!("Rejected catalog request ({status}): {self}");
            self.to_string()
        };

        HttpResponse::build(status).json(ApiErrorBody { error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_explore_errors() {
        let err = ApiError::from(ExploreError::NeighborhoodNotFound {
            slug: "atlantis".to_string(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Neighborhood not found: atlantis");

        let err = ApiError::from(ExploreError::Database(DbError::Conversion {
            message: "bad row".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_status() {
        let err = ApiError::BadRequest("Invalid parktype 'x'".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
