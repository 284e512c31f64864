use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

pub type AppResult<T> = Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Host not allowed: {0}")]
    HostNotAllowed(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Upstream responded with {0}")]
    UpstreamStatus(StatusCode),

    #[error("Bad gateway: {0}")]
    FetchFailure(String),

    #[error("Internal server error: {0}")]
    InternalServerErrorWithContext(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingParameter(_) | Self::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Self::HostNotAllowed(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamStatus(status) => *status,
            Self::FetchFailure(_) => StatusCode::BAD_GATEWAY,
            Self::InternalServerErrorWithContext(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// label used for the request outcome counter
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidUrl(_) => "invalid_url",
            Self::HostNotAllowed(_) => "host_not_allowed",
            Self::Unauthorized => "unauthorized",
            Self::UpstreamStatus(_) => "upstream_status",
            Self::FetchFailure(_) => "fetch_failure",
            Self::InternalServerErrorWithContext(_) => "internal",
        }
    }
}

// plain text on purpose, players don't care and the gate rejections should stay cheap
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
