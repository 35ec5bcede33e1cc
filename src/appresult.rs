use axum::{http::StatusCode, response::{IntoResponse, Response}};
use tracing::{error, warn};

use crate::error::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(Error::Authentication) => StatusCode::UNAUTHORIZED,
            Some(Error::Authorization(_)) => StatusCode::FORBIDDEN,
            Some(Error::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(Error::Persistence(_) | Error::Upload(_) | Error::Send(_) | Error::Backend(_)) => {
                StatusCode::BAD_GATEWAY
            }
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("{:#}", self.0);
            return (status, format!("{}\n\n{}", self.0, self.0.backtrace())).into_response();
        }

        if status.is_server_error() {
            warn!("{:#}", self.0);
        }
        (status, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
