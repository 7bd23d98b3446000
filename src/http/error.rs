use rouille::Response;
use serde::Serialize;

use crate::{engine::error::RecommendError, provider::ProviderError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    BadGateway(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl From<RecommendError> for ApiError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::InvalidRankingConfig(_) => ApiError::BadRequest(err.to_string()),
            RecommendError::SeedUnresolvable(_) | RecommendError::MalformedMetadata(_) => {
                ApiError::Unprocessable(err.to_string())
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ProviderError::Unavailable(_) => ApiError::BadGateway(err.to_string()),
        }
    }
}

impl From<rouille::input::json::JsonError> for ApiError {
    fn from(err: rouille::input::json::JsonError) -> Self {
        ApiError::BadRequest(format!("invalid request body: {err}"))
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Unprocessable(_) => 422,
            ApiError::BadGateway(_) => 502,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unprocessable(msg)
            | ApiError::BadGateway(msg) => msg,
        }
    }

    pub fn into_response(self) -> Response {
        Response::json(&ErrorBody {
            error: self.message(),
        })
        .with_status_code(self.status_code())
    }
}
