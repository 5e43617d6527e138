use hyper::{header, http, Body, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use wgkex_shared::key::InvalidKey;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    #[error("domain {0} not in configured domains")]
    UnknownDomain(String),

    #[error("no gateway online for this domain, please check the domain value and try again later")]
    NoWorkerAvailable,

    #[error("could not get gateway data")]
    MissingWorkerData,

    #[error("object not found")]
    NotFound,

    #[error("invalid query")]
    InvalidQuery,

    #[error("JSON parsing/serialization error")]
    Json(#[from] serde_json::Error),

    #[error("MQTT publish error")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("generic HTTP error")]
    Http(#[from] http::Error),

    #[error("generic hyper error")]
    Hyper(#[from] hyper::Error),
}

impl<'a> From<&'a ServerError> for StatusCode {
    fn from(error: &ServerError) -> StatusCode {
        use ServerError::*;
        match error {
            InvalidKey(_) | UnknownDomain(_) | NoWorkerAvailable | InvalidQuery | Json(_) => {
                StatusCode::BAD_REQUEST
            }
            NotFound => StatusCode::NOT_FOUND,
            MissingWorkerData | Mqtt(_) | Http(_) | Hyper(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl TryFrom<ServerError> for Response<Body> {
    type Error = http::Error;

    fn try_from(e: ServerError) -> Result<Self, Self::Error> {
        let status = StatusCode::from(&e);
        if status == StatusCode::NOT_FOUND {
            return Response::builder().status(status).body(Body::empty());
        }
        let body = json!({ "error": { "message": e.to_string() } });
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
    }
}
