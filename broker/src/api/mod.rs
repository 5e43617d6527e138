use hyper::{header, Body, Request, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::ServerError;

pub mod key_exchange;
pub mod status;

// A key exchange body is a public key and a domain label; anything larger
// than this is not a well-behaved client.
const MAX_BODY_BYTES: u64 = 4 * 1024;

/// Reads a request body and deserializes it as JSON.
pub async fn json_body<T: DeserializeOwned>(req: Request<Body>) -> Result<T, ServerError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok()?.parse::<u64>().ok());
    match declared {
        Some(length) if length <= MAX_BODY_BYTES => {}
        _ => return Err(ServerError::InvalidQuery),
    }

    let body = hyper::body::to_bytes(req.into_body()).await?;
    serde_json::from_slice(&body).map_err(Into::into)
}

/// Serializes `payload` into a 200 application/json response.
pub fn json_response<T: Serialize>(payload: &T) -> Result<Response<Body>, ServerError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(payload)?))?)
}
