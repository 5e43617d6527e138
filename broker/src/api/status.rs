use crate::{Context, ServerError};
use hyper::{header, Body, Response, StatusCode};

const INDEX_HTML: &str = "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head><meta charset=\"utf-8\"><title>wgkex broker</title></head>\n\
<body>\n\
<h1>wgkex broker</h1>\n\
<p>WireGuard key exchange. POST your public key to\n\
<code>/api/v2/wg/key/exchange</code> to be assigned a gateway.</p>\n\
</body>\n\
</html>\n";

pub fn index() -> Result<Response<Body>, ServerError> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(INDEX_HTML))?)
}

/// Plain-text liveness counters, one `key: value` per line.
pub fn status(context: &Context) -> Result<Response<Body>, ServerError> {
    let body = format!(
        "online-brokers: {}\nonline-workers: {}\ntotal-peers: {}\n",
        context.brokers.count_online(),
        context.metrics.online_workers(),
        context.metrics.total_peer_count(),
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body))?)
}
