use crate::{
    api::{json_body, json_response},
    store::WorkerData,
    Context, ServerError,
};
use hyper::{Body, Request, Response};
use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use wgkex_shared::{key::validate_pubkey, mqtt::key_exchange_topic};

/// A submitted key exchange request.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyExchange {
    pub public_key: String,
    pub domain: String,
}

impl KeyExchange {
    fn validate(self, context: &Context) -> Result<Self, ServerError> {
        validate_pubkey(&self.public_key)?;
        if !context.is_valid_domain(&self.domain) {
            return Err(ServerError::UnknownDomain(self.domain));
        }
        Ok(self)
    }
}

#[derive(Debug, Serialize)]
struct Message {
    #[serde(rename = "Message")]
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct EndpointResponse {
    #[serde(rename = "Endpoint")]
    endpoint: Endpoint,
}

/// The gateway connection parameters handed back to the client.
#[derive(Debug, Serialize)]
struct Endpoint {
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Port")]
    port: String,
    #[serde(rename = "AllowedIPs")]
    allowed_ips: Vec<String>,
    #[serde(rename = "PublicKey")]
    public_key: String,
}

impl From<WorkerData> for Endpoint {
    fn from(data: WorkerData) -> Self {
        Endpoint {
            address: data.external_address,
            port: data.port.to_string(),
            allowed_ips: vec![data.link_address],
            public_key: data.public_key,
        }
    }
}

/// Forwards the submitted key to the domain's workers. Until per-gateway
/// targeting exists, every worker in the domain receives it.
async fn publish_key(context: &Context, domain: &str, public_key: String) -> Result<(), ServerError> {
    context
        .mqtt
        .publish(
            key_exchange_topic(domain, "all"),
            QoS::AtMostOnce,
            false,
            public_key,
        )
        .await?;
    Ok(())
}

pub async fn v1(req: Request<Body>, context: Context) -> Result<Response<Body>, ServerError> {
    let form: KeyExchange = json_body(req).await?;
    let KeyExchange { public_key, domain } = form.validate(&context)?;

    log::info!("v1 key exchange for domain {}: {}", domain, public_key);
    publish_key(&context, &domain, public_key).await?;

    json_response(&Message { message: "OK" })
}

pub async fn v2(req: Request<Body>, context: Context) -> Result<Response<Body>, ServerError> {
    let form: KeyExchange = json_body(req).await?;
    let KeyExchange { public_key, domain } = form.validate(&context)?;

    log::info!("v2 key exchange for domain {}: {}", domain, public_key);
    // The key goes out before a gateway is chosen; workers treat keys they
    // never see a handshake for as no-ops.
    publish_key(&context, &domain, public_key).await?;

    let selection = match context.metrics.best_worker(&domain) {
        Some(selection) => selection,
        None => {
            log::warn!("no worker online for domain {}", domain);
            return Err(ServerError::NoWorkerAvailable);
        }
    };

    // Count this exchange against the chosen worker so consecutive requests
    // spread out between two worker-side metric updates. Incremented by the
    // number of online brokers, each broker assumed to see a similar share
    // of the request stream.
    let online_brokers = context.brokers.count_online().max(1) as i64;
    context
        .metrics
        .interpolate(&selection.worker, &domain, online_brokers);

    log::debug!(
        "chose worker {} with {} connected clients ({})",
        selection.worker,
        selection.current_peers,
        selection.diff
    );

    let data = match context.data.get(&selection.worker, &domain) {
        Some(data) => data,
        None => {
            log::error!(
                "couldn't get worker endpoint data for {}/{}",
                selection.worker,
                domain
            );
            return Err(ServerError::MissingWorkerData);
        }
    };

    json_response(&EndpointResponse {
        endpoint: data.into(),
    })
}

#[cfg(test)]
mod tests {
    use crate::test::{body_json, Server, DOMAIN, WG_KEY, WG_KEY_2};
    use anyhow::Result;
    use hyper::StatusCode;
    use serde_json::json;

    const V1_PATH: &str = "/api/v1/wg/key/exchange";
    const V2_PATH: &str = "/api/v2/wg/key/exchange";

    #[tokio::test]
    async fn v1_accepts_a_valid_key() -> Result<()> {
        let server = Server::new();

        // No worker has ever announced itself; v1 publishes regardless.
        let res = server.post_key_exchange(V1_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!({ "Message": "OK" }));

        Ok(())
    }

    #[tokio::test]
    async fn v1_rejects_a_malformed_key() -> Result<()> {
        let server = Server::new();

        let res = server.post_key_exchange(V1_PATH, "short", DOMAIN).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let message = body_json(res).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("not a valid WireGuard public key"));

        Ok(())
    }

    #[tokio::test]
    async fn v1_rejects_an_unknown_domain() -> Result<()> {
        let server = Server::new();

        let res = server.post_key_exchange(V1_PATH, WG_KEY, "nope").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let message = body_json(res).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("not in configured domains"));

        Ok(())
    }

    #[tokio::test]
    async fn v1_rejects_a_malformed_body() -> Result<()> {
        let server = Server::new();

        let res = server
            .request(hyper::Method::POST, V1_PATH, "this is not json")
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        Ok(())
    }

    #[tokio::test]
    async fn v2_returns_the_chosen_gateway() -> Result<()> {
        let server = Server::new();
        server.publish("wireguard/worker/gw1/status", "1");
        server.publish("wireguard-metrics/ffda/gw1/connected_peers", "10");
        server.publish(
            "wireguard/worker/gw1/ffda/data",
            &format!(
                r#"{{"ExternalAddress":"gw1.example","Port":51820,"LinkAddress":"fe80::1/64","PublicKey":"{WG_KEY_2}"}}"#
            ),
        );

        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            body_json(res).await,
            json!({
                "Endpoint": {
                    "Address": "gw1.example",
                    "Port": "51820",
                    "AllowedIPs": ["fe80::1/64"],
                    "PublicKey": WG_KEY_2,
                }
            })
        );

        // One broker assumed online, so the exchange counts as one peer.
        assert_eq!(server.context.metrics.connected_peers("gw1", DOMAIN), 11);

        Ok(())
    }

    #[tokio::test]
    async fn v2_interpolates_by_the_number_of_online_brokers() -> Result<()> {
        let server = Server::new();
        server.publish("wireguard/broker/broker1/status", "1");
        server.publish("wireguard/broker/broker2/status", "1");
        server.publish("wireguard/worker/gw1/status", "1");
        server.publish("wireguard-metrics/ffda/gw1/connected_peers", "10");
        server.publish(
            "wireguard/worker/gw1/ffda/data",
            &format!(
                r#"{{"ExternalAddress":"gw1.example","Port":51820,"LinkAddress":"fe80::1/64","PublicKey":"{WG_KEY_2}"}}"#
            ),
        );

        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(server.context.metrics.connected_peers("gw1", DOMAIN), 12);

        Ok(())
    }

    #[tokio::test]
    async fn v2_fails_without_an_online_worker() -> Result<()> {
        let server = Server::new();

        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let message = body_json(res).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("no gateway online"));

        Ok(())
    }

    #[tokio::test]
    async fn v2_prefers_the_least_loaded_worker() -> Result<()> {
        let server = Server::new();
        for gw in ["gw1", "gw2"] {
            server.publish(&format!("wireguard/worker/{gw}/status"), "1");
            server.publish(
                &format!("wireguard/worker/{gw}/ffda/data"),
                &format!(
                    r#"{{"ExternalAddress":"{gw}.example","Port":51820,"LinkAddress":"fe80::1/64","PublicKey":"{WG_KEY_2}"}}"#
                ),
            );
        }
        server.publish("wireguard-metrics/ffda/gw1/connected_peers", "10");
        server.publish("wireguard-metrics/ffda/gw2/connected_peers", "7");

        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(
            body_json(res).await["Endpoint"]["Address"],
            "gw2.example"
        );

        // gw2 moved to 8, still below gw1's 10, so it wins again.
        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(
            body_json(res).await["Endpoint"]["Address"],
            "gw2.example"
        );
        assert_eq!(server.context.metrics.connected_peers("gw2", DOMAIN), 9);
        assert_eq!(server.context.metrics.connected_peers("gw1", DOMAIN), 10);

        Ok(())
    }

    #[tokio::test]
    async fn v2_fails_when_endpoint_data_is_missing() -> Result<()> {
        let server = Server::new();
        server.publish("wireguard/worker/gw1/status", "1");
        server.publish("wireguard-metrics/ffda/gw1/connected_peers", "10");

        let res = server.post_key_exchange(V2_PATH, WG_KEY, DOMAIN).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let message = body_json(res).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.contains("could not get gateway data"));

        Ok(())
    }

    #[tokio::test]
    async fn key_exchange_is_post_only() -> Result<()> {
        let server = Server::new();

        let res = server.request(hyper::Method::GET, V2_PATH, "").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        Ok(())
    }
}
