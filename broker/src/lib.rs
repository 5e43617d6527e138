use anyhow::anyhow;
use hyper::{http, server::conn::AddrStream, Body, Method, Request, Response};
use rumqttc::AsyncClient;
use std::{
    collections::HashSet,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use wgkex_shared::{config::Config, Error};

pub mod api;
pub mod error;
pub mod mqtt;
pub mod store;

pub use error::ServerError;
use store::{BrokerStatusStore, WorkerDataStore, WorkerMetricsStore};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything the HTTP handlers and MQTT callbacks share. The stores
/// serialize their own mutations; nothing here requires cross-store
/// atomicity.
#[derive(Clone)]
pub struct Context {
    pub domains: Arc<HashSet<String>>,
    pub metrics: Arc<WorkerMetricsStore>,
    pub data: Arc<WorkerDataStore>,
    pub brokers: Arc<BrokerStatusStore>,
    pub mqtt: AsyncClient,
}

impl Context {
    pub fn new(domains: HashSet<String>, mqtt: AsyncClient) -> Self {
        Self {
            domains: Arc::new(domains),
            metrics: Arc::new(WorkerMetricsStore::default()),
            data: Arc::new(WorkerDataStore::default()),
            brokers: Arc::new(BrokerStatusStore::default()),
            mqtt,
        }
    }

    pub fn is_valid_domain(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000))
}

pub async fn serve(config: Config) -> Result<(), Error> {
    let hostname = hostname::get()
        .map_err(|e| anyhow!("failed to resolve hostname: {}", e))?
        .to_string_lossy()
        .into_owned();
    let listen_addr = config.broker_listen.unwrap_or_else(default_listen);

    log::debug!(
        "connecting to MQTT broker at {}:{}",
        config.mqtt.broker_url,
        config.mqtt.broker_port
    );
    let (client, eventloop) = mqtt::client(&config.mqtt, &hostname);
    let context = Context::new(config.domains, client);
    tokio::task::spawn(mqtt::run(eventloop, context.clone(), hostname));

    log::info!("wgkex-broker {} listening on {}.", VERSION, listen_addr);

    let make_svc = hyper::service::make_service_fn(move |_socket: &AddrStream| {
        let context = context.clone();
        async move {
            Ok::<_, http::Error>(hyper::service::service_fn(move |req: Request<Body>| {
                handle_request(context.clone(), req)
            }))
        }
    });

    hyper::Server::try_bind(&listen_addr)?.serve(make_svc).await?;

    Ok(())
}

/// Splits the request path, dispatches to the matching handler, and renders
/// any handler error as the JSON error envelope.
pub(crate) async fn handle_request(
    context: Context,
    req: Request<Body>,
) -> Result<Response<Body>, http::Error> {
    log::debug!("{} {}", req.method(), req.uri().path());

    let method = req.method().clone();
    let path = req.uri().path().trim_matches('/').to_owned();
    let segments: Vec<&str> = path.split('/').collect();

    let result = match segments.as_slice() {
        [""] if method == Method::GET => api::status::index(),
        ["status"] if method == Method::GET => api::status::status(&context),
        ["api", "v1", "wg", "key", "exchange"] if method == Method::POST => {
            api::key_exchange::v1(req, context).await
        }
        ["api", "v2", "wg", "key", "exchange"] if method == Method::POST => {
            api::key_exchange::v2(req, context).await
        }
        _ => Err(ServerError::NotFound),
    };

    result.or_else(|err| err.try_into())
}

#[cfg(test)]
mod tests {
    use crate::test::Server;
    use anyhow::Result;
    use hyper::{Method, StatusCode};

    #[tokio::test]
    async fn unknown_paths_are_not_found() -> Result<()> {
        let server = Server::new();

        for path in [
            "/nope",
            "/api",
            "/api/v1",
            "/api/v3/wg/key/exchange",
            "/api/v1/wg/key/exchange/extra",
            "/status/extra",
        ] {
            let res = server.request(Method::GET, path, "").await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "path {}", path);
        }

        Ok(())
    }
}
