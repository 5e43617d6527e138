use crate::{store::WorkerData, Context};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS, Transport};
use std::time::Duration;
use thiserror::Error;
use wgkex_shared::{
    config::MqttConfig,
    key::{validate_pubkey, InvalidKey},
    mqtt as topics,
};

/// Reasons an inbound message gets dropped. Never propagated out of the
/// event loop; logged at error level and swallowed.
#[derive(Debug, Error)]
pub(crate) enum IngressError {
    #[error("unexpected topic shape: {0}")]
    BadTopic(String),

    #[error("domain {0} not in configured domains")]
    UnknownDomain(String),

    #[error("empty worker or metric label")]
    EmptyLabel,

    #[error("payload is not valid UTF-8")]
    BadEncoding,

    #[error("payload is not an integer: {0}")]
    BadInteger(String),

    #[error("malformed worker data: {0}")]
    BadWorkerData(#[from] serde_json::Error),

    #[error("port out of range")]
    BadPort,

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),
}

/// Builds the MQTT client for this broker. The last will lets peers flip our
/// retained status to offline if the session dies without a clean disconnect.
pub fn client(config: &MqttConfig, hostname: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(hostname, &config.broker_url, config.broker_port);
    options.set_keep_alive(Duration::from_secs(config.keepalive));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }
    if config.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options.set_last_will(LastWill::new(
        topics::broker_status_topic(hostname),
        "0",
        QoS::AtLeastOnce,
        true,
    ));

    AsyncClient::new(options, 64)
}

/// Drives the MQTT connection: (re)subscribes and announces this broker as
/// online on every connect, and feeds inbound publishes through the router.
pub async fn run(mut eventloop: EventLoop, context: Context, hostname: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                log::debug!("MQTT connected");
                if let Err(e) = on_connect(&context, &hostname).await {
                    log::error!("MQTT subscription setup failed: {}", e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if let Err(e) = handle_message(&context, &publish.topic, &publish.payload) {
                    log::error!("dropping MQTT message on {}: {}", publish.topic, e);
                }
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("MQTT connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn on_connect(context: &Context, hostname: &str) -> Result<(), rumqttc::ClientError> {
    for filter in [
        topics::METRICS_FILTER,
        topics::WORKER_STATUS_FILTER,
        topics::WORKER_DATA_FILTER,
        topics::BROKER_STATUS_FILTER,
    ] {
        context.mqtt.subscribe(filter, QoS::AtMostOnce).await?;
    }
    context
        .mqtt
        .publish(
            topics::broker_status_topic(hostname),
            QoS::AtLeastOnce,
            true,
            "1".to_string(),
        )
        .await
}

/// Demultiplexes one inbound message into the matching store update.
pub(crate) fn handle_message(
    context: &Context,
    topic: &str,
    payload: &[u8],
) -> Result<(), IngressError> {
    let segments: Vec<&str> = topic.split('/').collect();
    match segments.as_slice() {
        ["wireguard-metrics", ..] => handle_metrics(context, topic, payload),
        ["wireguard", "worker", worker, "status"] => handle_worker_status(context, worker, payload),
        ["wireguard", "worker", worker, domain, "data"] => {
            handle_worker_data(context, worker, domain, payload)
        }
        ["wireguard", "broker", broker, "status"] => handle_broker_status(context, broker, payload),
        _ => {
            log::debug!("ignoring MQTT message on {}", topic);
            Ok(())
        }
    }
}

fn handle_metrics(context: &Context, topic: &str, payload: &[u8]) -> Result<(), IngressError> {
    // The metric label is the topic remainder and may itself contain slashes.
    let mut parts = topic.splitn(4, '/').skip(1);
    let (Some(domain), Some(worker), Some(metric)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(IngressError::BadTopic(topic.to_string()));
    };

    if !context.is_valid_domain(domain) {
        return Err(IngressError::UnknownDomain(domain.to_string()));
    }
    if worker.is_empty() || metric.is_empty() {
        return Err(IngressError::EmptyLabel);
    }
    let value = parse_int(payload)?;

    log::info!(
        "update worker metrics: {} on {}/{} = {}",
        metric,
        worker,
        domain,
        value
    );
    context.metrics.update(worker, domain, metric, value);
    Ok(())
}

fn handle_worker_status(
    context: &Context,
    worker: &str,
    payload: &[u8],
) -> Result<(), IngressError> {
    if parse_int(payload)? >= 1 {
        context.metrics.set_online(worker);
    } else {
        context.metrics.set_offline(worker);
    }
    Ok(())
}

fn handle_worker_data(
    context: &Context,
    worker: &str,
    domain: &str,
    payload: &[u8],
) -> Result<(), IngressError> {
    if !context.is_valid_domain(domain) {
        return Err(IngressError::UnknownDomain(domain.to_string()));
    }

    let data: WorkerData = serde_json::from_slice(payload)?;
    validate_pubkey(&data.public_key)?;
    if data.port == 0 {
        return Err(IngressError::BadPort);
    }

    log::info!("worker data received for {}/{}: {:?}", worker, domain, data);
    context.data.put(worker, domain, data);
    Ok(())
}

fn handle_broker_status(
    context: &Context,
    broker: &str,
    payload: &[u8],
) -> Result<(), IngressError> {
    let status = parse_int(payload)?;
    context.brokers.set(broker, status >= 1);
    Ok(())
}

fn parse_int(payload: &[u8]) -> Result<i64, IngressError> {
    let text = std::str::from_utf8(payload).map_err(|_| IngressError::BadEncoding)?;
    text.trim()
        .parse()
        .map_err(|_| IngressError::BadInteger(text.to_string()))
}
