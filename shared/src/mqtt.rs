//! The MQTT topic scheme shared by brokers and workers. Both sides must
//! split and build topics the same way for messages to be routed at all.

/// Metric used for load-based worker selection.
pub const CONNECTED_PEERS_METRIC: &str = "connected_peers";

/// Wildcard subscription for the worker metrics feed, shaped
/// `wireguard-metrics/<domain>/<worker>/<metric>`.
pub const METRICS_FILTER: &str = "wireguard-metrics/#";

/// Wildcard subscription for per-worker status messages.
pub const WORKER_STATUS_FILTER: &str = "wireguard/worker/+/status";

/// Wildcard subscription for per-(worker, domain) connectivity data.
pub const WORKER_DATA_FILTER: &str = "wireguard/worker/+/+/data";

/// Wildcard subscription for peer broker status messages.
pub const BROKER_STATUS_FILTER: &str = "wireguard/broker/+/status";

pub fn worker_status_topic(worker: &str) -> String {
    format!("wireguard/worker/{worker}/status")
}

pub fn worker_data_topic(worker: &str, domain: &str) -> String {
    format!("wireguard/worker/{worker}/{domain}/data")
}

pub fn broker_status_topic(broker: &str) -> String {
    format!("wireguard/broker/{broker}/status")
}

/// Topic a submitted public key is forwarded on. Workers subscribe with
/// their own name and `all`.
pub fn key_exchange_topic(domain: &str, worker: &str) -> String {
    format!("wireguard/{domain}/{worker}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_match_subscription_filters() {
        assert_eq!(
            worker_status_topic("gw1"),
            WORKER_STATUS_FILTER.replace('+', "gw1")
        );
        assert_eq!(
            broker_status_topic("broker1"),
            BROKER_STATUS_FILTER.replace('+', "broker1")
        );
        assert_eq!(worker_data_topic("gw1", "ffda"), "wireguard/worker/gw1/ffda/data");
        assert_eq!(key_exchange_topic("ffda", "all"), "wireguard/ffda/all");
    }
}
