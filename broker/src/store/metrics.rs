use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use wgkex_shared::mqtt::CONNECTED_PEERS_METRIC;

/// Everything one worker has reported about itself, keyed by domain and
/// metric name. Created lazily on the first message mentioning the worker;
/// only an explicit status message flips it online.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    online: bool,
    domain_metrics: HashMap<String, HashMap<String, i64>>,
}

impl WorkerMetrics {
    /// Peer count for `domain`, or `None` if the worker has never reported
    /// anything for it. A domain entry without a peer counter counts as 0.
    fn connected_peers(&self, domain: &str) -> Option<i64> {
        self.domain_metrics
            .get(domain)
            .map(|metrics| metrics.get(CONNECTED_PEERS_METRIC).copied().unwrap_or(0))
    }
}

/// The worker chosen for a key exchange, with the load figures that drove
/// the choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSelection {
    pub worker: String,
    /// Gap to the runner-up's peer count, 0 if there was no other candidate.
    pub diff: i64,
    pub current_peers: i64,
}

/// Per-worker online flags and metrics, written by the MQTT callbacks and
/// read by the HTTP handlers.
#[derive(Debug, Default)]
pub struct WorkerMetricsStore {
    // BTreeMap so candidates iterate in worker-id order.
    data: RwLock<BTreeMap<String, WorkerMetrics>>,
}

impl WorkerMetricsStore {
    /// Sets `metric` for `(worker, domain)`, replacing any previous value.
    pub fn update(&self, worker: &str, domain: &str, metric: &str, value: i64) {
        self.data
            .write()
            .entry(worker.to_string())
            .or_default()
            .domain_metrics
            .entry(domain.to_string())
            .or_default()
            .insert(metric.to_string(), value);
    }

    /// Adds `n` to the stored peer count for `(worker, domain)`, creating the
    /// entry at 0 first. Approximates joiners between two worker-side metric
    /// updates; the worker's next report replaces the approximation.
    pub fn interpolate(&self, worker: &str, domain: &str, n: i64) {
        let mut data = self.data.write();
        *data
            .entry(worker.to_string())
            .or_default()
            .domain_metrics
            .entry(domain.to_string())
            .or_default()
            .entry(CONNECTED_PEERS_METRIC.to_string())
            .or_insert(0) += n;
    }

    pub fn set_online(&self, worker: &str) {
        let mut data = self.data.write();
        let metrics = data.entry(worker.to_string()).or_default();
        if !metrics.online {
            log::warn!("marking worker as online: {}", worker);
            metrics.online = true;
        }
    }

    pub fn set_offline(&self, worker: &str) {
        let mut data = self.data.write();
        let metrics = data.entry(worker.to_string()).or_default();
        if metrics.online {
            log::warn!("marking worker as offline: {}", worker);
            metrics.online = false;
        }
    }

    pub fn is_online(&self, worker: &str) -> bool {
        self.data
            .read()
            .get(worker)
            .map(|metrics| metrics.online)
            .unwrap_or(false)
    }

    /// Peer count for `(worker, domain)`, 0 if nothing was ever reported.
    pub fn connected_peers(&self, worker: &str, domain: &str) -> i64 {
        self.data
            .read()
            .get(worker)
            .and_then(|metrics| metrics.connected_peers(domain))
            .unwrap_or(0)
    }

    pub fn online_workers(&self) -> usize {
        self.data.read().values().filter(|m| m.online).count()
    }

    /// Sum of `connected_peers` over every domain of every online worker.
    pub fn total_peer_count(&self) -> i64 {
        self.data
            .read()
            .values()
            .filter(|m| m.online)
            .flat_map(|m| m.domain_metrics.values())
            .filter_map(|metrics| metrics.get(CONNECTED_PEERS_METRIC))
            .sum()
    }

    /// Picks the online worker with the fewest connected peers in `domain`.
    /// Only workers that have reported metrics for the domain are candidates;
    /// ties go to the lexicographically smallest worker id. Returns `None`
    /// if no online worker has visibility into the domain.
    pub fn best_worker(&self, domain: &str) -> Option<WorkerSelection> {
        let data = self.data.read();
        let mut candidates: Vec<(&str, i64)> = data
            .iter()
            .filter(|(_, metrics)| metrics.online)
            .filter_map(|(worker, metrics)| {
                metrics
                    .connected_peers(domain)
                    .map(|peers| (worker.as_str(), peers))
            })
            .collect();
        // Stable sort on the already worker-ordered candidates, so the first
        // entry of a tie is the lexicographically smallest.
        candidates.sort_by_key(|&(_, peers)| peers);

        let &(worker, current_peers) = candidates.first()?;
        let diff = candidates
            .get(1)
            .map(|&(_, peers)| peers - current_peers)
            .unwrap_or(0);

        Some(WorkerSelection {
            worker: worker.to_string(),
            diff,
            current_peers,
        })
    }
}
