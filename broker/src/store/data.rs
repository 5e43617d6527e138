use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;

/// Connectivity data one worker publishes for one domain, handed to clients
/// verbatim after worker selection. Field names follow the worker's JSON
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerData {
    #[serde(rename = "ExternalAddress")]
    pub external_address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "LinkAddress")]
    pub link_address: String,
    #[serde(rename = "PublicKey")]
    pub public_key: String,
}

/// `(worker, domain)` → endpoint record. Written from the MQTT data topic,
/// read by the v2 key exchange handler.
#[derive(Debug, Default)]
pub struct WorkerDataStore {
    data: RwLock<HashMap<(String, String), WorkerData>>,
}

impl WorkerDataStore {
    pub fn put(&self, worker: &str, domain: &str, data: WorkerData) {
        self.data
            .write()
            .insert((worker.to_string(), domain.to_string()), data);
    }

    pub fn get(&self, worker: &str, domain: &str) -> Option<WorkerData> {
        self.data
            .read()
            .get(&(worker.to_string(), domain.to_string()))
            .cloned()
    }
}
