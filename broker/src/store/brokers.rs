use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct BrokerStatus {
    online: bool,
}

/// Online flags for every peer broker seen on the status topic, this process
/// included. Entries are toggled, never removed; the count of online brokers
/// feeds the peer-count interpolation in the v2 key exchange.
#[derive(Debug, Default)]
pub struct BrokerStatusStore {
    data: RwLock<BTreeMap<String, BrokerStatus>>,
}

impl BrokerStatusStore {
    pub fn set(&self, broker: &str, online: bool) {
        let mut data = self.data.write();
        match data.get_mut(broker) {
            None => {
                // An offline report for a broker we never saw come up
                // carries no information.
                if online {
                    data.insert(broker.to_string(), BrokerStatus { online: true });
                }
            }
            Some(status) if status.online && !online => {
                log::warn!("marking broker as offline: {}", broker);
                status.online = false;
            }
            Some(status) if !status.online && online => {
                log::info!("marking broker as online: {}", broker);
                status.online = true;
            }
            Some(_) => {}
        }
    }

    pub fn count_online(&self) -> usize {
        self.data.read().values().filter(|status| status.online).count()
    }
}
