pub mod brokers;
pub mod data;
pub mod metrics;

pub use brokers::BrokerStatusStore;
pub use data::{WorkerData, WorkerDataStore};
pub use metrics::{WorkerMetricsStore, WorkerSelection};
