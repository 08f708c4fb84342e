//! Tracker reachability validation.
//!
//! DNS and HTTP checks for every scheme, BEP 15 connect handshakes for UDP
//! trackers in aggressive mode, bounded retries, a 24h health store and a
//! process-wide UDP budget.

pub mod error;
pub mod health;
pub mod probe;
pub mod rate_limit;
pub mod types;
pub mod udp;
pub mod validator;

pub use error::TrackerError;
pub use health::{HealthStore, MemoryHealthStore};
pub use probe::{NetworkProbe, TrackerProbe};
pub use rate_limit::UdpRateLimiter;
pub use types::{HealthRecord, ValidationMode, ValidationProgress};
pub use validator::{TrackerValidator, unique};
