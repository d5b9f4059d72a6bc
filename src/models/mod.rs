mod api;

pub use api::{HealthResponse, PingResponse, StatsResponse};
