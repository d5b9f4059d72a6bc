mod health;
mod ping;

pub use health::{health_check, readiness_check, stats};
pub use ping::ping;
