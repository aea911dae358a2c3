//! Admission control and time budgets for external calls

mod rate_limiter;
mod timeout;

pub use rate_limiter::RateLimiter;
pub use timeout::{run_blocking, with_timeout};
