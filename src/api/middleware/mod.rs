pub mod logging;
pub mod rate_limit;
pub mod security;

pub use logging::request_logger;
pub use rate_limit::{rate_limit, RateLimiter};
pub use security::security_headers;
