//! HTTP API handlers for credo-gw

pub mod callbacks;
pub mod health;
pub mod initiate;
pub mod reports;
pub mod sse;

pub use callbacks::callback_routes;
pub use health::health_routes;
pub use initiate::initiate_routes;
pub use reports::report_routes;
pub use sse::event_stream;
