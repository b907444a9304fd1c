//! HTTP surface.

mod routes;

pub use routes::{ApiState, api_routes};
