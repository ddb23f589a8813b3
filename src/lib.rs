pub mod analytics;
pub mod api_client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod records;
pub mod store;
pub mod transform;
