// Infrastructure layer - External dependencies and adapters
pub mod chunked_json;
pub mod config;
pub mod device_feed;
pub mod http_response;
pub mod settings_store;
