pub mod action_handler;
pub mod blocks;
pub mod client_cache;
pub mod config;
pub mod db;
pub mod encryptor;
pub mod errors;
pub mod event_dispatcher;
pub mod events;
mod http_client;
pub mod installation;
pub mod pending_actions;
pub mod rules;
pub mod secrets;
pub mod server;
pub mod service_provider;
pub mod signature;

pub use http_client::build_http_client;
