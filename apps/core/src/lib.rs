pub mod app_contents;
pub mod apps_client;
pub mod bus;
pub mod catalog;
pub mod category;
pub mod config;
pub mod contract;
pub mod core_service;
pub mod fan_in;
pub mod index_store;
pub mod logging;
pub mod model;
pub mod provider;
pub mod provider_registry;
pub mod runtime;
pub mod search_manager;
pub mod service_client;
pub mod settings_client;
pub mod transport;
