pub mod api;
pub mod config;
pub mod deck;
pub mod decoder;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod render;
pub mod reorder;
pub mod service;
pub mod session;
pub mod slide;
pub mod stream;
pub mod telemetry;
