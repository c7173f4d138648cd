//! Configuration structs

mod client_config;

pub use client_config::{
    AutoReconnectConfig, ClientConfig, ConfigError, Environment, KeepaliveConfig, QueueConfig,
};
