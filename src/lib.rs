pub mod config;
pub mod llm;
pub mod shared;
pub mod tickets;
pub mod web_server;
