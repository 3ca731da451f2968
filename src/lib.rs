pub mod account;
pub mod app;
pub mod auth;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod http;
pub mod module;
pub mod router;
pub mod session;
pub mod types;

#[cfg(test)]
pub mod testing;
