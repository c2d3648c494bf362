pub extern crate actix_web;

mod admin;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod handlers;
pub mod room;
pub mod server;
pub mod server_state;
