// Library interface for newsdesk modules
// The binary and the integration tests import everything through here

pub mod auth;
pub mod catalog;
pub mod commands;
pub mod live;
pub mod llm;
pub mod models;
pub mod session;
pub mod state;
pub mod store;
pub mod view;
