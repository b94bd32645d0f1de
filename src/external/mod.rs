//! Clients for remote services

pub mod client;
pub mod github;
