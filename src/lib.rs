//! A file manager for Google Drive: a session-authenticated HTTP proxy in
//! front of the Drive v3 API and the client data layer that talks to it.

pub mod auth;
pub mod client;
pub mod config;
pub mod google_drive;
pub mod prelude;
pub mod server;
