//! Core library for the reposcope client: the PKCE authorization flow,
//! the session-cookie API channel, and the repo listing client shared by
//! front-ends.

pub mod auth;
pub mod config;
pub mod repos;
