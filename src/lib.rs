//! pacman-client - Async client for the privileged cockpit-pacman backend.

pub mod backend;
pub mod config;
pub mod display;
