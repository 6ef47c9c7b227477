//! Integration tests module

pub mod commands;
pub mod recording;
pub mod scenes;
pub mod transport;
