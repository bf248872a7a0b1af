//! # metagraph
//!
//! Library half of the Metagraph CLI: configuration, workspace loading,
//! result rendering and the command implementations. The binary in
//! `main.rs` only parses arguments, installs logging and dispatches here.

pub mod cli;
pub mod config;
pub mod render;
pub mod workspace;
