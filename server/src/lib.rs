//! Spring '83 board server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod board;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
