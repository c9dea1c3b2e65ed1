//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 admin and intake surface for the bridge.

pub mod error;
pub mod facade;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
