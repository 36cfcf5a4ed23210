//! An implementation of the [Modbus](http://modbus.org/) TCP protocol
//! (client and server) using [Tokio](https://docs.rs/tokio) and Rust's
//! `async/await` syntax.
//!
//! # Features
//!
//! * Panic-free parsing
//! * Pipelined requests matched to responses by transaction id
//! * Focus on maximal correctness and compliance to the specification
//! * Per-request timeouts that never tear down the connection
//!
//! # Supported functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//!
//! # Example
//!
//! A client that writes a 32-bit value into two adjacent holding registers
//! and reads it back:
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use komob::client::*;
//! use komob::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut channel = connect_tcp_client(
//!         "127.0.0.1:502".parse()?,
//!         10,
//!         DecodeLevel::default(),
//!     )
//!     .await?;
//!
//!     let param = RequestParam::new(UnitId::new(0x01), Duration::from_secs(3));
//!
//!     channel.write_u32(param, 0x10, 0x12345678).await?;
//!     let value = channel.read_u32(param, 0x10).await?;
//!     println!("value: {value:#010X}");
//!
//!     Ok(())
//! }
//! ```

/// client API
pub mod client;
/// server API
pub mod server;
/// in-memory register store usable as a server handler
pub mod store;

/// constant values defined by the protocol specification
pub mod constants;
/// types controlling the decoding of protocol traffic into log events
pub mod decode;
/// error types
pub mod error;

pub(crate) mod common;
pub(crate) mod tcp;

mod exception;
mod types;

pub use crate::decode::{AppDecodeLevel, DecodeLevel, FrameDecodeLevel, PhysDecodeLevel};
pub use crate::error::RequestError;
pub use crate::exception::ExceptionCode;
pub use crate::types::*;
