pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod message;
pub mod rpc;
pub mod transport;

pub use engine::Engine;
pub use error::{DriverError, ErrorKind};
