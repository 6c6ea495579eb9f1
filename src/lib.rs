//! Supervisor side of the thaw protocol
//!
//! Starts the `ploader` executable with its control channel wired up and
//! drives it through Start, MemLoad, and Exec or Abort.

pub mod client;
pub mod error;
pub mod region;

pub use client::LoaderClient;
pub use error::{Result, ThawError};
pub use pthaw_loader::{Ack, MemLoadRequest, OpCode, Protection};
pub use region::{Region, RegionSpec};
