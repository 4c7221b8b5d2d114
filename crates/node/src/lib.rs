//! The Taiko driver node: wires the L1, L2 and checkpoint providers into the driver and runs it.

pub use args::{DriverArgs, L1ProviderArgs, L2ProviderArgs, ProtocolArgs, TaikoNodeArgs};
mod args;

mod constants;

pub use node::TaikoDriverNode;
mod node;
