mod bringup;
mod config;
mod discovery;
mod engine;
mod errors;
mod network;
mod node;
mod pending;
mod router;
mod runtime;
pub mod zdo;

#[macro_use]
extern crate log;

pub use crate::bringup::{BringUp, CommissioningState, Directive, Goal};
pub use crate::config::{Config, NetworkSettings, Policy, SerialConfig};
pub use crate::discovery::{
    DiscoveryPipeline, DiscoveryState, DiscoveryStatus, Generation, Outcome, Query,
};
pub use crate::engine::{Command, Engine, Event};
pub use crate::errors::{Error, ErrorKind, Result};
pub use crate::network::{NetworkConfiguration, NodeType};
pub use crate::node::{MemoryStore, Node, NodeStore, NodeTable, COORDINATOR_ADDRESS};
pub use crate::pending::{PendingReplies, PendingReply, Waiter, ZdoMatch};
pub use crate::router::{route, Reason, Route};
pub use crate::runtime::{Coordinator, Events};
