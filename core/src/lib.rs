//! Tempo core
//!
//! Partitioned, log-based record processing for workflow deployments and
//! messages. Every partition appends commands to its log and runs them
//! through the stream processor, whose record processors write follow-up
//! records, answer clients and forward commands to other partitions.

pub mod broker;
pub mod cli;
pub mod config;
pub mod el;
pub mod log;
pub mod model;
pub mod processing;
pub mod processors;
pub mod state;
pub mod types;

pub use broker::{Broker, BrokerBuilder, CommandRejected};
pub use config::Config;
pub use model::{TransformError, WorkflowTransformer};
pub use types::*;
