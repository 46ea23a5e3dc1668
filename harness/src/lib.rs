//! Relay Probe Harness
//!
//! Brings up isolated relay participants, waits for them to become ready and
//! to converge, and exposes a small client for driving and observing them.

pub mod client;
pub mod config;
pub mod docker;
pub mod error;
pub mod polling;
pub mod provisioner;
pub mod session;
pub mod substrate;
pub mod verifier;


pub use client::{HttpReply, ParticipantClient};
pub use config::{HarnessConfig, NetworkConfig, NodeConfig, Timings, WaitTiming};
pub use docker::DockerSubstrate;
pub use error::{ClientError, HarnessError, ProvisionError};
pub use polling::{wait_for, wait_for_messages, wait_for_specific_message, WaitTimeout};
pub use provisioner::{ParticipantProcess, ParticipantState, Provisioner};
pub use session::{Session, TwoNodeTopology};
pub use substrate::{LaunchSpec, NetworkEnvironment, PortSet, Substrate, SubstrateError};

pub use relay_probe_lib::{Message, PeerRecord, RawMessage};
