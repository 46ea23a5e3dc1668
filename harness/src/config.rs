use std::fmt::Display;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

/// Timeout and poll interval of one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTiming {
    pub timeout: Duration,
    pub interval: Duration,
}

impl WaitTiming {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Per-scenario wait policy.
///
/// Readiness is a local fact and polls fast; peer and message convergence
/// depend on background discovery and gossip and poll coarsely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub readiness: WaitTiming,
    pub peer_convergence: WaitTiming,
    pub message_delivery: WaitTiming,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            readiness: WaitTiming::new(Duration::from_secs(30), Duration::from_secs(2)),
            peer_convergence: WaitTiming::new(Duration::from_secs(100), Duration::from_secs(5)),
            message_delivery: WaitTiming::new(Duration::from_secs(30), Duration::from_secs(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub name: String,
    pub subnet: String,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub name: String,
    pub port: u16,
    pub ip: Ipv4Addr,
}

/// Configuration for a two-node session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Host the participants' REST ports are published on.
    pub host: String,
    pub network: NetworkConfig,
    pub image: String,
    pub node_log_level: String,
    pub initial: NodeConfig,
    pub joining: NodeConfig,
    pub content_topic: String,
    pub timings: Timings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            network: NetworkConfig {
                name: "waku".to_string(),
                subnet: "172.18.0.0/16".to_string(),
                gateway: Ipv4Addr::new(172, 18, 0, 1),
            },
            image: "wakuorg/nwaku:v0.24.0".to_string(),
            node_log_level: "TRACE".to_string(),
            initial: NodeConfig {
                name: "node1".to_string(),
                port: 21161,
                ip: Ipv4Addr::new(172, 18, 0, 2),
            },
            joining: NodeConfig {
                name: "node2".to_string(),
                port: 21171,
                ip: Ipv4Addr::new(172, 18, 0, 3),
            },
            content_topic: "/relay-probe/1/test-topic/proto".to_string(),
            timings: Timings::default(),
        }
    }
}

impl HarnessConfig {
    /// Reads overrides from `RELAY_PROBE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);

        let timings = Timings {
            readiness: WaitTiming {
                timeout: seconds(
                    &lookup,
                    "RELAY_PROBE_READY_TIMEOUT_SECS",
                    defaults.timings.readiness.timeout,
                )?,
                ..defaults.timings.readiness
            },
            peer_convergence: WaitTiming {
                timeout: seconds(
                    &lookup,
                    "RELAY_PROBE_PEER_TIMEOUT_SECS",
                    defaults.timings.peer_convergence.timeout,
                )?,
                ..defaults.timings.peer_convergence
            },
            message_delivery: WaitTiming {
                timeout: seconds(
                    &lookup,
                    "RELAY_PROBE_MESSAGE_TIMEOUT_SECS",
                    defaults.timings.message_delivery.timeout,
                )?,
                ..defaults.timings.message_delivery
            },
        };

        Ok(Self {
            host: string("RELAY_PROBE_HOST", defaults.host),
            network: NetworkConfig {
                name: string("RELAY_PROBE_NETWORK", defaults.network.name),
                subnet: string("RELAY_PROBE_SUBNET", defaults.network.subnet),
                gateway: parse(&lookup, "RELAY_PROBE_GATEWAY", defaults.network.gateway)?,
            },
            image: string("RELAY_PROBE_NODE_IMAGE", defaults.image),
            node_log_level: string("RELAY_PROBE_NODE_LOG_LEVEL", defaults.node_log_level),
            initial: NodeConfig {
                name: defaults.initial.name,
                port: parse(&lookup, "RELAY_PROBE_NODE1_PORT", defaults.initial.port)?,
                ip: parse(&lookup, "RELAY_PROBE_NODE1_IP", defaults.initial.ip)?,
            },
            joining: NodeConfig {
                name: defaults.joining.name,
                port: parse(&lookup, "RELAY_PROBE_NODE2_PORT", defaults.joining.port)?,
                ip: parse(&lookup, "RELAY_PROBE_NODE2_IP", defaults.joining.ip)?,
            },
            content_topic: string("RELAY_PROBE_CONTENT_TOPIC", defaults.content_topic),
            timings,
        })
    }
}

fn parse<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            key,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse(lookup, key, default.as_secs()).map(Duration::from_secs)
}
