use std::{
    fmt,
    sync::atomic::{self, AtomicU8},
};

use serde::Deserialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnState {
    #[default]
    Unknown = 0,
    Created = 1,
    Online = 2,
    Banned = 3,
    Offline = 4,
    Destroyed = 5,
}

impl ConnState {
    /// Only `Online` connections are usable when banned ones are not allowed.
    pub fn is_online(self) -> bool {
        self == ConnState::Online
    }
}

impl From<u8> for ConnState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnState::Created,
            2 => ConnState::Online,
            3 => ConnState::Banned,
            4 => ConnState::Offline,
            5 => ConnState::Destroyed,
            _ => ConnState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    pub address: String,
    pub node_id: u32,
    pub location: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (node {})", self.address, self.node_id)
    }
}

/// A transport connection as seen by balancers.
///
/// Health state is owned by whoever tracks the connection; balancers only
/// read it and must tolerate it changing between two reads.
pub trait Conn: Send + Sync {
    fn state(&self) -> ConnState;
    fn endpoint(&self) -> &Endpoint;
}

#[derive(Clone, Deserialize)]
pub struct EndpointConfig {
    pub address: String,
    #[serde(default)]
    pub node_id: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_state")]
    pub state: ConnState,
}

fn default_state() -> ConnState {
    ConnState::Online
}

pub struct PoolConn {
    endpoint: Endpoint,
    state: AtomicU8,
}

impl PoolConn {
    pub fn new(endpoint: Endpoint, state: ConnState) -> Self {
        Self {
            endpoint,
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        let endpoint = Endpoint {
            address: config.address.clone(),
            node_id: config.node_id,
            location: config.location.clone(),
        };
        Self::new(endpoint, config.state)
    }

    pub fn set_state(&self, state: ConnState) {
        self.state.store(state as u8, atomic::Ordering::SeqCst);
    }
}

impl Conn for PoolConn {
    fn state(&self) -> ConnState {
        ConnState::from(self.state.load(atomic::Ordering::SeqCst))
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
