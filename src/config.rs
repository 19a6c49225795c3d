use serde::Deserialize;

use crate::{balancer, conn, discovery, session};

#[derive(Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub balancer: balancer::Config,
    pub discovery: discovery::Config,
    pub session: session::Config,
    pub endpoints: Vec<conn::EndpointConfig>,
}

impl AppConfig {
    pub fn from_toml(config: &str) -> crate::Result<Self> {
        Ok(toml::from_str(config)?)
    }
}
