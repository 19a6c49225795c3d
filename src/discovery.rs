use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    balancer::Balancer,
    conn::{Conn, ConnState, EndpointConfig, PoolConn},
    context::Context,
    utils,
};

#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(with = "utils::serde_millis")]
    pub interval: Duration,
    // rediscover every interval even if nobody asked for it
    #[serde(default)]
    pub periodic: bool,
}

/// Source of fresh connection sets.
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(&self) -> crate::Result<Vec<Arc<dyn Conn>>>;
}

/// Reconnects to a fixed list of endpoints.
pub struct StaticDiscoverer {
    endpoints: Vec<EndpointConfig>,
}

impl StaticDiscoverer {
    pub fn new(endpoints: Vec<EndpointConfig>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl Discoverer for StaticDiscoverer {
    async fn discover(&self) -> crate::Result<Vec<Arc<dyn Conn>>> {
        if self.endpoints.is_empty() {
            return Err("no endpoints to discover".into());
        }

        let conns = self
            .endpoints
            .iter()
            .map(|endpoint| {
                let conn = PoolConn::from_config(endpoint);
                // freshly dialed
                conn.set_state(ConnState::Online);
                Arc::new(conn) as Arc<dyn Conn>
            })
            .collect();

        Ok(conns)
    }
}

pub struct Discovery<D> {
    config: Config,
    balancer: Arc<Balancer>,
    discoverer: D,
}

impl<D: Discoverer> Discovery<D> {
    pub fn new(config: Config, balancer: Arc<Balancer>, discoverer: D) -> Self {
        Self {
            config,
            balancer,
            discoverer,
        }
    }

    pub async fn run(&self, ctx: &Context) {
        while !ctx.is_done() {
            self.refresh_once(ctx).await;
        }
        debug!("discovery stopped");
    }

    /// Waits at most one interval for the balancer to ask for a refresh
    /// and installs a new connection set if needed. Returns `true` on install.
    pub async fn refresh_once(&self, ctx: &Context) -> bool {
        let needed = {
            let (wait_ctx, _cancel) = ctx.with_timeout(self.config.interval);
            self.balancer.need_refresh(&wait_ctx).await
        };

        if ctx.is_done() || (!needed && !self.config.periodic) {
            return false;
        }

        if needed {
            info!("balancer requested refresh");
        } else {
            debug!("periodic discovery");
        }

        match self.discoverer.discover().await {
            Ok(conns) => {
                self.balancer.update_conns(conns);
                true
            }
            Err(e) => {
                warn!("discovery failed: {e}");

                // the signal of the current instance stays armed, don't spin on it
                tokio::select! {
                    _ = ctx.done() => {}
                    _ = tokio::time::sleep(self.config.interval) => {}
                }
                false
            }
        }
    }
}
