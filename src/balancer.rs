use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::{
    conn::Conn,
    context::Context,
    policies::factory::{PolicyFactory, PolicyType},
    policy::BalancerPolicy,
};

#[derive(Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub policy: PolicyType,
}

/// The balancer a driver holds on to.
///
/// Policy instances are immutable, so a new connection set replaces the
/// whole instance.
pub struct Balancer {
    config: Config,
    // NOTE: unfortunately we can't have ArcSwap<dyn ...> because
    // T in ArcSwap<T> has to be Sized.
    // Thus we have Arc<Box<...>> here.
    policy: ArcSwap<Box<dyn BalancerPolicy>>,
}

impl Balancer {
    pub fn new(config: Config, conns: Vec<Arc<dyn Conn>>) -> Self {
        let policy = PolicyFactory::make(config.policy, conns);
        let policy = ArcSwap::new(Arc::new(policy));

        Self { config, policy }
    }

    pub fn policy_type(&self) -> PolicyType {
        self.config.policy
    }

    /// Online connections first, banned ones only as a last resort.
    pub fn next_conn(&self, ctx: &Context) -> Option<Arc<dyn Conn>> {
        let policy = self.policy.load();

        if let Some(conn) = policy.next(ctx, false) {
            return Some(conn);
        }

        if ctx.is_done() {
            return None;
        }

        // round robin advances its cursor once more here, that's intended
        debug!("no online connection, trying banned ones");
        let conn = policy.next(ctx, true);
        if conn.is_none() {
            warn!("no available connection");
        }
        conn
    }

    /// Waits on the instance installed at the moment of the call.
    pub async fn need_refresh(&self, ctx: &Context) -> bool {
        let policy = self.policy.load_full();
        policy.need_refresh(ctx).await
    }

    pub fn update_conns(&self, conns: Vec<Arc<dyn Conn>>) {
        let count = conns.len();

        let policy = self.policy.load().create(&conns);
        let name = policy.name();
        self.policy.store(Arc::new(policy));

        info!("{name} balancer updated with {count} connections");
    }
}
