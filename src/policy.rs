use std::sync::Arc;

use async_trait::async_trait;

use crate::{conn::Conn, context::Context};

/// Connection selection strategy over a fixed set of connections.
///
/// Instances are never updated in place: a new connection set means a new
/// instance built with [`BalancerPolicy::create`].
#[async_trait]
pub trait BalancerPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Builds an independent instance of the same strategy over a copy of `conns`.
    fn create(&self, conns: &[Arc<dyn Conn>]) -> Box<dyn BalancerPolicy>;

    /// Picks a connection. With `allow_banned == false` only online connections
    /// are returned, and failing to find one is reported to `need_refresh` waiters.
    fn next(&self, ctx: &Context, allow_banned: bool) -> Option<Arc<dyn Conn>>;

    /// Resolves to `true` once this instance asked for rediscovery,
    /// or to `false` when `ctx` is done first.
    async fn need_refresh(&self, ctx: &Context) -> bool;
}
