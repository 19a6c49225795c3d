use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::{
    conn::Conn, context::Context, metrics, policy::BalancerPolicy, signal::RefreshSignal,
};

const NAME: &str = "random_choice";

pub struct RandomChoice {
    conns: Vec<Arc<dyn Conn>>,
    refresh: RefreshSignal,
}

impl RandomChoice {
    pub fn new(conns: Vec<Arc<dyn Conn>>) -> Self {
        Self {
            conns,
            refresh: RefreshSignal::new(),
        }
    }

    pub fn create(&self, conns: &[Arc<dyn Conn>]) -> Self {
        Self::new(conns.to_vec())
    }

    pub fn conns(&self) -> &[Arc<dyn Conn>] {
        &self.conns
    }

    pub fn next(&self, ctx: &Context, allow_banned: bool) -> Option<Arc<dyn Conn>> {
        let len = self.conns.len();
        if len == 0 {
            metrics::BALANCER_SELECTIONS_COUNT
                .with_label_values(&[NAME, metrics::OUTCOME_NONE])
                .inc();
            return None;
        }

        let mut rng = rand::thread_rng();

        // draws are with replacement, so a banned connection may come up again
        for _ in 0..len {
            if ctx.is_done() {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_CANCELLED])
                    .inc();
                return None;
            }

            let conn = &self.conns[rng.gen_range(0..len)];

            if allow_banned {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_RELAXED])
                    .inc();
                return Some(conn.clone());
            }

            if conn.state().is_online() {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_ONLINE])
                    .inc();
                return Some(conn.clone());
            }

            metrics::BALANCER_SKIPPED_COUNT
                .with_label_values(&[NAME])
                .inc();
        }

        if self.refresh.arm() {
            debug!("no online connection after {len} draws, refresh requested");
            metrics::BALANCER_REFRESH_SIGNALS_COUNT
                .with_label_values(&[NAME])
                .inc();
        }

        metrics::BALANCER_SELECTIONS_COUNT
            .with_label_values(&[NAME, metrics::OUTCOME_NONE])
            .inc();
        None
    }

    pub async fn need_refresh(&self, ctx: &Context) -> bool {
        self.refresh.wait(ctx).await
    }
}

#[async_trait]
impl BalancerPolicy for RandomChoice {
    fn name(&self) -> &'static str {
        NAME
    }

    fn create(&self, conns: &[Arc<dyn Conn>]) -> Box<dyn BalancerPolicy> {
        Box::new(RandomChoice::create(self, conns))
    }

    fn next(&self, ctx: &Context, allow_banned: bool) -> Option<Arc<dyn Conn>> {
        RandomChoice::next(self, ctx, allow_banned)
    }

    async fn need_refresh(&self, ctx: &Context) -> bool {
        RandomChoice::need_refresh(self, ctx).await
    }
}
