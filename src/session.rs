use std::{collections::HashMap, sync::Arc};

use serde::Deserialize;
use tracing::{debug, error};

use crate::{balancer::Balancer, context::Context};

#[derive(Clone, Deserialize)]
pub struct Config {
    pub requests: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

#[derive(Debug, Default)]
pub struct Report {
    // requests per endpoint address
    pub served: HashMap<String, usize>,
    pub unavailable: usize,
}

impl Report {
    fn merge(&mut self, other: Report) {
        for (address, count) in other.served {
            *self.served.entry(address).or_default() += count;
        }
        self.unavailable += other.unavailable;
    }

    pub fn total(&self) -> usize {
        self.served.values().sum::<usize>() + self.unavailable
    }
}

/// Issues operations against the balancer the way a query layer would:
/// one connection per operation.
pub struct Session {
    config: Config,
    balancer: Arc<Balancer>,
}

impl Session {
    pub fn new(config: Config, balancer: Arc<Balancer>) -> Self {
        Self { config, balancer }
    }

    pub async fn run(&self, ctx: &Context) -> Report {
        let concurrency = self.config.concurrency.max(1);
        let per_task = self.config.requests / concurrency;
        let remainder = self.config.requests % concurrency;

        let tasks = (0..concurrency)
            .map(|i| {
                let requests = per_task + usize::from(i < remainder);
                let balancer = self.balancer.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { execute(&balancer, &ctx, requests).await })
            })
            .collect::<Vec<_>>();

        let mut report = Report::default();
        for task in tasks {
            match task.await {
                Ok(r) => report.merge(r),
                Err(e) => error!("session task failed: {e}"),
            }
        }

        report
    }
}

async fn execute(balancer: &Balancer, ctx: &Context, requests: usize) -> Report {
    let mut report = Report::default();

    for _ in 0..requests {
        if ctx.is_done() {
            break;
        }

        match balancer.next_conn(ctx) {
            Some(conn) => {
                debug!("operation routed to {}", conn.endpoint());
                *report
                    .served
                    .entry(conn.endpoint().address.clone())
                    .or_default() += 1;
            }
            None => report.unavailable += 1,
        }

        // let discovery catch up between operations
        tokio::task::yield_now().await;
    }

    report
}
