use std::sync::{
    atomic::{self, AtomicI64},
    Arc,
};

use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use crate::{
    conn::Conn, context::Context, metrics, policy::BalancerPolicy, signal::RefreshSignal,
};

const NAME: &str = "round_robin";

pub struct RoundRobin {
    conns: Vec<Arc<dyn Conn>>,
    last: AtomicI64,
    refresh: RefreshSignal,
}

impl RoundRobin {
    /// Starts from a random position.
    pub fn new(conns: Vec<Arc<dyn Conn>>) -> Self {
        Self::with_start_position(conns, random_start())
    }

    /// The first `next` call looks at `position + 1`.
    pub fn with_start_position(conns: Vec<Arc<dyn Conn>>, position: i64) -> Self {
        Self {
            conns,
            last: AtomicI64::new(position),
            refresh: RefreshSignal::new(),
        }
    }

    pub fn create(&self, conns: &[Arc<dyn Conn>]) -> Self {
        Self::new(conns.to_vec())
    }

    pub fn conns(&self) -> &[Arc<dyn Conn>] {
        &self.conns
    }

    pub fn position(&self) -> i64 {
        self.last.load(atomic::Ordering::SeqCst)
    }

    pub fn next(&self, ctx: &Context, allow_banned: bool) -> Option<Arc<dyn Conn>> {
        // exactly one advance per call, skipped connections don't move the cursor;
        // it's ok if it overflows
        let index = self
            .last
            .fetch_add(1, atomic::Ordering::SeqCst)
            .wrapping_add(1);

        let len = self.conns.len();
        if len == 0 {
            metrics::BALANCER_SELECTIONS_COUNT
                .with_label_values(&[NAME, metrics::OUTCOME_NONE])
                .inc();
            return None;
        }

        let start = index.rem_euclid(len as i64) as usize;

        if allow_banned {
            if ctx.is_done() {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_CANCELLED])
                    .inc();
                return None;
            }
            metrics::BALANCER_SELECTIONS_COUNT
                .with_label_values(&[NAME, metrics::OUTCOME_RELAXED])
                .inc();
            return Some(self.conns[start].clone());
        }

        for offset in 0..len {
            if ctx.is_done() {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_CANCELLED])
                    .inc();
                return None;
            }

            let conn = &self.conns[(start + offset) % len];
            if conn.state().is_online() {
                metrics::BALANCER_SELECTIONS_COUNT
                    .with_label_values(&[NAME, metrics::OUTCOME_ONLINE])
                    .inc();
                return Some(conn.clone());
            }

            // any skip is already worth a refresh
            metrics::BALANCER_SKIPPED_COUNT
                .with_label_values(&[NAME])
                .inc();
            if self.refresh.arm() {
                debug!(
                    "skipped {} in state {:?}, refresh requested",
                    conn.endpoint(),
                    conn.state()
                );
                metrics::BALANCER_REFRESH_SIGNALS_COUNT
                    .with_label_values(&[NAME])
                    .inc();
            }
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

fn random_start() -> i64 {
    rand::thread_rng().gen_range(0..i64::from(i32::MAX))
}

#[async_trait]
impl BalancerPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn create(&self, conns: &[Arc<dyn Conn>]) -> Box<dyn BalancerPolicy> {
        Box::new(RoundRobin::create(self, conns))
    }

    fn next(&self, ctx: &Context, allow_banned: bool) -> Option<Arc<dyn Conn>> {
        RoundRobin::next(self, ctx, allow_banned)
    }

    async fn need_refresh(&self, ctx: &Context) -> bool {
        RoundRobin::need_refresh(self, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::conn::{
        tests::{as_dyn, conn},
        ConnState,
    };

    use super::*;

    fn addresses(conns: &[Arc<dyn Conn>]) -> Vec<String> {
        conns.iter().map(|c| c.endpoint().address.clone()).collect()
    }

    fn take(b: &RoundRobin, allow_banned: bool, n: usize) -> Vec<Option<String>> {
        let ctx = Context::background();
        (0..n)
            .map(|_| {
                b.next(&ctx, allow_banned)
                    .map(|c| c.endpoint().address.clone())
            })
            .collect()
    }

    fn expected(addresses: &[&str]) -> Vec<Option<String>> {
        addresses.iter().map(|a| Some(a.to_string())).collect()
    }

    #[test]
    fn test_random_start() {
        let conns = as_dyn(&[conn("1", ConnState::Online)]);
        let has_non_zero_position =
            (0..100).any(|_| RoundRobin::new(conns.clone()).position() > 0);
        assert!(has_non_zero_position);
    }

    #[test]
    fn test_with_start_position() {
        let conns = as_dyn(&[conn("1", ConnState::Online)]);
        let b = RoundRobin::with_start_position(conns, 5);
        assert_eq!(b.position(), 5);
        assert_eq!(addresses(b.conns()), ["1"]);
    }

    #[test]
    fn test_create_random_position() {
        let created_at_random = (0..100).any(|_| {
            let b = RoundRobin::new(Vec::new());
            let b1 = b.create(&[]);
            b.position() != 0 && b1.position() != 0 && b.position() != b1.position()
        });
        assert!(created_at_random);
    }

    #[test]
    fn test_create_conns() {
        let conns = as_dyn(&[conn("1", ConnState::Online)]);
        let conns2 = as_dyn(&[conn("2", ConnState::Online)]);

        let b = RoundRobin::with_start_position(conns, -1);
        let b2 = b.create(&conns2);

        assert_eq!(addresses(b.conns()), ["1"]);
        assert_eq!(addresses(b2.conns()), ["2"]);

        b2.refresh.arm();
        assert!(!b.refresh.is_armed());
        assert_eq!(take(&b, false, 2), expected(&["1", "1"]));
    }

    #[test]
    fn test_next_online() {
        let b = RoundRobin::with_start_position(
            as_dyn(&[conn("1", ConnState::Online), conn("2", ConnState::Online)]),
            -1,
        );
        assert_eq!(take(&b, false, 5), expected(&["1", "2", "1", "2", "1"]));
        assert!(!b.refresh.is_armed());
    }

    fn banned_in_middle() -> Vec<Arc<dyn Conn>> {
        as_dyn(&[
            conn("1", ConnState::Online),
            conn("2", ConnState::Banned),
            conn("3", ConnState::Online),
        ])
    }

    #[test]
    fn test_next_banned_in_middle_allow_banned() {
        let b = RoundRobin::with_start_position(banned_in_middle(), -1);
        assert_eq!(take(&b, true, 4), expected(&["1", "2", "3", "1"]));
        assert!(!b.refresh.is_armed());
    }

    #[test]
    fn test_next_banned_in_middle_deny_banned() {
        let b = RoundRobin::with_start_position(banned_in_middle(), -1);

        // the banned connection is skipped without an extra cursor move,
        // so the third call repeats the second one
        assert_eq!(take(&b, false, 4), expected(&["1", "3", "3", "1"]));
        assert!(b.refresh.is_armed());
    }

    #[test]
    fn test_next_all_banned() {
        let conns = as_dyn(&[conn("1", ConnState::Banned), conn("2", ConnState::Banned)]);

        let b = RoundRobin::with_start_position(conns, -1);
        assert_eq!(take(&b, true, 3), expected(&["1", "2", "1"]));

        assert_eq!(take(&b, false, 2), vec![None, None]);
        assert!(b.refresh.is_armed());
    }

    #[test]
    fn test_next_other_states_are_skipped() {
        let conns = as_dyn(&[
            conn("1", ConnState::Offline),
            conn("2", ConnState::Created),
            conn("3", ConnState::Online),
        ]);

        let b = RoundRobin::with_start_position(conns, -1);
        assert_eq!(take(&b, false, 3), expected(&["3", "3", "3"]));
        assert!(b.refresh.is_armed());
    }

    #[test]
    fn test_next_empty() {
        let b = RoundRobin::with_start_position(Vec::new(), -1);
        assert_eq!(take(&b, false, 2), vec![None, None]);
        assert_eq!(take(&b, true, 1), vec![None]);
        assert!(!b.refresh.is_armed());
    }

    #[test]
    fn test_next_cancelled() {
        let b = RoundRobin::with_start_position(as_dyn(&[conn("1", ConnState::Online)]), -1);
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        assert!(b.next(&ctx, false).is_none());
        assert!(b.next(&ctx, true).is_none());
        assert!(!b.refresh.is_armed());
    }

    #[test]
    fn test_next_cursor_overflow() {
        let b = RoundRobin::with_start_position(
            as_dyn(&[conn("1", ConnState::Online), conn("2", ConnState::Online)]),
            i64::MAX,
        );
        // i64::MAX + 1 wraps to i64::MIN, which is even
        assert_eq!(take(&b, false, 2), expected(&["1", "2"]));
    }

    #[tokio::test]
    async fn test_concurrent_next_is_cyclic() {
        let conns = as_dyn(&[
            conn("1", ConnState::Online),
            conn("2", ConnState::Online),
            conn("3", ConnState::Online),
        ]);
        let b = Arc::new(RoundRobin::with_start_position(conns, -1));

        let tasks = (0..4)
            .map(|_| {
                let b = b.clone();
                tokio::spawn(async move { take(&b, false, 300) })
            })
            .collect::<Vec<_>>();

        let mut counts = [0usize; 3];
        for task in tasks {
            for address in task.await.unwrap() {
                let idx: usize = address.unwrap().parse().unwrap();
                counts[idx - 1] += 1;
            }
        }

        // every cursor value is handed out exactly once
        assert_eq!(counts, [400, 400, 400]);
    }

    #[tokio::test]
    async fn test_need_refresh_expired_deadline() {
        let b = RoundRobin::with_start_position(as_dyn(&[conn("1", ConnState::Banned)]), -1);
        assert!(b.next(&Context::background(), false).is_none());
        assert!(b.refresh.is_armed());

        let (ctx, _cancel) = Context::background().with_timeout(Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(2));
        assert!(!b.need_refresh(&ctx).await);
    }

    #[tokio::test]
    async fn test_need_refresh_online() {
        let b = Arc::new(RoundRobin::new(as_dyn(&[conn("1", ConnState::Online)])));
        let (ctx, cancel) = Context::background().with_cancel();

        let waiter = tokio::spawn({
            let b = b.clone();
            async move { b.need_refresh(&ctx).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        cancel.cancel();
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_need_refresh_with_banned() {
        let b = Arc::new(RoundRobin::with_start_position(
            as_dyn(&[
                conn("1", ConnState::Online),
                conn("2", ConnState::Banned),
                conn("3", ConnState::Banned),
            ]),
            0,
        ));

        let waiter = tokio::spawn({
            let b = b.clone();
            async move { b.need_refresh(&Context::background()).await }
        });

        // relaxed selection lands on a banned connection but never asks for refresh
        let c = b.next(&Context::background(), true).unwrap();
        assert_eq!(c.endpoint().address, "2");
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        let c = b.next(&Context::background(), false).unwrap();
        assert_eq!(c.endpoint().address, "1");

        let res = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(res);
    }
}
