use lazy_static::lazy_static;
use prometheus::{opts, register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref BALANCER_SELECTIONS_COUNT: IntCounterVec = register_int_counter_vec!(
        opts!("balancer_selections_count", "balancer selections by outcome"),
        &["policy", "outcome"]
    )
    .expect("Can't create metric");
    pub static ref BALANCER_SKIPPED_COUNT: IntCounterVec = register_int_counter_vec!(
        opts!("balancer_skipped_count", "not online connections passed over"),
        &["policy"]
    )
    .expect("Can't create metric");
    pub static ref BALANCER_REFRESH_SIGNALS_COUNT: IntCounterVec = register_int_counter_vec!(
        opts!("balancer_refresh_signals_count", "armed refresh signals"),
        &["policy"]
    )
    .expect("Can't create metric");
}

pub const OUTCOME_ONLINE: &str = "online";
pub const OUTCOME_RELAXED: &str = "relaxed";
pub const OUTCOME_NONE: &str = "none";
pub const OUTCOME_CANCELLED: &str = "cancelled";

pub fn gather() -> crate::Result<Vec<u8>> {
    let mut buffer = Vec::new();

    let encoder = TextEncoder::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;

    Ok(buffer)
}
