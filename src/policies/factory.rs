use std::sync::Arc;

use serde::Deserialize;

use crate::{conn::Conn, policies::RoundRobin, policy::BalancerPolicy};

use super::RandomChoice;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    #[default]
    RandomChoice,
    RoundRobin,
}

pub struct PolicyFactory;

impl PolicyFactory {
    pub fn make(policy: PolicyType, conns: Vec<Arc<dyn Conn>>) -> Box<dyn BalancerPolicy> {
        match policy {
            PolicyType::RandomChoice => Box::new(RandomChoice::new(conns)),
            PolicyType::RoundRobin => Box::new(RoundRobin::new(conns)),
        }
    }
}
