pub mod factory;
pub mod random_choice;
pub mod round_robin;

pub use random_choice::RandomChoice;
pub use round_robin::RoundRobin;
