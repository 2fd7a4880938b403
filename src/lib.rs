pub mod app;
pub mod error;
pub mod mobility;
pub mod monitor;
pub mod net;
pub mod plan;
pub mod proto;
pub mod queue;
pub mod scenario;
pub mod sim;
pub mod trace;

#[cfg(test)]
mod test;
