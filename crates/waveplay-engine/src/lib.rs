pub mod analysis;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod queue;
pub mod resample;
pub mod session;
pub mod sink;
