pub mod config;
pub mod coordinator;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod logging;
pub mod normalize;
pub mod robots;
pub mod seeds;
pub mod stats;
