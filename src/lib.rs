pub mod artifact;
pub mod config;
pub mod controls;
pub mod display;
pub mod history;
pub mod logging;
pub mod model;
pub mod retry;
pub mod sample;
pub mod session;
pub mod simulator;
pub mod storage;
