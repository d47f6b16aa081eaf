pub mod plan;
pub mod ports;
pub mod session;
