pub mod config;
pub mod fetch;
pub mod process;
pub mod publish;
pub mod sink;
