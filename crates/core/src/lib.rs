pub mod alert;
pub mod config;

pub use alert::*;
pub use config::Config;
