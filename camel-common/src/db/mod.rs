//! Database bootstrap and service settings

pub mod init;
pub mod settings;

pub use init::{create_schema, init_database};
pub use settings::{get_setting, set_setting};
