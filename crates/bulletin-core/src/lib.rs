pub mod compose;
pub mod config;
pub mod deploy;
pub mod error;
pub mod health;
pub mod io;
pub mod manifest;
pub mod patcher;
pub mod paths;
pub mod pipeline;
pub mod provision;
pub mod routes;
pub mod runner;
pub mod schema;
pub mod smoke;
pub mod testplan;
pub mod types;

pub use error::{DeployError, Result};
