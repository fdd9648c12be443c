//! HTTP API handlers for camel-api

pub mod accounts;
pub mod auth;
pub mod facts;
pub mod health;
pub mod predictions;

pub use accounts::{login, me, signup};
pub use auth::{auth_middleware, CurrentUser};
pub use facts::get_facts;
pub use health::health_routes;
pub use predictions::{classify, delete_prediction, get_prediction, history};
