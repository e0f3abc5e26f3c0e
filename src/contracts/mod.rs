//! Wire contracts, grouped by the pipeline boundary they cross

pub mod auth;
pub mod checks;
pub mod delegation;
pub mod events;
pub mod hooks;
pub mod node;
pub mod run;
pub mod validation;
