pub mod apply;
pub mod checker;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod gen;
pub mod inspect;
pub mod manager;
pub mod naming;
pub mod privilege;
pub mod reset;
pub mod validate;

pub use error::{Error, Result};
