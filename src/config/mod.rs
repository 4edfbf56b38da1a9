pub mod config_base;
pub mod connection;
pub mod schema;
pub mod user;

pub use config_base::{Config, Row};
pub use connection::{Auth, Connection, ConnectionType};
pub use schema::Schema;
pub use user::{Permission, SchemaPermission, User};
