pub mod config;
pub mod memory;
pub mod postgres;

pub use config::{ConnectionConfig, ConnectionTarget};
pub use memory::MemoryClient;
pub use postgres::PgClient;
