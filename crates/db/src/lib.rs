pub mod chunks;
pub mod connection;
pub mod edges;
pub mod files;
pub mod retry;
pub mod schema;
pub mod subscriptions;

pub use connection::{DbError, GraphStore, Result, default_cache_dir, default_config_dir, default_data_dir, default_port};
pub use retry::{is_transient, with_retry};
pub use schema::{DEFAULT_VECTOR_DIM, edges_schema, file_chunks_schema, files_schema, subscriptions_schema};
