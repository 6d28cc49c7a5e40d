pub mod config_io;
pub mod kv;
pub mod lock;
pub mod recovery;
pub mod seed;
pub mod snapshot;
pub mod workspace_io;
