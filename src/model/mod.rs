pub mod task;
pub mod space;
pub mod phase;
pub mod project;
pub mod formula;
pub mod config;
pub mod prefs;
pub mod store;

pub use task::*;
pub use space::*;
pub use phase::*;
pub use project::*;
pub use formula::*;
pub use config::*;
pub use prefs::*;
pub use store::*;
