pub mod control;
pub mod error;
pub mod handler;
pub mod header;
pub mod launcher;
pub mod store;

pub use control::KEEPALIVE_INTERVAL;
pub use error::AgentError;
pub use handler::{CommandHandler, Flow};
pub use launcher::Launcher;
pub use store::ConfigStore;
