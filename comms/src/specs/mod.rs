pub mod command;
pub mod node;
pub mod training;

pub use command::{Command, RunMode};
pub use node::{LocalConfig, NodeDesc, NodeRecord};
pub use training::TrainParams;
