pub mod compile;
pub mod configs;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod server;
pub mod topology;

pub use compile::compile;
pub use error::CoordinatorError;
pub use server::ControlPlane;
pub use topology::{CapacityPolicy, Node, Tree, build_tree};
