mod fleet;

pub use fleet::{CoordConfig, MainConfig, SystemConfig, save_env_file};
