pub mod bar_config;
pub mod position;
pub mod probe_options;

pub use bar_config::*;
pub use position::*;
pub use probe_options::*;
