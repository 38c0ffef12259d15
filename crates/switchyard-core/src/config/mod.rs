//! Pipeline configuration

pub mod loader;
pub mod types;

pub use loader::{find_config, load_config, load_config_from_dir};
pub use types::{PipelineConfig, PipelineEntry, TOPO_DEP_PREFIX};
