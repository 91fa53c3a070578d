//! Configuration loading and management
//!
//! # Example Config
//!
//! ```toml
//! [store]
//! path = "/var/lib/leasehold/state.db"
//! persist_history = true
//!
//! [[environments]]
//! id = "prime-staging"
//! name = "Prime"
//!
//! [[publishers]]
//! id = "1689467"
//! name = "SMB"
//! metadata = { type = "smb", domain = "pushsmb.taboola.qa" }
//! ```
//!
//! # Module Structure
//!
//! - `types`: Configuration structure definitions
//! - `load`: Loading from files and environment, layer merging
//! - `validate`: Catalog validation

mod load;
mod types;
mod validate;

pub use load::{
    global_config_path, load_config, load_config_with, project_config_path, LoadOptions, ENV_DB,
    ENV_PERSIST_HISTORY,
};
pub use types::{Config, ResourceSpec, StoreConfig};
