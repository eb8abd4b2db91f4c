//! Deployment descriptor loader (strict parsing).

mod builder;
pub mod schema;

use std::fs;
use std::path::Path;

use axisdesc_core::error::{AxisError, Result};

pub use builder::build_tree;
pub use schema::{
    DeploymentConfig, EndpointConfig, ModuleConfig, OperationConfig, PolicyConfig,
    ServiceConfig, ServiceGroupConfig,
};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<DeploymentConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        AxisError::Internal(format!("read descriptor {} failed: {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<DeploymentConfig> {
    let cfg: DeploymentConfig = serde_yaml::from_str(s)
        .map_err(|e| AxisError::BadDescriptor(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
