//! Image conversion through external container tools

use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::process;
use crate::recipe::RecipeIdentity;

/// Produces the OCI image and the SIF image derived from it
pub trait ImageConverter {
    /// Failures come back as `MigrateError::ConversionFailed`, never as panics.
    fn convert(&self, identity: &RecipeIdentity, oci_path: &Path, sif_path: &Path) -> Result<()>;
}

/// Converter backed by `skopeo copy` and `apptainer build`
#[derive(Debug, Clone)]
pub struct ContainerTool {
    copy_tool: String,
    build_tool: String,
    timeout: Duration,
}

impl ContainerTool {
    pub fn new(
        copy_tool: impl Into<String>,
        build_tool: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        ContainerTool {
            copy_tool: copy_tool.into(),
            build_tool: build_tool.into(),
            timeout,
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        let output = process::run(program, args, None, self.timeout)
            .map_err(|err| MigrateError::ConversionFailed(err.to_string()))?;
        if !output.stderr.trim().is_empty() {
            debug!("{} stderr: {}", program, output.stderr.trim());
        }
        Ok(())
    }
}

impl ImageConverter for ContainerTool {
    fn convert(&self, identity: &RecipeIdentity, oci_path: &Path, sif_path: &Path) -> Result<()> {
        for path in [oci_path, sif_path] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|err| {
                    MigrateError::ConversionFailed(format!(
                        "cannot create {}: {}",
                        parent.display(),
                        err
                    ))
                })?;
            }
        }

        let source = docker_source(identity);
        let oci_ref = oci_reference(oci_path, identity);

        info!("Copying {} to {}", source, oci_ref);
        self.run(&self.copy_tool, &["copy", source.as_str(), oci_ref.as_str()])?;

        let sif = sif_path.to_string_lossy();
        info!("Building {} from {}", sif, oci_ref);
        self.run(&self.build_tool, &["build", "--force", &*sif, oci_ref.as_str()])
    }
}

fn docker_source(identity: &RecipeIdentity) -> String {
    if identity.tag.is_some() {
        format!("docker://{}", identity.docker_url)
    } else {
        format!("docker://{}:latest", identity.docker_url)
    }
}

/// `oci:<layout dir>:<tag>` transport reference
fn oci_reference(oci_path: &Path, identity: &RecipeIdentity) -> String {
    format!("oci:{}:{}", oci_path.display(), identity.tag_or_latest())
}
