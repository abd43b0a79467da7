//! Batch migration of recipe images to OCI

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::annex::AnnexQuery;
use crate::convert::ImageConverter;
use crate::error::{MigrateError, Result};
use crate::naming::{self, NameDeriver};
use crate::recipe;

const RECIPE_PREFIX: &str = "Singularity.";

/// Fixed inputs of a migration run
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    pub repo_dir: PathBuf,
    /// Root scanned recursively for recipe files
    pub images_dir: PathBuf,
    /// Root receiving `{family}/{stem}.oci` and `.sif`
    pub images_oci_dir: PathBuf,
    pub skip_failures: bool,
    pub dry_run: bool,
    /// Only migrate these families when non-empty
    pub families: Vec<String>,
}

impl MigratorConfig {
    pub fn new(
        repo_dir: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
        images_oci_dir: impl Into<PathBuf>,
    ) -> Self {
        MigratorConfig {
            repo_dir: repo_dir.into(),
            images_dir: images_dir.into(),
            images_oci_dir: images_oci_dir.into(),
            skip_failures: false,
            dry_run: false,
            families: Vec::new(),
        }
    }
}

/// Outcome for one recipe file.
///
/// Only built through [`MigrationResult::succeeded`], [`MigrationResult::planned`]
/// and [`MigrationResult::failed`]: a success never carries an error and a
/// failure never carries image paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    singularity_file: PathBuf,
    success: bool,
    planned: bool,
    oci_image_path: Option<PathBuf>,
    sif_image_path: Option<PathBuf>,
    error_message: Option<String>,
}

impl MigrationResult {
    pub fn succeeded(
        singularity_file: PathBuf,
        oci_image_path: PathBuf,
        sif_image_path: PathBuf,
    ) -> Self {
        MigrationResult {
            singularity_file,
            success: true,
            planned: false,
            oci_image_path: Some(oci_image_path),
            sif_image_path: Some(sif_image_path),
            error_message: None,
        }
    }

    /// Dry-run record: the paths that would be produced
    pub fn planned(
        singularity_file: PathBuf,
        oci_image_path: PathBuf,
        sif_image_path: PathBuf,
    ) -> Self {
        MigrationResult {
            planned: true,
            ..Self::succeeded(singularity_file, oci_image_path, sif_image_path)
        }
    }

    pub fn failed(singularity_file: PathBuf, error_message: impl Into<String>) -> Self {
        MigrationResult {
            singularity_file,
            success: false,
            planned: false,
            oci_image_path: None,
            sif_image_path: None,
            error_message: Some(error_message.into()),
        }
    }

    pub fn singularity_file(&self) -> &Path {
        &self.singularity_file
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn is_planned(&self) -> bool {
        self.planned
    }

    pub fn oci_image_path(&self) -> Option<&Path> {
        self.oci_image_path.as_deref()
    }

    pub fn sif_image_path(&self) -> Option<&Path> {
        self.sif_image_path.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Drives parse, naming, conversion and annex verification per recipe
pub struct OciMigrator<C, A> {
    config: MigratorConfig,
    names: NameDeriver,
    converter: C,
    annex: A,
}

impl<C: ImageConverter, A: AnnexQuery> OciMigrator<C, A> {
    pub fn new(config: MigratorConfig, converter: C, annex: A) -> Self {
        let names = NameDeriver::new(config.images_oci_dir.clone());
        OciMigrator {
            config,
            names,
            converter,
            annex,
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Recipe files under the images directory, sorted by path
    pub fn discover_recipes(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.images_dir;
        if !root.is_dir() {
            return Err(MigrateError::Io {
                path: root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "images directory not found",
                ),
            });
        }

        let mut recipes = Vec::new();
        // Symlinks are not followed: unfetched annexed images are dangling links
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_recipe = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(RECIPE_PREFIX));
            if is_recipe && self.family_selected(entry.path()) {
                recipes.push(entry.into_path());
            }
        }

        recipes.sort();
        Ok(recipes)
    }

    fn family_selected(&self, recipe: &Path) -> bool {
        if self.config.families.is_empty() {
            return true;
        }
        naming::family(recipe).is_some_and(|family| self.config.families.contains(&family))
    }

    /// Migrate every eligible recipe.
    ///
    /// With `skip_failures` unset the first conversion failure ends the run
    /// with [`MigrateError::FatalAbort`], which carries the results so far.
    pub fn run(&self) -> Result<Vec<MigrationResult>> {
        let recipes = self.discover_recipes()?;
        info!(
            "Found {} recipe file(s) under {}",
            recipes.len(),
            self.config.images_dir.display()
        );

        let mut results = Vec::new();
        for (index, recipe_path) in recipes.iter().enumerate() {
            let Some(result) = self.migrate_one(recipe_path) else {
                continue;
            };

            let failure = result.error_message().map(str::to_string);
            results.push(result);

            if let Some(message) = failure {
                if !self.config.skip_failures {
                    return Err(MigrateError::FatalAbort {
                        file: recipe_path.clone(),
                        processed: index + 1,
                        message,
                        results,
                    });
                }
            }
        }

        let failed = results.iter().filter(|r| !r.success()).count();
        info!("Migration finished: {} result(s), {} failed", results.len(), failed);
        Ok(results)
    }

    /// Process a single recipe, `None` when it is not a migration candidate
    pub fn migrate_one(&self, recipe_path: &Path) -> Option<MigrationResult> {
        let identity = recipe::parse_recipe(recipe_path)?;

        let oci_path = self.names.oci_image_path(recipe_path);
        let sif_path = self.names.sif_image_path(recipe_path);

        if self.config.dry_run {
            info!("Would convert {} to {}", identity.docker_url, oci_path.display());
            return Some(MigrationResult::planned(recipe_path.to_path_buf(), oci_path, sif_path));
        }

        info!(
            namespace = %identity.namespace,
            image = %identity.image,
            "Converting {} ({})",
            recipe_path.display(),
            identity.docker_url
        );
        if let Err(err) = self.converter.convert(&identity, &oci_path, &sif_path) {
            warn!(recipe = %recipe_path.display(), "{}", err);
            return Some(MigrationResult::failed(recipe_path.to_path_buf(), err.to_string()));
        }

        if self.annex.verify_annex_urls(&oci_path) {
            debug!("{} is annexed with known locations", oci_path.display());
        } else {
            warn!("{} has no known annex locations yet", oci_path.display());
        }

        Some(MigrationResult::succeeded(recipe_path.to_path_buf(), oci_path, sif_path))
    }
}
