//! Output image names derived from recipe file locations

use std::path::{Path, PathBuf};

const RECIPE_PREFIX: &str = "Singularity.";

/// Derives OCI and SIF artifact names from a recipe path.
///
/// Names depend only on the path: the parent directory is the family and
/// the file name without its `Singularity.` prefix is the stem.
#[derive(Debug, Clone)]
pub struct NameDeriver {
    images_oci_dir: PathBuf,
}

impl NameDeriver {
    pub fn new(images_oci_dir: impl Into<PathBuf>) -> Self {
        NameDeriver {
            images_oci_dir: images_oci_dir.into(),
        }
    }

    /// `{family}/{stem}.oci`, relative to the OCI images directory
    pub fn get_oci_image_name(&self, recipe: &Path) -> PathBuf {
        image_name(recipe, "oci")
    }

    /// `{family}/{stem}.sif`, relative to the OCI images directory
    pub fn get_sif_image_name(&self, recipe: &Path) -> PathBuf {
        image_name(recipe, "sif")
    }

    pub fn oci_image_path(&self, recipe: &Path) -> PathBuf {
        self.images_oci_dir.join(self.get_oci_image_name(recipe))
    }

    pub fn sif_image_path(&self, recipe: &Path) -> PathBuf {
        self.images_oci_dir.join(self.get_sif_image_name(recipe))
    }
}

/// Name of the directory holding the recipe
pub fn family(recipe: &Path) -> Option<String> {
    recipe
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
}

/// Recipe file name with the `Singularity.` prefix removed
pub fn stem(recipe: &Path) -> String {
    let file_name = recipe
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match file_name.strip_prefix(RECIPE_PREFIX) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

fn image_name(recipe: &Path, extension: &str) -> PathBuf {
    // Appended rather than set_extension: stems like "tool--1.2.3" contain dots
    let file_name = format!("{}.{}", stem(recipe), extension);
    match family(recipe) {
        Some(family) => Path::new(&family).join(file_name),
        None => PathBuf::from(file_name),
    }
}
