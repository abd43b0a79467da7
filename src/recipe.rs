//! Parsing of legacy Singularity recipe files

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Comment line written by the recipe generator
const GENERATOR_MARKER: &str = "Automagically prepared for ReproNim/containers distribution";

const FROM_DIRECTIVE: &str = "From:";

/// Image identity named by a recipe's `From:` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIdentity {
    pub namespace: String,
    pub image: String,
    pub tag: Option<String>,
    /// Verbatim `From:` reference
    pub docker_url: String,
}

impl RecipeIdentity {
    /// Tag to use when addressing the image, `latest` when the recipe has none
    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }
}

/// Migration-safety gate: only recipes carrying the generator marker
/// comment are eligible, hand-written ones are never touched.
pub fn is_generated(text: &str) -> bool {
    text.lines()
        .filter(|line| line.trim_start().starts_with('#'))
        .any(|line| line.contains(GENERATOR_MARKER))
}

/// Read and parse a recipe file, `None` when it is not a migration candidate
pub fn parse_recipe(path: &Path) -> Option<RecipeIdentity> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path.display(), "Failed to read recipe: {}", err);
            return None;
        }
    };

    if !is_generated(&text) {
        debug!(path = %path.display(), "Skipping recipe without generator marker");
        return None;
    }

    let identity = parse_recipe_text(&text);
    if identity.is_none() {
        debug!(path = %path.display(), "Skipping recipe without usable From: line");
    }
    identity
}

/// Extract the identity from the first `From:` line of recipe text
pub fn parse_recipe_text(text: &str) -> Option<RecipeIdentity> {
    let reference = text.lines().find_map(|line| {
        line.trim()
            .strip_prefix(FROM_DIRECTIVE)
            .map(str::trim)
            .filter(|r| !r.is_empty())
    })?;

    parse_reference(reference)
}

/// Split `namespace/image[:tag]` into its parts.
///
/// Longer references such as `registry/namespace/image:tag` keep only the
/// last two segments, so the registry is dropped rather than kept in the
/// namespace.
fn parse_reference(reference: &str) -> Option<RecipeIdentity> {
    let segments: Vec<&str> = reference.split('/').collect();
    if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    if segments.len() > 2 {
        warn!(reference, "Registry prefix dropped from reference");
    }

    let namespace = segments[segments.len() - 2];
    let (image, tag) = match segments[segments.len() - 1].split_once(':') {
        Some((image, tag)) => (image, Some(tag.to_string())),
        None => (segments[segments.len() - 1], None),
    };
    if image.is_empty() {
        return None;
    }

    Some(RecipeIdentity {
        namespace: namespace.to_string(),
        image: image.to_string(),
        tag,
        docker_url: reference.to_string(),
    })
}
