//! ============================================================================
//! Icon Candidates - historical naming conventions for trait icons
//! ============================================================================
//! Remote icon paths get renamed and re-versioned between content sets and
//! there is no authoritative index, so a trait icon is found by probing an
//! ordered list of guesses. Everything here is pure string work.
//! ============================================================================

use std::collections::HashSet;
use url::Url;

use crate::catalog::normalize_token;

const TRAIT_ICON_DIR: &str = "assets/ux/traiticons";

/// Cache key for a trait name: `"Star Guardian"` and `"StarGuardian"` share one
pub fn trait_cache_key(name: &str) -> String {
    normalize_token(name)
}

/// Split on separators and lower→upper camel boundaries
fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `"StarGuardian"` → `"star_guardian"`
pub fn snake_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// `"Star Guardian"` → `"starguardian"`
pub fn flat_lower(name: &str) -> String {
    words(name).concat().to_lowercase()
}

/// `"Star Guardian"` → `"StarGuardian"`
pub fn camel_preserved(name: &str) -> String {
    words(name).concat()
}

fn tex_to_png(path: &str) -> String {
    match path.strip_suffix(".tex") {
        Some(stem) => format!("{}.png", stem),
        None => path.to_string(),
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}

/// Turn a game asset path (`ASSETS/UX/...tex`) or absolute URL into a
/// fetchable lowercase `.png` URL under `asset_base`
pub fn normalize_asset_path(asset_base: &str, path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(mut url) = Url::parse(trimmed) {
        let normalized = tex_to_png(&url.path().to_lowercase());
        url.set_path(&normalized);
        return Some(url.to_string());
    }

    let base = Url::parse(&with_trailing_slash(asset_base)).ok()?;
    let relative = tex_to_png(&trimmed.to_lowercase());
    base.join(relative.trim_start_matches('/'))
        .ok()
        .map(|url| url.to_string())
}

/// The caller's hint as given (when absolute) plus its normalized form
pub fn hint_variants(asset_base: &str, hint: &str) -> Vec<String> {
    let mut variants = Vec::new();
    let trimmed = hint.trim();
    if trimmed.is_empty() {
        return variants;
    }
    if Url::parse(trimmed).is_ok() {
        variants.push(trimmed.to_string());
    }
    if let Some(normalized) = normalize_asset_path(asset_base, trimmed) {
        variants.push(normalized);
    }
    variants
}

/// Ordered probe list for a trait icon.
///
/// Versioned guesses come first, newest content set first, each crossed with
/// every naming convention. The caller's hint follows, then unversioned
/// fallbacks. Duplicates are removed keeping the first position.
pub fn trait_icon_candidates(
    name: &str,
    hint: Option<&str>,
    asset_base: &str,
    versions: &[u32],
) -> Vec<String> {
    let base = with_trailing_slash(asset_base);
    let styles = [snake_case(name), flat_lower(name), camel_preserved(name)];
    let mut versions = versions.to_vec();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();

    let mut candidates = Vec::new();
    if !styles[0].is_empty() {
        for version in &versions {
            for style in &styles {
                candidates.push(format!(
                    "{base}{TRAIT_ICON_DIR}/trait_icon_{version}_{style}.tft_set{version}.png"
                ));
                candidates.push(format!(
                    "{base}{TRAIT_ICON_DIR}/trait_icon_{version}_{style}.png"
                ));
            }
        }
    }

    if let Some(hint) = hint {
        candidates.extend(hint_variants(&base, hint));
    }

    if !styles[0].is_empty() {
        let (snake, flat) = (&styles[0], &styles[1]);
        candidates.push(format!("{base}{TRAIT_ICON_DIR}/trait_icon_{snake}.png"));
        candidates.push(format!("{base}{TRAIT_ICON_DIR}/{snake}.png"));
        candidates.push(format!("{base}{TRAIT_ICON_DIR}/{flat}.png"));
    }

    let mut seen = HashSet::new();
    candidates.retain(|url| seen.insert(url.clone()));
    candidates
}
