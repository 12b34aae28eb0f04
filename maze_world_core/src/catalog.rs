use std::collections::{BTreeMap, BTreeSet};

use crate::{EntityKind, MapError};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Variant {
    asset: String,
    /// Third-from-last path component; goals can be filtered on it.
    subtree: Option<String>,
}

/// Names and asset variants available for each entity kind, plus the
/// asset → color table.
///
/// Ordered maps keep random picks reproducible under a fixed seed.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    entries: BTreeMap<EntityKind, BTreeMap<String, Vec<Variant>>>,
    colors: BTreeMap<String, String>,
    goal_subtrees: BTreeSet<String>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from asset paths such as
    /// `assets/goal/fruit/apple/apple_2.urdf`.
    ///
    /// The text before the last `_` groups the variants of one name; the
    /// kind is the first path component naming an entity kind, and the name
    /// is the last component of the group key. Paths that fit neither rule
    /// are skipped.
    pub fn from_asset_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        paths.sort();
        let mut catalog = AssetCatalog::new();
        for path in paths {
            let Some((key, _)) = path.rsplit_once('_') else {
                tracing::debug!(%path, "asset path has no variant suffix");
                continue;
            };
            let Some(kind) = key.split('/').find_map(|part| part.parse::<EntityKind>().ok())
            else {
                tracing::debug!(%path, "asset path names no entity kind");
                continue;
            };
            let name = key.rsplit('/').next().unwrap_or(key).to_string();
            catalog.insert_variant(kind, name, path);
        }
        catalog
    }

    pub fn insert_variant(
        &mut self,
        kind: EntityKind,
        name: impl Into<String>,
        asset: impl Into<String>,
    ) {
        let asset = asset.into();
        let subtree = asset.rsplit('/').nth(2).map(str::to_string);
        self.entries
            .entry(kind)
            .or_default()
            .entry(name.into())
            .or_default()
            .push(Variant { asset, subtree });
    }

    pub fn insert_color(&mut self, asset: impl Into<String>, color: impl Into<String>) {
        self.colors.insert(asset.into(), color.into());
    }

    /// Parses a property table of `asset color` lines. Blank lines and lines
    /// starting with `//` are skipped; asset keys are joined onto `root`.
    ///
    /// Returns the number of entries read.
    pub fn load_color_table(&mut self, root: &str, text: &str) -> Result<usize, MapError> {
        let mut loaded = 0;
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with("//") {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(asset), Some(color)) = (fields.next(), fields.next()) else {
                return Err(MapError::CatalogParse {
                    line_number: index + 1,
                    line: line.to_string(),
                });
            };
            let key = if root.is_empty() {
                asset.to_string()
            } else {
                format!("{}/{}", root.trim_end_matches('/'), asset)
            };
            self.colors.insert(key, color.to_string());
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Restricts goals to those under the given subtrees. An empty list
    /// allows every goal.
    pub fn set_goal_subtrees<I, S>(&mut self, subtrees: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goal_subtrees = subtrees.into_iter().map(Into::into).collect();
    }

    fn allows(&self, kind: EntityKind, variant: &Variant) -> bool {
        kind != EntityKind::Goal
            || self.goal_subtrees.is_empty()
            || variant
                .subtree
                .as_ref()
                .is_some_and(|s| self.goal_subtrees.contains(s))
    }

    /// All names currently selectable for `kind`, sorted.
    pub fn possible_names(&self, kind: EntityKind) -> Vec<&str> {
        self.entries
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|(_, variants)| variants.iter().any(|v| self.allows(kind, v)))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Asset variants for one name, in path order.
    pub fn variants(&self, kind: EntityKind, name: &str) -> Vec<&str> {
        self.entries
            .get(&kind)
            .and_then(|names| names.get(name))
            .into_iter()
            .flatten()
            .filter(|v| self.allows(kind, v))
            .map(|v| v.asset.as_str())
            .collect()
    }

    pub fn color_of(&self, asset: &str) -> Result<&str, MapError> {
        self.colors
            .get(asset)
            .map(String::as_str)
            .ok_or_else(|| MapError::UnknownAsset {
                asset: asset.to_string(),
            })
    }

    /// Every distinct color, sorted.
    pub fn all_colors(&self) -> Vec<&str> {
        let distinct: BTreeSet<&str> = self.colors.values().map(String::as_str).collect();
        distinct.into_iter().collect()
    }
}
