//! Core domain types for kustbench generation runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{KustbenchError, Result};

/// Root path of the built-in benchmark scenario.
pub const BENCHMARK_ROOT_PATH: &str = "testdata";

/// Root synthetic id of the built-in benchmark scenario.
pub const BENCHMARK_ROOT_ID: &str = "res";

// ---------------------------------------------------------------------------
// GenerationProfile
// ---------------------------------------------------------------------------

/// Parameters that shape a single tree node and its children.
///
/// One profile is one row of a [`ConfigurationTable`]. Every field defaults to
/// zero/empty so a TOML row only needs to name what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationProfile {
    /// Resources written as `res<i>.yaml` side files and referenced by path.
    #[serde(default, rename = "file_resources")]
    pub file_resource_count: usize,

    /// Child subtrees (`res<i>/`) recursed into at the next depth.
    #[serde(default, rename = "inline_resources")]
    pub inline_resource_count: usize,

    /// Patch documents, alternating full-resource and operation-list encodings.
    #[serde(default, rename = "patches")]
    pub patch_count: usize,

    /// Whether the node declares `namespace: <synthetic id>`.
    #[serde(default)]
    pub namespaced: bool,

    /// Name prefix applied to every resource under this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,

    /// Name suffix applied to every resource under this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_suffix: Option<String>,

    /// Labels applied to every resource under this node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_labels: BTreeMap<String, String>,

    /// Annotations applied to every resource under this node.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub common_annotations: BTreeMap<String, String>,
}

impl GenerationProfile {
    /// The name prefix, treating an empty string as unset.
    pub fn prefix(&self) -> Option<&str> {
        self.name_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// The name suffix, treating an empty string as unset.
    pub fn suffix(&self) -> Option<&str> {
        self.name_suffix.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// ConfigurationTable
// ---------------------------------------------------------------------------

/// Depth-indexed, read-only sequence of generation profiles.
///
/// Row `d` configures every node at recursion depth `d`. Recursion from depth
/// 0 stops at the first row with no inline children, so construction requires
/// such a row to exist. Rows after it are kept but never reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigurationTable {
    profiles: Vec<GenerationProfile>,
    #[serde(skip)]
    max_depth: usize,
}

impl ConfigurationTable {
    /// Build a table, validating that recursion over it terminates in bounds.
    pub fn new(profiles: Vec<GenerationProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(KustbenchError::validation(
                "configuration table must contain at least one profile",
            ));
        }

        let Some(max_depth) = profiles
            .iter()
            .position(|profile| profile.inline_resource_count == 0)
        else {
            return Err(KustbenchError::validation(format!(
                "every profile schedules inline resources; \
                 recursion would reach depth {} past the end of the table",
                profiles.len()
            )));
        };

        Ok(Self {
            profiles,
            max_depth,
        })
    }

    /// The five-level scenario used to benchmark the build engine.
    pub fn benchmark() -> Self {
        let labels = BTreeMap::from([("foo".to_string(), "bar".to_string())]);
        let annotations = BTreeMap::from([("baz".to_string(), "blatti".to_string())]);

        Self {
            max_depth: 4,
            profiles: vec![
                GenerationProfile {
                    inline_resource_count: 4,
                    name_prefix: Some("foo-".into()),
                    name_suffix: Some("-bar".into()),
                    common_labels: labels,
                    common_annotations: annotations,
                    ..Default::default()
                },
                GenerationProfile {
                    inline_resource_count: 100,
                    ..Default::default()
                },
                GenerationProfile {
                    inline_resource_count: 3,
                    ..Default::default()
                },
                GenerationProfile {
                    inline_resource_count: 2,
                    namespaced: true,
                    file_resource_count: 30,
                    patch_count: 10,
                    ..Default::default()
                },
                GenerationProfile {
                    file_resource_count: 2,
                    ..Default::default()
                },
            ],
        }
    }

    /// Look up the profile for `depth`.
    pub fn profile(&self, depth: usize) -> Result<&GenerationProfile> {
        self.profiles
            .get(depth)
            .ok_or(KustbenchError::DepthOutOfRange {
                depth,
                len: self.profiles.len(),
            })
    }

    /// Number of rows (one per depth).
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Always `false` for a validated table.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Deepest depth recursion from depth 0 can reach.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Iterate over the profiles in depth order.
    pub fn iter(&self) -> impl Iterator<Item = &GenerationProfile> {
        self.profiles.iter()
    }

    /// Compute what one generation pass from depth 0 will write.
    pub fn footprint(&self) -> TreeFootprint {
        let mut footprint = TreeFootprint::default();
        let mut nodes_at_depth: u64 = 1;

        for profile in &self.profiles {
            footprint.nodes = footprint.nodes.saturating_add(nodes_at_depth);
            footprint.file_resources = footprint
                .file_resources
                .saturating_add(nodes_at_depth.saturating_mul(profile.file_resource_count as u64));
            footprint.patch_files = footprint
                .patch_files
                .saturating_add(nodes_at_depth.saturating_mul(profile.patch_count as u64));

            nodes_at_depth = nodes_at_depth.saturating_mul(profile.inline_resource_count as u64);
            if nodes_at_depth == 0 {
                break;
            }
        }

        footprint
    }
}

impl Default for ConfigurationTable {
    fn default() -> Self {
        Self::benchmark()
    }
}

// ---------------------------------------------------------------------------
// TreeFootprint
// ---------------------------------------------------------------------------

/// Expected size of a generated tree, derived from the table alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeFootprint {
    /// Node directories, each holding one `kustomization.yaml`.
    pub nodes: u64,
    /// `res<i>.yaml` files.
    pub file_resources: u64,
    /// `patch<i>.yaml` / `patch<i>.json` files.
    pub patch_files: u64,
}

impl TreeFootprint {
    /// Total files written (root documents + resources + patches).
    pub fn total_files(&self) -> u64 {
        self.nodes + self.file_resources + self.patch_files
    }
}

// ---------------------------------------------------------------------------
// SyntheticId
// ---------------------------------------------------------------------------

/// Hierarchical, human-legible identity of a generated node.
///
/// Children extend their parent's id with `-<index>`, so ids are unique across
/// a tree and encode the path from the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntheticId(String);

impl SyntheticId {
    /// Create a root identity. The id must be non-empty.
    pub fn root(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(KustbenchError::validation("synthetic id must not be empty"));
        }
        Ok(Self(id))
    }

    /// Root identity of the built-in benchmark scenario.
    pub fn benchmark_root() -> Self {
        Self(BENCHMARK_ROOT_ID.into())
    }

    /// Identity of the child subtree at `index`.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}-{index}", self.0))
    }

    /// Name of the resource (or patch target) at `index` under this node.
    pub fn resource_name(&self, index: usize) -> String {
        format!("{}-{index}", self.0)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SyntheticId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
