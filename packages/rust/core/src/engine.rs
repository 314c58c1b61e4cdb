//! Build engines that consume a generated tree.
//!
//! The harness only depends on the [`BuildEngine`] trait. [`ResourceRenderer`]
//! is a small reference engine: it resolves the directives the generator
//! emits (resources, both patch encodings, namespace, name prefix/suffix,
//! common labels/annotations) and renders a multi-document YAML stream. It is
//! not a general overlay merger.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, instrument, trace};

use kustbench_shared::{KustbenchError, Result};
use kustbench_storage::FileSystem;

use crate::document::KUSTOMIZATION_FILE;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Resolves the configuration tree rooted at a path into rendered bytes.
pub trait BuildEngine {
    /// Render the tree at `root`.
    fn execute(&self, fs: &dyn FileSystem, root: &str) -> Result<Vec<u8>>;

    /// Human-readable engine name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Root document schema
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Kustomization {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name_prefix: Option<String>,
    #[serde(default)]
    name_suffix: Option<String>,
    #[serde(default)]
    common_labels: BTreeMap<String, String>,
    #[serde(default)]
    common_annotations: BTreeMap<String, String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    patches: Vec<PatchRef>,
}

#[derive(Debug, Deserialize)]
struct PatchRef {
    path: String,
    #[serde(default)]
    target: Option<Selector>,
}

#[derive(Debug, Deserialize)]
struct Selector {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl Selector {
    fn matches(&self, resource: &Value) -> bool {
        let kind_ok = self
            .kind
            .as_deref()
            .is_none_or(|kind| resource["kind"].as_str() == Some(kind));
        let name_ok = self
            .name
            .as_deref()
            .is_none_or(|name| resource_name(resource) == Some(name));
        let version_ok = self.version.as_deref().is_none_or(|version| {
            resource["apiVersion"]
                .as_str()
                .map(|api| api.rsplit('/').next().unwrap_or(api) == version)
                .unwrap_or(false)
        });
        kind_ok && name_ok && version_ok
    }
}

/// One JSON operation-list entry.
#[derive(Debug, Deserialize)]
struct PatchOp {
    op: String,
    path: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// ResourceRenderer
// ---------------------------------------------------------------------------

/// Reference engine rendering generated trees to a YAML stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceRenderer;

impl ResourceRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the node at `dir` into its fully transformed resources.
    fn render_node(&self, fs: &dyn FileSystem, dir: &str) -> Result<Vec<Value>> {
        let doc_path = fs.join(dir, KUSTOMIZATION_FILE);
        let kustomization = load_kustomization(fs, &doc_path)?;

        let mut resources = Vec::new();
        for entry in &kustomization.resources {
            if entry.split('/').any(|segment| segment == "..") {
                return Err(KustbenchError::engine(format!(
                    "{doc_path}: resource '{entry}' escapes its directory"
                )));
            }

            let path = fs.join(dir, entry);
            if fs.is_dir(&path) {
                resources.extend(self.render_node(fs, &path)?);
            } else {
                resources.push(load_resource(fs, &path)?);
            }
        }

        for patch in &kustomization.patches {
            apply_patch(fs, dir, patch, &mut resources)?;
        }

        for resource in &mut resources {
            transform(resource, &kustomization);
        }

        trace!(dir, count = resources.len(), "rendered node");
        Ok(resources)
    }
}

impl BuildEngine for ResourceRenderer {
    #[instrument(skip_all, fields(engine = "resource-renderer", root = root))]
    fn execute(&self, fs: &dyn FileSystem, root: &str) -> Result<Vec<u8>> {
        let resources = self.render_node(fs, root)?;

        let mut out = String::new();
        for (i, resource) in resources.iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            let rendered = serde_yaml::to_string(resource)
                .map_err(|e| KustbenchError::engine(format!("failed to render resource: {e}")))?;
            out.push_str(&rendered);
        }

        debug!(resources = resources.len(), bytes = out.len(), "build complete");
        Ok(out.into_bytes())
    }

    fn name(&self) -> &str {
        "resource-renderer"
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn read_text(fs: &dyn FileSystem, path: &str) -> Result<String> {
    let bytes = fs.read_file(path)?;
    String::from_utf8(bytes).map_err(|e| KustbenchError::document(path, format!("not UTF-8: {e}")))
}

fn load_kustomization(fs: &dyn FileSystem, path: &str) -> Result<Kustomization> {
    let text = read_text(fs, path)?;
    if text.trim().is_empty() {
        return Ok(Kustomization::default());
    }
    serde_yaml::from_str(&text).map_err(|e| KustbenchError::document(path, e.to_string()))
}

fn load_resource(fs: &dyn FileSystem, path: &str) -> Result<Value> {
    let text = read_text(fs, path)?;
    let resource: Value =
        serde_yaml::from_str(&text).map_err(|e| KustbenchError::document(path, e.to_string()))?;

    if !resource.is_mapping() || resource["kind"].as_str().is_none() {
        return Err(KustbenchError::document(path, "resource has no kind"));
    }
    if resource_name(&resource).is_none() {
        return Err(KustbenchError::document(path, "resource has no metadata.name"));
    }
    Ok(resource)
}

fn resource_name(resource: &Value) -> Option<&str> {
    resource["metadata"]["name"].as_str()
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

fn apply_patch(
    fs: &dyn FileSystem,
    dir: &str,
    patch: &PatchRef,
    resources: &mut [Value],
) -> Result<()> {
    let path = fs.join(dir, &patch.path);
    let text = read_text(fs, &path)?;

    match &patch.target {
        Some(selector) => {
            let ops: Vec<PatchOp> = serde_json::from_str(&text)
                .map_err(|e| KustbenchError::document(&path, e.to_string()))?;

            let mut matched = 0;
            for resource in resources.iter_mut().filter(|r| selector.matches(r)) {
                for op in &ops {
                    apply_op(resource, op).map_err(|e| {
                        KustbenchError::engine(format!("{path}: {e}"))
                    })?;
                }
                matched += 1;
            }
            if matched == 0 {
                return Err(KustbenchError::engine(format!(
                    "{path}: target {:?}/{:?} matched no resource",
                    selector.kind, selector.name
                )));
            }
        }
        None => {
            let fragment: Value = serde_yaml::from_str(&text)
                .map_err(|e| KustbenchError::document(&path, e.to_string()))?;
            let kind = fragment["kind"].as_str();
            let name = resource_name(&fragment);

            let target = resources
                .iter_mut()
                .find(|r| r["kind"].as_str() == kind && resource_name(r) == name)
                .ok_or_else(|| {
                    KustbenchError::engine(format!(
                        "{path}: no resource {}/{} to patch",
                        kind.unwrap_or("?"),
                        name.unwrap_or("?")
                    ))
                })?;
            merge(target, &fragment);
        }
    }

    trace!(patch = %path, "applied patch");
    Ok(())
}

/// Deep-merge `fragment` into `base`; mappings merge, everything else replaces.
fn merge(base: &mut Value, fragment: &Value) {
    match (base, fragment) {
        (Value::Mapping(base), Value::Mapping(fragment)) => {
            for (key, value) in fragment {
                if value.is_null() {
                    base.remove(key);
                    continue;
                }
                match base.get_mut(key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, fragment) => *base = fragment.clone(),
    }
}

/// Apply one `add`/`replace`/`remove` operation addressed by a JSON pointer.
fn apply_op(resource: &mut Value, op: &PatchOp) -> std::result::Result<(), String> {
    let mut segments: Vec<String> = op
        .path
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let last = segments
        .pop()
        .ok_or_else(|| format!("operation path '{}' has no segments", op.path))?;

    let mut parent = resource;
    for segment in &segments {
        parent = match parent {
            Value::Mapping(map) => map
                .get_mut(segment.as_str())
                .ok_or_else(|| format!("path '{}' not found", op.path))?,
            Value::Sequence(seq) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| seq.get_mut(i))
                .ok_or_else(|| format!("index '{segment}' out of range in '{}'", op.path))?,
            _ => return Err(format!("path '{}' crosses a scalar", op.path)),
        };
    }

    let value = || -> std::result::Result<Value, String> {
        let json = op
            .value
            .as_ref()
            .ok_or_else(|| format!("'{}' operation needs a value", op.op))?;
        serde_yaml::to_value(json).map_err(|e| e.to_string())
    };

    match (op.op.as_str(), parent) {
        ("add", Value::Mapping(map)) => {
            map.insert(Value::String(last), value()?);
        }
        ("add", Value::Sequence(seq)) if last == "-" => seq.push(value()?),
        ("add", Value::Sequence(seq)) => {
            let index = parse_index(&last, seq.len() + 1)?;
            seq.insert(index, value()?);
        }
        ("replace", Value::Mapping(map)) => {
            let slot = map
                .get_mut(last.as_str())
                .ok_or_else(|| format!("path '{}' not found", op.path))?;
            *slot = value()?;
        }
        ("replace", Value::Sequence(seq)) => {
            let index = parse_index(&last, seq.len())?;
            seq[index] = value()?;
        }
        ("remove", Value::Mapping(map)) => {
            map.remove(last.as_str())
                .ok_or_else(|| format!("path '{}' not found", op.path))?;
        }
        ("remove", Value::Sequence(seq)) => {
            let index = parse_index(&last, seq.len())?;
            seq.remove(index);
        }
        ("add" | "replace" | "remove", _) => {
            return Err(format!("path '{}' crosses a scalar", op.path));
        }
        (other, _) => return Err(format!("unsupported operation '{other}'")),
    }
    Ok(())
}

fn parse_index(segment: &str, bound: usize) -> std::result::Result<usize, String> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|i| *i < bound)
        .ok_or_else(|| format!("index '{segment}' out of range"))
}

// ---------------------------------------------------------------------------
// Node-wide transforms
// ---------------------------------------------------------------------------

fn transform(resource: &mut Value, kustomization: &Kustomization) {
    let Some(metadata) = resource
        .get_mut("metadata")
        .and_then(Value::as_mapping_mut)
    else {
        return;
    };

    if let Some(namespace) = &kustomization.namespace {
        metadata.insert("namespace".into(), namespace.clone().into());
    }

    let prefix = kustomization.name_prefix.as_deref().unwrap_or("");
    let suffix = kustomization.name_suffix.as_deref().unwrap_or("");
    if !prefix.is_empty() || !suffix.is_empty() {
        if let Some(name) = metadata.get("name").and_then(Value::as_str) {
            let renamed = format!("{prefix}{name}{suffix}");
            metadata.insert("name".into(), renamed.into());
        }
    }

    merge_string_map(metadata, "labels", &kustomization.common_labels);
    merge_string_map(metadata, "annotations", &kustomization.common_annotations);
}

fn merge_string_map(metadata: &mut Mapping, key: &str, entries: &BTreeMap<String, String>) {
    if entries.is_empty() {
        return;
    }
    let slot = metadata
        .entry(key.into())
        .or_insert(Value::Mapping(Mapping::new()));
    if !slot.is_mapping() {
        *slot = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = slot {
        for (k, v) in entries {
            map.insert(k.clone().into(), v.clone().into());
        }
    }
}

#[cfg(test)]
mod tests {
    use kustbench_shared::{ConfigurationTable, GenerationProfile, SyntheticId};
    use kustbench_storage::InMemoryFs;

    use super::*;
    use crate::generator::generate_tree;

    fn render(fs: &InMemoryFs, root: &str) -> Vec<Value> {
        let out = ResourceRenderer::new().execute(fs, root).unwrap();
        let text = String::from_utf8(out).unwrap();
        text.split("---\n")
            .map(|doc| serde_yaml::from_str(doc).unwrap())
            .collect()
    }

    fn scenario_fs(profiles: Vec<GenerationProfile>) -> InMemoryFs {
        let fs = InMemoryFs::new();
        let table = ConfigurationTable::new(profiles).unwrap();
        generate_tree(&fs, &table, "testdata", &SyntheticId::root("res").unwrap()).unwrap();
        fs
    }

    #[test]
    fn renders_patched_namespaced_node() {
        let fs = scenario_fs(vec![GenerationProfile {
            file_resource_count: 4,
            patch_count: 4,
            namespaced: true,
            ..Default::default()
        }]);

        let resources = render(&fs, "testdata");
        assert_eq!(resources.len(), 4);

        let first = &resources[0];
        assert_eq!(first["metadata"]["name"].as_str(), Some("res-0"));
        assert_eq!(first["metadata"]["namespace"].as_str(), Some("res"));
        // Full-resource patch, then operation patch on the same resource.
        assert_eq!(first["data"]["k"].as_str(), Some("v2"));
        assert_eq!(first["data"]["k2"].as_str(), Some("3"));

        let second = &resources[1];
        assert_eq!(second["data"]["k"].as_str(), Some("v"));
        assert!(second["data"].get("k2").is_none());
        assert_eq!(resources[2]["data"]["k2"].as_str(), Some("3"));
    }

    #[test]
    fn parent_transforms_apply_to_subtrees() {
        let fs = scenario_fs(vec![
            GenerationProfile {
                inline_resource_count: 2,
                name_prefix: Some("foo-".into()),
                name_suffix: Some("-bar".into()),
                common_labels: BTreeMap::from([("app".into(), "demo".into())]),
                ..Default::default()
            },
            GenerationProfile {
                file_resource_count: 1,
                ..Default::default()
            },
        ]);

        let resources = render(&fs, "testdata");
        let names: Vec<&str> = resources
            .iter()
            .map(|r| r["metadata"]["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["foo-res-0-0-bar", "foo-res-1-0-bar"]);
        assert_eq!(resources[0]["metadata"]["labels"]["app"].as_str(), Some("demo"));
        assert_eq!(resources[0]["metadata"]["labels"]["foo"].as_str(), Some("bar"));
    }

    #[test]
    fn benchmark_tree_renders_every_resource() {
        let fs = InMemoryFs::new();
        let table = ConfigurationTable::benchmark();
        generate_tree(&fs, &table, "testdata", &SyntheticId::root("res").unwrap()).unwrap();

        let out = ResourceRenderer::new().execute(&fs, "./testdata").unwrap();
        let text = String::from_utf8(out).unwrap();
        let count = text.split("---\n").count() as u64;
        assert_eq!(count, table.footprint().file_resources);
        assert!(text.contains("name: foo-res-0-0-0-0-bar"));
    }

    #[test]
    fn dangling_operation_target_fails() {
        let fs = scenario_fs(vec![GenerationProfile {
            file_resource_count: 1,
            patch_count: 2,
            ..Default::default()
        }]);
        fs.write_file(
            "testdata/kustomization.yaml",
            b"resources:\n - res0.yaml\npatches:\n - path: patch1.json\n   target:\n    kind: ConfigMap\n    name: missing\n",
        )
        .unwrap();

        let err = ResourceRenderer::new().execute(&fs, "testdata").unwrap_err();
        assert!(err.to_string().contains("matched no resource"));
    }

    #[test]
    fn full_patch_without_resource_fails() {
        // A patch but no file resources: patch0.yaml has nothing to land on.
        let fs = scenario_fs(vec![GenerationProfile {
            patch_count: 1,
            ..Default::default()
        }]);
        let err = ResourceRenderer::new().execute(&fs, "testdata").unwrap_err();
        assert!(matches!(err, KustbenchError::Engine(_)));
    }

    #[test]
    fn missing_root_document_is_sink_error() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("empty").unwrap();
        let err = ResourceRenderer::new().execute(&fs, "empty").unwrap_err();
        assert!(matches!(err, KustbenchError::Sink { .. }));
    }

    #[test]
    fn malformed_root_document_is_document_error() {
        let fs = InMemoryFs::new();
        fs.mkdir_all("bad").unwrap();
        fs.write_file("bad/kustomization.yaml", b"resources: [unclosed\n")
            .unwrap();
        let err = ResourceRenderer::new().execute(&fs, "bad").unwrap_err();
        assert!(matches!(err, KustbenchError::Document { .. }));
    }

    #[test]
    fn json_pointer_operations() {
        let mut resource: Value = serde_yaml::from_str(
            "kind: ConfigMap\nmetadata:\n  name: x\ndata:\n  k: v\n  list: [a, b]\n",
        )
        .unwrap();

        let op = |op: &str, path: &str, value: Option<serde_json::Value>| PatchOp {
            op: op.into(),
            path: path.into(),
            value,
        };

        apply_op(&mut resource, &op("replace", "/data/k", Some("w".into()))).unwrap();
        apply_op(&mut resource, &op("add", "/data/list/-", Some("c".into()))).unwrap();
        apply_op(&mut resource, &op("remove", "/data/list/0", None)).unwrap();
        apply_op(&mut resource, &op("add", "/data/a~1b", Some("slash".into()))).unwrap();

        assert_eq!(resource["data"]["k"].as_str(), Some("w"));
        assert_eq!(resource["data"]["list"][0].as_str(), Some("b"));
        assert_eq!(resource["data"]["list"][1].as_str(), Some("c"));
        assert_eq!(resource["data"]["a/b"].as_str(), Some("slash"));

        assert!(apply_op(&mut resource, &op("replace", "/data/missing", Some("x".into()))).is_err());
        assert!(apply_op(&mut resource, &op("move", "/data/k", None)).is_err());
        assert!(apply_op(&mut resource, &op("add", "/data/k/deeper", Some("x".into()))).is_err());
    }
}
