//! Benchmark harness: generate a tree, then time one build over it.
//!
//! Tree generation is setup and sits outside the timed region; only the
//! engine invocation is measured. The rendered output is dropped after its
//! length is recorded.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, instrument};

use kustbench_shared::{
    AppConfig, BENCHMARK_ROOT_PATH, ConfigurationTable, KustbenchError, Result, SyntheticId,
};
use kustbench_storage::{FileSystem, InMemoryFs};

use crate::engine::BuildEngine;
use crate::generator::generate_tree;

/// Outcome of a single harness run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Time spent writing the tree into the sink.
    pub generation: Duration,
    /// Time spent inside the build engine.
    pub build: Duration,
    /// Size of the discarded rendered output.
    pub rendered_bytes: usize,
}

/// A fixed scenario: table, root path and root identity.
#[derive(Debug, Clone)]
pub struct BuildHarness {
    table: ConfigurationTable,
    root_path: String,
    root_id: SyntheticId,
}

impl BuildHarness {
    pub fn new(table: ConfigurationTable, root_path: impl Into<String>, root_id: SyntheticId) -> Self {
        Self {
            table,
            root_path: root_path.into(),
            root_id,
        }
    }

    /// The built-in scenario rooted at `testdata` with id `res`.
    pub fn benchmark() -> Self {
        Self {
            table: ConfigurationTable::benchmark(),
            root_path: BENCHMARK_ROOT_PATH.into(),
            root_id: SyntheticId::benchmark_root(),
        }
    }

    /// Build a harness from loaded config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.table()?,
            config.defaults.root_path.clone(),
            SyntheticId::root(config.defaults.root_id.clone())?,
        ))
    }

    pub fn table(&self) -> &ConfigurationTable {
        &self.table
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn root_id(&self) -> &SyntheticId {
        &self.root_id
    }

    /// Populate `fs` with the scenario tree without building it.
    pub fn generate(&self, fs: &dyn FileSystem) -> Result<()> {
        generate_tree(fs, &self.table, &self.root_path, &self.root_id)
    }

    /// Generate into `fs`, then time `engine` over the root.
    #[instrument(skip_all, fields(engine = engine.name(), root = %self.root_path))]
    pub fn run(&self, fs: &dyn FileSystem, engine: &dyn BuildEngine) -> Result<RunReport> {
        let start = Instant::now();
        self.generate(fs)?;
        let generation = start.elapsed();

        let start = Instant::now();
        let rendered = engine.execute(fs, &self.root_path)?;
        let build = start.elapsed();

        let report = RunReport {
            generation,
            build,
            rendered_bytes: rendered.len(),
        };
        info!(
            generation_ms = millis(report.generation),
            build_ms = millis(report.build),
            rendered_bytes = report.rendered_bytes,
            "harness run complete"
        );
        Ok(report)
    }

    /// Run against a brand-new in-memory sink.
    pub fn run_fresh(&self, engine: &dyn BuildEngine) -> Result<RunReport> {
        let fs = InMemoryFs::new();
        self.run(&fs, engine)
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Aggregate timing over repeated runs, in milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct BenchSummary {
    pub iterations: usize,
    pub build_min_ms: f64,
    pub build_mean_ms: f64,
    pub build_max_ms: f64,
    pub generation_mean_ms: f64,
    pub rendered_bytes: usize,
}

impl BenchSummary {
    /// Summarize a non-empty set of runs.
    pub fn from_reports(reports: &[RunReport]) -> Result<Self> {
        let Some(first) = reports.first() else {
            return Err(KustbenchError::validation("no harness runs to summarize"));
        };

        let builds: Vec<f64> = reports.iter().map(|r| millis(r.build)).collect();
        let n = reports.len() as f64;

        Ok(Self {
            iterations: reports.len(),
            build_min_ms: builds.iter().copied().fold(f64::INFINITY, f64::min),
            build_mean_ms: builds.iter().sum::<f64>() / n,
            build_max_ms: builds.iter().copied().fold(0.0, f64::max),
            generation_mean_ms: reports.iter().map(|r| millis(r.generation)).sum::<f64>() / n,
            rendered_bytes: first.rendered_bytes,
        })
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use kustbench_shared::GenerationProfile;

    use super::*;
    use crate::engine::ResourceRenderer;

    fn small_harness() -> BuildHarness {
        let table = ConfigurationTable::new(vec![
            GenerationProfile {
                inline_resource_count: 2,
                namespaced: true,
                file_resource_count: 3,
                patch_count: 2,
                ..Default::default()
            },
            GenerationProfile {
                file_resource_count: 2,
                ..Default::default()
            },
        ])
        .unwrap();
        BuildHarness::new(table, "testdata", SyntheticId::root("res").unwrap())
    }

    /// Engine that records what it was handed and returns canned bytes.
    struct RecordingEngine {
        calls: Cell<usize>,
        fail: bool,
    }

    impl BuildEngine for RecordingEngine {
        fn execute(&self, fs: &dyn FileSystem, root: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(root, "testdata");
            assert!(fs.is_file("testdata/kustomization.yaml"));
            if self.fail {
                return Err(KustbenchError::engine("boom"));
            }
            Ok(vec![0; 42])
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn run_generates_then_builds_once() {
        let engine = RecordingEngine {
            calls: Cell::new(0),
            fail: false,
        };
        let fs = InMemoryFs::new();
        let report = small_harness().run(&fs, &engine).unwrap();

        assert_eq!(engine.calls.get(), 1);
        assert_eq!(report.rendered_bytes, 42);
        assert_eq!(fs.file_count() as u64, small_harness().table().footprint().total_files());
    }

    #[test]
    fn engine_failure_propagates() {
        let engine = RecordingEngine {
            calls: Cell::new(0),
            fail: true,
        };
        let err = small_harness().run_fresh(&engine).unwrap_err();
        assert_eq!(err.to_string(), "build engine error: boom");
    }

    #[test]
    fn generation_failure_skips_engine() {
        let engine = RecordingEngine {
            calls: Cell::new(0),
            fail: false,
        };
        let fs = InMemoryFs::new();
        fs.write_file("testdata", b"blocks the root").unwrap();

        assert!(small_harness().run(&fs, &engine).is_err());
        assert_eq!(engine.calls.get(), 0);
    }

    #[test]
    fn reference_engine_end_to_end() {
        let report = small_harness().run_fresh(&ResourceRenderer::new()).unwrap();
        assert!(report.rendered_bytes > 0);
    }

    #[test]
    fn benchmark_scenario_defaults() {
        let harness = BuildHarness::benchmark();
        assert_eq!(harness.root_path(), "testdata");
        assert_eq!(harness.root_id().as_str(), "res");
        assert_eq!(harness.table().len(), 5);

        let from_config = BuildHarness::from_config(&AppConfig::default()).unwrap();
        assert_eq!(from_config.table(), harness.table());
    }

    #[test]
    fn summary_over_reports() {
        let reports = [
            RunReport {
                generation: Duration::from_millis(5),
                build: Duration::from_millis(10),
                rendered_bytes: 100,
            },
            RunReport {
                generation: Duration::from_millis(7),
                build: Duration::from_millis(30),
                rendered_bytes: 100,
            },
        ];
        let summary = BenchSummary::from_reports(&reports).unwrap();
        assert_eq!(summary.iterations, 2);
        assert!((summary.build_min_ms - 10.0).abs() < 1e-9);
        assert!((summary.build_mean_ms - 20.0).abs() < 1e-9);
        assert!((summary.build_max_ms - 30.0).abs() < 1e-9);
        assert!((summary.generation_mean_ms - 6.0).abs() < 1e-9);

        assert!(BenchSummary::from_reports(&[]).is_err());
    }
}
