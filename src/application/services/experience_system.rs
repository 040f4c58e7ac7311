//! Facade over configuration, node catalog, calculation and progression
//!
//! One instance per process or request; it owns the live configuration and
//! node registry. Allocations are recomputed on demand, never cached.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::application::services::ConfigurationManager;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{
    CalculationExplanation, Difficulty, ExperienceAllocation, ExperienceCalculator,
    ExperienceConfig, Node, NodeRegistry, RawExperienceConfig, RealmSystem, TreasureTier,
    ValidationReport, Validator,
};
use crate::infrastructure::traits::FileSystem;

/// Realm and level position for one experience value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub experience: i64,
    pub realm: usize,
    pub experience_to_next_realm: i64,
    pub realm_progress: f64,
    pub level: usize,
    pub experience_to_next_level: i64,
    pub level_progress: f64,
}

/// Aggregate view of the current catalog and its allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSummary {
    pub node_count: usize,
    pub problem_count: usize,
    pub treasure_count: usize,
    pub total_experience: i64,
    pub allocated_total: i64,
    pub average_experience: f64,
    pub min_experience: i64,
    pub max_experience: i64,
    pub valid: bool,
}

/// Node catalog document: a bare array or `{"nodes": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NodesDocument {
    List(Vec<Node>),
    Wrapped { nodes: Vec<Node> },
}

pub fn parse_nodes(content: &str) -> Result<Vec<Node>, serde_json::Error> {
    let document: NodesDocument = serde_json::from_str(content)?;
    Ok(match document {
        NodesDocument::List(nodes) | NodesDocument::Wrapped { nodes } => nodes,
    })
}

pub struct ExperienceSystem {
    fs: Arc<dyn FileSystem>,
    config: ConfigurationManager,
    registry: NodeRegistry,
    realms: RealmSystem,
}

impl ExperienceSystem {
    /// Built-in default configuration, empty catalog.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        let config = ConfigurationManager::new(fs.clone());
        let realms = RealmSystem::from_config(config.config());
        Self {
            fs,
            config,
            registry: NodeRegistry::default(),
            realms,
        }
    }

    pub fn load_config(&mut self, raw: &RawExperienceConfig) -> ApplicationResult<()> {
        let config = self.config.load(raw)?;
        self.realms = RealmSystem::from_config(config);
        Ok(())
    }

    pub fn load_config_file(&mut self, path: &Path) -> ApplicationResult<()> {
        let config = self.config.load_file(path)?;
        self.realms = RealmSystem::from_config(config);
        Ok(())
    }

    /// Replace the catalog.
    pub fn load_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.registry.load(nodes);
    }

    pub fn load_nodes_file(&mut self, path: &Path) -> ApplicationResult<usize> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read nodes", path)?;
        let nodes = parse_nodes(&content)
            .map_err(|e| ApplicationError::operation(format!("parse nodes: {}", path.display()), e))?;
        self.registry.load(nodes);
        debug!("load_nodes_file: {} nodes", self.registry.count());
        Ok(self.registry.count())
    }

    pub fn config(&self) -> &ExperienceConfig {
        self.config.config()
    }

    pub fn configuration(&self) -> &ConfigurationManager {
        &self.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    pub fn realm_system(&self) -> &RealmSystem {
        &self.realms
    }

    pub fn node_ids(&self) -> HashSet<String> {
        self.registry.ids().map(str::to_string).collect()
    }

    fn calculator(&self) -> ExperienceCalculator<'_> {
        ExperienceCalculator::new(self.config.config())
    }

    /// Normalized allocation of the current catalog.
    #[instrument(level = "debug", skip(self))]
    pub fn allocations(&self) -> ApplicationResult<ExperienceAllocation> {
        Ok(self.calculator().calculate_all(self.registry.all())?)
    }

    pub fn node_experience(&self, node_id: &str) -> ApplicationResult<Option<i64>> {
        Ok(self.allocations()?.get(node_id))
    }

    pub fn explain(&self, node_id: &str) -> CalculationExplanation {
        self.calculator().explain(&self.registry, node_id)
    }

    /// Pre-normalization preview for a problem.
    pub fn problem_experience(&self, difficulty: Difficulty, tags: &[String]) -> i64 {
        self.calculator().problem_experience(difficulty, tags)
    }

    pub fn treasure_experience(&self, tier: TreasureTier) -> i64 {
        self.calculator().treasure_experience(tier)
    }

    /// All allocation invariants over the current catalog.
    pub fn validate(&self) -> ApplicationResult<ValidationReport> {
        let allocation = self.allocations()?;
        Ok(Validator::validate_all(
            &allocation,
            self.registry.all(),
            self.config.config(),
        ))
    }

    pub fn validate_config(&self) -> ValidationReport {
        self.config.validate(self.config.config())
    }

    pub fn current_realm(&self, experience: i64) -> usize {
        self.realms.current_realm(experience)
    }

    pub fn experience_to_next_realm(&self, experience: i64) -> i64 {
        self.realms.experience_to_next_realm(experience)
    }

    pub fn realm_progress(&self, experience: i64) -> f64 {
        self.realms.realm_progress(experience)
    }

    pub fn current_level(&self, experience: i64) -> usize {
        self.realms.current_level(experience)
    }

    pub fn experience_to_next_level(&self, experience: i64) -> i64 {
        self.realms.experience_to_next_level(experience)
    }

    pub fn level_progress(&self, experience: i64) -> f64 {
        self.realms.level_progress(experience)
    }

    pub fn progress(&self, experience: i64) -> ProgressSnapshot {
        ProgressSnapshot {
            experience,
            realm: self.current_realm(experience),
            experience_to_next_realm: self.experience_to_next_realm(experience),
            realm_progress: self.realm_progress(experience),
            level: self.current_level(experience),
            experience_to_next_level: self.experience_to_next_level(experience),
            level_progress: self.level_progress(experience),
        }
    }

    pub fn summary(&self) -> ApplicationResult<SystemSummary> {
        let allocation = self.allocations()?;
        let report = Validator::validate_all(&allocation, self.registry.all(), self.config.config());
        let allocated_total = allocation.total();
        let average_experience = if allocation.is_empty() {
            0.0
        } else {
            allocated_total as f64 / allocation.len() as f64
        };
        Ok(SystemSummary {
            node_count: self.registry.count(),
            problem_count: self.registry.problems_only().len(),
            treasure_count: self.registry.treasures_only().len(),
            total_experience: self.config.config().total_experience,
            allocated_total,
            average_experience,
            min_experience: allocation.values().min().unwrap_or(0),
            max_experience: allocation.values().max().unwrap_or(0),
            valid: report.valid,
        })
    }
}
