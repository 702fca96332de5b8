//! Deployment plans with explicit ordering.
//!
//! A plan is a list of units. A unit that reads a reference another unit in
//! the plan publishes must say so in `dependsOn` (directly or transitively);
//! validation refuses to infer the edge.
//!
//! ```json
//! {
//!   "units": [
//!     {
//!       "name": "edge-function",
//!       "region": "us-east-1",
//!       "exports": [{ "key": "/axumOnLambda/LambdaEdgeArn", "value": "arn:..." }]
//!     },
//!     {
//!       "name": "backend",
//!       "region": "eu-west-1",
//!       "dependsOn": ["edge-function"],
//!       "imports": [{ "key": "/axumOnLambda/LambdaEdgeArn", "as": "edgeFunctionArn" }]
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use edgestack_core::{AwsRegion, ReferenceKey};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// A reference a unit publishes once it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Key to publish under, in the unit's region.
    pub key: ReferenceKey,
    /// Value to publish.
    pub value: String,
}

/// A reference a unit resolves before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Key to resolve.
    pub key: ReferenceKey,
    /// Region to read from. Defaults to the exporting unit's region when the
    /// key is exported in the plan, otherwise to the importing unit's region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<AwsRegion>,
    /// Name the resolved value is bound to. Defaults to the key.
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
}

impl Import {
    /// Name the resolved value is recorded under.
    #[must_use]
    pub fn binding(&self) -> &str {
        self.bind.as_deref().unwrap_or_else(|| self.key.as_str())
    }
}

/// One independently deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentUnit {
    /// Unique name within the plan.
    pub name: String,
    /// Region the unit is deployed to and publishes into.
    #[serde(default)]
    pub region: AwsRegion,
    /// Units that must be fully applied first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// References published after the unit is applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<Export>,
    /// References resolved before the unit is applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<Import>,
}

impl DeploymentUnit {
    /// A unit with no dependencies, exports, or imports.
    #[must_use]
    pub fn new(name: impl Into<String>, region: AwsRegion) -> Self {
        Self {
            name: name.into(),
            region,
            depends_on: Vec::new(),
            exports: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Declare a dependency on `producer`.
    #[must_use]
    pub fn depends_on(mut self, producer: impl Into<String>) -> Self {
        self.depends_on.push(producer.into());
        self
    }

    /// Publish `value` under `key` once applied.
    #[must_use]
    pub fn export(mut self, key: ReferenceKey, value: impl Into<String>) -> Self {
        self.exports.push(Export {
            key,
            value: value.into(),
        });
        self
    }

    /// Resolve `key` before applying, binding it to `bind`.
    #[must_use]
    pub fn import(mut self, key: ReferenceKey, bind: impl Into<String>) -> Self {
        self.imports.push(Import {
            key,
            region: None,
            bind: Some(bind.into()),
        });
        self
    }
}

/// A `producer` must be fully applied before `consumer` starts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Unit applied first.
    pub producer: String,
    /// Unit applied after.
    pub consumer: String,
}

/// Units plus the ordering between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Units in declaration order.
    pub units: Vec<DeploymentUnit>,
}

impl DeploymentPlan {
    /// Build a plan from units in declaration order.
    #[must_use]
    pub fn new(units: Vec<DeploymentUnit>) -> Self {
        Self { units }
    }

    /// Look up a unit by name.
    #[must_use]
    pub fn unit(&self, name: &str) -> Option<&DeploymentUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Every declared edge, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<_> = self
            .units
            .iter()
            .flat_map(|unit| {
                unit.depends_on.iter().map(|producer| DependencyEdge {
                    producer: producer.clone(),
                    consumer: unit.name.clone(),
                })
            })
            .collect();
        edges.sort();
        edges.dedup();
        edges
    }

    /// Region `import` of `unit` is read from.
    #[must_use]
    pub fn import_region(&self, unit: &DeploymentUnit, import: &Import) -> AwsRegion {
        if let Some(region) = &import.region {
            return region.clone();
        }
        let mut exporters = self
            .units
            .iter()
            .filter(|u| u.exports.iter().any(|e| e.key == import.key));
        let first = exporters.next();
        if first.is_some_and(|u| u.region == unit.region)
            || exporters.any(|u| u.region == unit.region)
        {
            return unit.region.clone();
        }
        first.map_or_else(|| unit.region.clone(), |u| u.region.clone())
    }

    /// The unit in the plan that exports `key` into `region`, if any.
    #[must_use]
    pub fn producer_of(&self, key: &ReferenceKey, region: &AwsRegion) -> Option<&DeploymentUnit> {
        self.units
            .iter()
            .find(|u| &u.region == region && u.exports.iter().any(|e| &e.key == key))
    }

    /// Check the plan and return its units in application order.
    ///
    /// The order is topological; among units that are ready at the same time,
    /// declaration order wins, so the result is deterministic.
    ///
    /// # Errors
    ///
    /// Returns the first [`PlanError`] found.
    pub fn ordered(&self) -> Result<Vec<&DeploymentUnit>, PlanError> {
        self.check_names()?;
        let order = self.topological_order()?;
        self.check_exports()?;
        self.check_imports()?;
        Ok(order.into_iter().map(|i| &self.units[i]).collect())
    }

    /// Check the plan without keeping the order.
    ///
    /// # Errors
    ///
    /// See [`DeploymentPlan::ordered`].
    pub fn validate(&self) -> Result<(), PlanError> {
        self.ordered().map(|_| ())
    }

    fn check_names(&self) -> Result<(), PlanError> {
        let mut seen = BTreeSet::new();
        for unit in &self.units {
            if !seen.insert(unit.name.as_str()) {
                return Err(PlanError::DuplicateUnit(unit.name.clone()));
            }
        }
        for unit in &self.units {
            for dependency in &unit.depends_on {
                if dependency == &unit.name {
                    return Err(PlanError::SelfDependency(unit.name.clone()));
                }
                if !seen.contains(dependency.as_str()) {
                    return Err(PlanError::UnknownDependency {
                        unit: unit.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn topological_order(&self) -> Result<Vec<usize>, PlanError> {
        let mut placed = vec![false; self.units.len()];
        let mut placed_names = BTreeSet::new();
        let mut order = Vec::with_capacity(self.units.len());

        while order.len() < self.units.len() {
            let ready = self.units.iter().enumerate().find(|(i, unit)| {
                !placed[*i]
                    && unit
                        .depends_on
                        .iter()
                        .all(|d| placed_names.contains(d.as_str()))
            });
            let Some((i, unit)) = ready else {
                let stuck = self
                    .units
                    .iter()
                    .zip(&placed)
                    .filter(|(_, placed)| !**placed)
                    .map(|(u, _)| u.name.clone())
                    .collect();
                return Err(PlanError::DependencyCycle(stuck));
            };
            placed[i] = true;
            placed_names.insert(unit.name.as_str());
            order.push(i);
        }
        Ok(order)
    }

    fn check_exports(&self) -> Result<(), PlanError> {
        let mut owners: BTreeMap<(&AwsRegion, &ReferenceKey), &str> = BTreeMap::new();
        for unit in &self.units {
            for export in &unit.exports {
                if let Some(first) = owners.insert((&unit.region, &export.key), &unit.name) {
                    return Err(PlanError::DuplicateExport {
                        key: export.key.to_string(),
                        region: unit.region.to_string(),
                        first: first.to_owned(),
                        second: unit.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_imports(&self) -> Result<(), PlanError> {
        let ancestors = self.ancestors();
        for unit in &self.units {
            for import in &unit.imports {
                let region = self.import_region(unit, import);
                let Some(producer) = self.producer_of(&import.key, &region) else {
                    // Published outside the plan; the resolver waits for it.
                    continue;
                };
                if producer.name == unit.name {
                    return Err(PlanError::SelfImport {
                        unit: unit.name.clone(),
                        key: import.key.to_string(),
                    });
                }
                let declared = ancestors
                    .get(unit.name.as_str())
                    .is_some_and(|a| a.contains(producer.name.as_str()));
                if !declared {
                    return Err(PlanError::UndeclaredDependency {
                        consumer: unit.name.clone(),
                        producer: producer.name.clone(),
                        key: import.key.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Transitive dependencies of every unit. Only valid on an acyclic plan.
    fn ancestors(&self) -> HashMap<&str, BTreeSet<&str>> {
        let mut result: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for unit in &self.units {
            let mut seen = BTreeSet::new();
            let mut stack: Vec<&str> = unit.depends_on.iter().map(String::as_str).collect();
            while let Some(name) = stack.pop() {
                if seen.insert(name) {
                    if let Some(dep) = self.unit(name) {
                        stack.extend(dep.depends_on.iter().map(String::as_str));
                    }
                }
            }
            result.insert(unit.name.as_str(), seen);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ReferenceKey {
        s.parse().unwrap()
    }

    fn edge_and_backend() -> DeploymentPlan {
        DeploymentPlan::new(vec![
            DeploymentUnit::new("backend", AwsRegion::new("eu-west-1"))
                .depends_on("edge-function")
                .import(key("/axumOnLambda/LambdaEdgeArn"), "edgeFunctionArn"),
            DeploymentUnit::new("edge-function", AwsRegion::new("us-east-1"))
                .export(key("/axumOnLambda/LambdaEdgeArn"), "arn:edge:1"),
        ])
    }

    fn names(units: &[&DeploymentUnit]) -> Vec<String> {
        units.iter().map(|u| u.name.clone()).collect()
    }

    #[test]
    fn test_should_order_producer_before_consumer() {
        let plan = edge_and_backend();
        let order = plan.ordered().unwrap();
        assert_eq!(names(&order), vec!["edge-function", "backend"]);
    }

    #[test]
    fn test_should_keep_declaration_order_among_ready_units() {
        let plan = DeploymentPlan::new(vec![
            DeploymentUnit::new("c", AwsRegion::default()).depends_on("a"),
            DeploymentUnit::new("b", AwsRegion::default()),
            DeploymentUnit::new("a", AwsRegion::default()),
        ]);
        assert_eq!(names(&plan.ordered().unwrap()), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_should_read_import_from_exporter_region() {
        let plan = edge_and_backend();
        let backend = plan.unit("backend").unwrap();
        let region = plan.import_region(backend, &backend.imports[0]);
        assert_eq!(region.as_str(), "us-east-1");
    }

    #[test]
    fn test_should_default_import_region_to_consumer_when_not_exported() {
        let plan = DeploymentPlan::new(vec![
            DeploymentUnit::new("backend", AwsRegion::new("eu-west-1"))
                .import(key("/external/arn"), "arn"),
        ]);
        let backend = plan.unit("backend").unwrap();
        assert_eq!(
            plan.import_region(backend, &backend.imports[0]).as_str(),
            "eu-west-1"
        );
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_should_reject_import_without_declared_dependency() {
        let mut plan = edge_and_backend();
        plan.units[0].depends_on.clear();
        assert_eq!(
            plan.validate().unwrap_err(),
            PlanError::UndeclaredDependency {
                consumer: "backend".into(),
                producer: "edge-function".into(),
                key: "/axumOnLambda/LambdaEdgeArn".into(),
            }
        );
    }

    #[test]
    fn test_should_accept_transitive_dependency() {
        let plan = DeploymentPlan::new(vec![
            DeploymentUnit::new("edge", AwsRegion::default()).export(key("/a/arn"), "x"),
            DeploymentUnit::new("cdn", AwsRegion::default()).depends_on("edge"),
            DeploymentUnit::new("app", AwsRegion::default())
                .depends_on("cdn")
                .import(key("/a/arn"), "arn"),
        ]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_should_reject_cycles() {
        let plan = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default()).depends_on("b"),
            DeploymentUnit::new("b", AwsRegion::default()).depends_on("a"),
            DeploymentUnit::new("c", AwsRegion::default()),
        ]);
        assert_eq!(
            plan.validate().unwrap_err(),
            PlanError::DependencyCycle(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_should_reject_bad_names() {
        let dup = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default()),
            DeploymentUnit::new("a", AwsRegion::default()),
        ]);
        assert_eq!(dup.validate().unwrap_err(), PlanError::DuplicateUnit("a".into()));

        let unknown = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default()).depends_on("ghost"),
        ]);
        assert!(matches!(
            unknown.validate().unwrap_err(),
            PlanError::UnknownDependency { .. }
        ));

        let own = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default()).depends_on("a"),
        ]);
        assert_eq!(own.validate().unwrap_err(), PlanError::SelfDependency("a".into()));
    }

    #[test]
    fn test_should_reject_duplicate_export_and_self_import() {
        let dup = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default()).export(key("/k/v"), "1"),
            DeploymentUnit::new("b", AwsRegion::default()).export(key("/k/v"), "2"),
        ]);
        assert!(matches!(
            dup.validate().unwrap_err(),
            PlanError::DuplicateExport { .. }
        ));

        let own = DeploymentPlan::new(vec![
            DeploymentUnit::new("a", AwsRegion::default())
                .export(key("/k/v"), "1")
                .import(key("/k/v"), "v"),
        ]);
        assert!(matches!(own.validate().unwrap_err(), PlanError::SelfImport { .. }));
    }

    #[test]
    fn test_should_parse_plan_json() {
        let json = r#"{
            "units": [
                {
                    "name": "edge-function",
                    "region": "us-east-1",
                    "exports": [{ "key": "/axumOnLambda/LambdaEdgeArn", "value": "arn:1" }]
                },
                {
                    "name": "backend",
                    "region": "eu-west-1",
                    "dependsOn": ["edge-function"],
                    "imports": [{ "key": "/axumOnLambda/LambdaEdgeArn", "as": "edgeFunctionArn" }]
                }
            ]
        }"#;
        let plan: DeploymentPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.units.len(), 2);
        assert_eq!(plan.units[1].imports[0].binding(), "edgeFunctionArn");
        assert_eq!(
            plan.edges(),
            vec![DependencyEdge {
                producer: "edge-function".into(),
                consumer: "backend".into(),
            }]
        );
    }

    #[test]
    fn test_should_reject_invalid_key_in_plan_json() {
        let json = r#"{ "units": [{ "name": "a", "exports": [{ "key": "no-slash", "value": "v" }] }] }"#;
        assert!(serde_json::from_str::<DeploymentPlan>(json).is_err());
    }
}
