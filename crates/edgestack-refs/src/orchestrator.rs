//! Applies a [`DeploymentPlan`] in dependency order.
//!
//! Each unit is applied in two phases: its imports are resolved, then its
//! exports are published. The next unit starts only after both phases of the
//! previous one have committed, so a consumer never reads before its producer
//! has written. A failing unit aborts the run; units already applied keep
//! their published references.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, info, info_span};

use crate::error::{DeployError, ReferenceError};
use crate::plan::{DeploymentPlan, DeploymentUnit, Export};
use crate::resolver::{ReferenceResolver, ResolvedReference, RetryPolicy};
use crate::store::{PublishedReference, ReferenceStore, run_blocking};

/// What one unit resolved and published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOutcome {
    /// Unit name.
    pub name: String,
    /// Resolved imports, by binding name.
    pub resolved: BTreeMap<String, ResolvedReference>,
    /// Records written for the unit's exports.
    pub published: Vec<PublishedReference>,
}

/// Result of one deployment run, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    /// Outcomes in the order units were applied.
    pub units: Vec<UnitOutcome>,
}

impl DeploymentReport {
    /// Outcome for the named unit.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&UnitOutcome> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Names in application order.
    #[must_use]
    pub fn order(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }
}

/// Drives a plan against a reference store.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    store: Arc<dyn ReferenceStore>,
    resolver: ReferenceResolver,
}

impl Orchestrator {
    /// Create an orchestrator over `store`, resolving with `policy`.
    #[must_use]
    pub fn new(store: Arc<dyn ReferenceStore>, policy: RetryPolicy) -> Self {
        let resolver = ReferenceResolver::new(Arc::clone(&store), policy);
        Self { store, resolver }
    }

    /// Validate `plan`, then apply its units one at a time.
    ///
    /// # Errors
    ///
    /// [`DeployError::Plan`] if the plan is invalid, in which case nothing is
    /// applied; [`DeployError::Unit`] for the first unit that fails.
    pub async fn apply(&self, plan: &DeploymentPlan) -> Result<DeploymentReport, DeployError> {
        let order = plan.ordered()?;
        info!(units = order.len(), edges = plan.edges().len(), "applying deployment plan");

        let mut report = DeploymentReport::default();
        for unit in order {
            let span = info_span!("unit", name = %unit.name, region = %unit.region);
            let outcome = self
                .apply_unit(plan, unit)
                .instrument(span)
                .await
                .map_err(|source| DeployError::Unit {
                    unit: unit.name.clone(),
                    source,
                })?;
            report.units.push(outcome);
        }
        Ok(report)
    }

    async fn apply_unit(
        &self,
        plan: &DeploymentPlan,
        unit: &DeploymentUnit,
    ) -> Result<UnitOutcome, ReferenceError> {
        let mut resolved = BTreeMap::new();
        for import in &unit.imports {
            let region = plan.import_region(unit, import);
            let reference = self.resolver.resolve(&region, &import.key).await?;
            resolved.insert(import.binding().to_owned(), reference);
        }

        let mut published = Vec::with_capacity(unit.exports.len());
        for export in &unit.exports {
            let store = Arc::clone(&self.store);
            let region = unit.region.clone();
            let Export { key, value } = export.clone();
            let record = run_blocking(move || store.put(&region, &key, &value)).await?;
            published.push(record);
        }

        info!(
            resolved = resolved.len(),
            published = published.len(),
            "unit applied"
        );
        Ok(UnitOutcome {
            name: unit.name.clone(),
            resolved,
            published,
        })
    }
}
