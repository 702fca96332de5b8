//! Deployment-time reference handoff for EdgeStack.
//!
//! A producer unit (for example the stack that publishes the edge function)
//! writes an identifier into a durable [`ReferenceStore`]. A consumer unit
//! deployed independently, possibly in another region, reads it back through
//! a [`ReferenceResolver`], which retries with bounded backoff and reads under
//! a narrowly scoped [`ReadGrant`]. [`DeploymentPlan`] makes the ordering
//! between the two explicit and [`Orchestrator`] enforces it.
//!
//! None of this runs on the request path. A resolved reference belongs to the
//! deployment run that produced it and is never cached beyond it.

pub mod error;
pub mod file_store;
pub mod grant;
pub mod orchestrator;
pub mod plan;
pub mod resolver;
pub mod store;

pub use error::{DeployError, PlanError, ReferenceError};
pub use file_store::FileReferenceStore;
pub use grant::{GrantedReader, ReadGrant};
pub use orchestrator::{DeploymentReport, Orchestrator, UnitOutcome};
pub use plan::{DependencyEdge, DeploymentPlan, DeploymentUnit, Export, Import};
pub use resolver::{ReferenceResolver, ResolvedReference, RetryPolicy};
pub use store::{InMemoryReferenceStore, PublishedReference, ReferenceStore};
