//! # Topology
//!
//! Declarative infrastructure resource graphs.
//!
//! This crate models the resources a stage needs, the order they must be
//! realized in, and the hand-off of a resolved plan to a provisioning backend.
//! It never talks to a cloud provider itself.
//!
//! ## Core Concepts
//!
//! - **ResourceNode**: a typed resource with a stage-qualified id and properties
//! - **DependencyGraph**: nodes plus explicit depends-on edges for one stage
//! - **StageContext**: immutable per-environment parameters
//! - **Resolver**: deterministic topological order (and dependency waves)
//! - **Executor**: applies waves through a [`ProvisioningBackend`]
//!
//! ## Example
//!
//! ```ignore
//! use topology::{DependencyGraph, ResourceKind, ResourceNode, Resolver, Value};
//!
//! let mut graph = DependencyGraph::new("Beta");
//! graph.add_node(ResourceNode::new("Beta", "WebAssetsBucket", ResourceKind::Bucket))?;
//! graph.add_node(
//!     ResourceNode::new("Beta", "DeployDefaultPage", ResourceKind::Deployment)
//!         .with("destinationBucket", Value::reference("Beta-WebAssetsBucket", "bucketName")),
//! )?;
//! graph.add_edge("Beta-WebAssetsBucket", "Beta-DeployDefaultPage");
//!
//! for node in Resolver::resolve(&graph)? {
//!     println!("{}", node.id());
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProvisioningBackend`]: realizes nodes, reports outputs
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod node;
pub mod resolver;
pub mod stage;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
    ProvisioningBackend,
};
pub use diff::{GraphDiff, NodeDiff, PropertyChange, diff_graphs};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{execute, execute_simple, total_summary};
pub use graph::{DependencyGraph, Edge};
pub use node::{ResourceKind, ResourceNode, qualified_id};
pub use resolver::{Plan, Resolver, resolve};
pub use stage::{PRODUCTION_STAGE, RemovalPolicy, StageContext};
pub use types::{
    ApplyOutcome, ApplyResult, ExecuteOptions, ExecuteReport, ExecuteSummary, NodeReport,
};
pub use value::{Reference, Value};
