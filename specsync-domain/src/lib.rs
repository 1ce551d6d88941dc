//! Domain logic: diff contracts, classify compatibility, pick versions and
//! plan syncs.
//!
//! Everything here is pure and synchronous. Persistence lives in
//! `specsync-store`; applying plans is the job of `specsync-edit`.

mod detector;
mod migration;
mod planner;
mod versioning;

pub use detector::{
    ChangeDetector, ClassificationRule, FAIL_SAFE_RULE, IncomparableDocuments, RULES, classify,
};
pub use migration::migration_plan;
pub use planner::{PlanContext, Planner, guide_file_name};
pub use versioning::{compare, next_version};
