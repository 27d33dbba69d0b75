//! Entity/community graph over memories (§4.5)

mod build;
mod community;
mod entities;
mod reports;

pub use build::{GraphragBuildOptions, GraphragBuildResult, GraphragEngine, GraphragError};
pub use community::{community_context, rebuild_communities, DEFAULT_MAX_LEVEL, DEFAULT_MIN_EDGE_STRENGTH};
pub use entities::{merge_or_create_entity, normalize_alias, record_relationship};
pub use reports::{compose_report, generate_reports};
