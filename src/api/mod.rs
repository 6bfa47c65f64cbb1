//! Typed resource calls over the gateway: projects, tags, users and the
//! activity log. Each call is an `ApiClient` method.

mod activity;
mod models;
mod projects;
mod tags;
mod users;

pub use activity::{entity_options, filter_by_entity, ActionKind, ActivityPage};
pub use models::{
    ActivityLog, ActivityQuery, Project, ProjectInput, Tag, TagInput, TagRef, User, UserCreate,
};
pub use tags::tag_names_for;
