use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};

use super::models::{ActivityLog, ActivityQuery};
use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};

impl ApiClient {
    /// `GET /activity?limit=&offset=`; entries come back in server order.
    pub async fn list_activity(&self, q: ActivityQuery) -> ApiResult<Vec<ActivityLog>> {
        let req = ApiRequest::get("/activity")
            .query(&[("limit", q.limit.to_string()), ("offset", q.offset.to_string())])
            .authenticated();
        self.send(&req).await?.into_json()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Other,
}

impl ActivityLog {
    pub fn action_kind(&self) -> ActionKind {
        let a = self.action.to_lowercase();
        if a.contains("create") || a.contains("add") {
            ActionKind::Create
        } else if a.contains("update") || a.contains("edit") {
            ActionKind::Update
        } else if a.contains("delete") || a.contains("remove") {
            ActionKind::Delete
        } else {
            ActionKind::Other
        }
    }

    /// Timestamp as UTC. Offset-less timestamps are taken to be UTC.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|n| n.and_utc())
    }

    /// Short age such as "just now", "42s ago", "5m ago", "3h ago", "2d ago".
    /// Empty when the timestamp cannot be parsed.
    pub fn relative_age(&self, now: DateTime<Utc>) -> String {
        let Some(at) = self.created_at_utc() else { return String::new() };
        let sec = (now - at).num_seconds();
        let min = sec / 60;
        let hr = min / 60;
        let day = hr / 24;
        if sec < 10 { "just now".to_string() }
        else if sec < 60 { format!("{}s ago", sec) }
        else if min < 60 { format!("{}m ago", min) }
        else if hr < 24 { format!("{}h ago", hr) }
        else { format!("{}d ago", day) }
    }
}

/// Entity filter choices: "all" followed by the distinct entities, sorted.
pub fn entity_options(logs: &[ActivityLog]) -> Vec<String> {
    let set: BTreeSet<&str> = logs.iter().map(|l| l.entity.as_str()).collect();
    std::iter::once("all".to_string()).chain(set.into_iter().map(str::to_string)).collect()
}

pub fn filter_by_entity<'a>(logs: &'a [ActivityLog], entity: &str) -> Vec<&'a ActivityLog> {
    if entity == "all" {
        return logs.iter().collect();
    }
    logs.iter().filter(|l| l.entity == entity).collect()
}

/// Offset paging over the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityPage {
    pub limit: u32,
    pub offset: u32,
}

impl Default for ActivityPage {
    fn default() -> Self { Self { limit: 20, offset: 0 } }
}

impl ActivityPage {
    pub fn query(&self) -> ActivityQuery { ActivityQuery { limit: self.limit, offset: self.offset } }

    pub fn has_prev(&self) -> bool { self.offset > 0 }

    /// A short page means there is nothing after it.
    pub fn has_next(&self, last_page_len: usize) -> bool { last_page_len >= self.limit as usize }

    pub fn prev(&self) -> Self { Self { offset: self.offset.saturating_sub(self.limit), ..*self } }

    pub fn next(&self) -> Self { Self { offset: self.offset.saturating_add(self.limit), ..*self } }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(id: i64, action: &str, entity: &str, created_at: &str) -> ActivityLog {
        ActivityLog {
            id,
            action: action.into(),
            entity: entity.into(),
            entity_id: Some(id),
            actor_user_id: Some(1),
            created_at: created_at.into(),
            extra: Default::default(),
        }
    }

    #[test]
    fn action_classification() {
        assert_eq!(log(1, "project.create", "project", "").action_kind(), ActionKind::Create);
        assert_eq!(log(1, "TAG_ADD", "tag", "").action_kind(), ActionKind::Create);
        assert_eq!(log(1, "edit", "tag", "").action_kind(), ActionKind::Update);
        assert_eq!(log(1, "project.delete", "project", "").action_kind(), ActionKind::Delete);
        assert_eq!(log(1, "login", "user", "").action_kind(), ActionKind::Other);
    }

    #[test]
    fn relative_ages() {
        let now = DateTime::parse_from_rfc3339("2025-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(log(1, "a", "e", "2025-01-01T23:59:55Z").relative_age(now), "just now");
        assert_eq!(log(1, "a", "e", "2025-01-01T23:59:18Z").relative_age(now), "42s ago");
        assert_eq!(log(1, "a", "e", "2025-01-01T23:55:00").relative_age(now), "5m ago");
        assert_eq!(log(1, "a", "e", "2025-01-01T21:00:00.000").relative_age(now), "3h ago");
        assert_eq!(log(1, "a", "e", "2024-12-31T00:00:00+00:00").relative_age(now), "2d ago");
        assert_eq!(log(1, "a", "e", "yesterday").relative_age(now), "");
    }

    #[test]
    fn entity_filtering() {
        let logs = vec![log(1, "a", "tag", ""), log(2, "a", "project", ""), log(3, "a", "tag", "")];
        assert_eq!(entity_options(&logs), vec!["all", "project", "tag"]);
        let tags: Vec<i64> = filter_by_entity(&logs, "tag").iter().map(|l| l.id).collect();
        assert_eq!(tags, vec![1, 3]);
        assert_eq!(filter_by_entity(&logs, "all").len(), 3);
        assert!(filter_by_entity(&logs, "user").is_empty());
    }

    #[test]
    fn paging() {
        let p = ActivityPage::default();
        assert!(!p.has_prev());
        assert_eq!(p.prev().offset, 0);
        let n = p.next();
        assert_eq!(n.query(), ActivityQuery { limit: 20, offset: 20 });
        assert!(n.has_prev());
        assert!(n.has_next(20));
        assert!(!n.has_next(7));
        assert_eq!(ActivityPage { limit: 20, offset: 10 }.prev().offset, 0);
    }

    #[test]
    fn next_page_near_the_offset_ceiling_saturates() {
        let p = ActivityPage { limit: 20, offset: u32::MAX - 5 };
        assert_eq!(p.next().offset, u32::MAX);
        assert_eq!(p.next().next().offset, u32::MAX);
    }
}
