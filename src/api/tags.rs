use std::collections::HashMap;

use super::models::{Tag, TagInput};
use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};

impl ApiClient {
    pub async fn list_tags(&self) -> ApiResult<Vec<Tag>> {
        self.send(&ApiRequest::get("/tags").authenticated()).await?.into_json()
    }

    pub async fn create_tag(&self, input: &TagInput) -> ApiResult<Tag> {
        let req = ApiRequest::post("/tags").authenticated().json(serde_json::to_value(input)?);
        self.send(&req).await?.into_json()
    }

    pub async fn update_tag(&self, id: i64, input: &TagInput) -> ApiResult<Tag> {
        let req = ApiRequest::put(format!("/tags/{}", id)).authenticated().json(serde_json::to_value(input)?);
        self.send(&req).await?.into_json()
    }

    pub async fn delete_tag(&self, id: i64) -> ApiResult<()> {
        self.send(&ApiRequest::delete(format!("/tags/{}", id)).authenticated()).await?;
        Ok(())
    }
}

/// Names for the selected tag ids, in selection order. Unknown ids are
/// skipped and duplicates kept.
pub fn tag_names_for(ids: &[i64], tags: &[Tag]) -> Vec<String> {
    let by_id: HashMap<i64, &str> = tags.iter().map(|t| (t.id, t.name.as_str())).collect();
    ids.iter().filter_map(|id| by_id.get(id).map(|n| n.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(i64, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(id, n)| Tag { id: *id, name: n.to_string() }).collect()
    }

    #[test]
    fn maps_ids_in_order() {
        let t = tags(&[(1, "React"), (2, "TypeScript"), (3, "Next.js")]);
        assert_eq!(tag_names_for(&[1, 3], &t), vec!["React", "Next.js"]);
        assert_eq!(tag_names_for(&[3, 1, 2], &t), vec!["Next.js", "React", "TypeScript"]);
    }

    #[test]
    fn skips_unknown_and_keeps_duplicates() {
        let t = tags(&[(1, "React"), (2, "TypeScript")]);
        assert_eq!(tag_names_for(&[1, 999, 2], &t), vec!["React", "TypeScript"]);
        assert_eq!(tag_names_for(&[999, 888], &t), Vec::<String>::new());
        assert_eq!(tag_names_for(&[1, 1, 2], &t), vec!["React", "React", "TypeScript"]);
        assert!(tag_names_for(&[], &t).is_empty());
    }
}
