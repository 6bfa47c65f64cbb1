use super::models::{Project, ProjectInput};
use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};

impl ApiClient {
    pub async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        self.send(&ApiRequest::get("/projects").authenticated()).await?.into_json()
    }

    pub async fn get_project(&self, id: i64) -> ApiResult<Project> {
        self.send(&ApiRequest::get(format!("/projects/{}", id)).authenticated()).await?.into_json()
    }

    pub async fn create_project(&self, input: &ProjectInput) -> ApiResult<Project> {
        let req = ApiRequest::post("/projects").authenticated().json(serde_json::to_value(input)?);
        self.send(&req).await?.into_json()
    }

    pub async fn update_project(&self, id: i64, input: &ProjectInput) -> ApiResult<Project> {
        let req = ApiRequest::put(format!("/projects/{}", id)).authenticated().json(serde_json::to_value(input)?);
        self.send(&req).await?.into_json()
    }

    /// The backend answers 204; any body it does send is ignored.
    pub async fn delete_project(&self, id: i64) -> ApiResult<()> {
        self.send(&ApiRequest::delete(format!("/projects/{}", id)).authenticated()).await?;
        Ok(())
    }
}
