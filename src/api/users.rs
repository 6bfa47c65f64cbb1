use super::models::{User, UserCreate};
use crate::error::ApiResult;
use crate::gateway::{ApiClient, ApiRequest};

impl ApiClient {
    /// Admin only on the backend; non-admins get a 403 surfaced as-is.
    pub async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.send(&ApiRequest::get("/users").authenticated()).await?.into_json()
    }

    pub async fn create_user(&self, input: &UserCreate) -> ApiResult<User> {
        let req = ApiRequest::post("/users").authenticated().json(serde_json::to_value(input)?);
        self.send(&req).await?.into_json()
    }
}
