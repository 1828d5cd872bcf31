//! User endpoints

use crate::error::ClientError;
use crate::gateway::{ApiRequest, Gateway};
use crate::listing::decode_values;
use crate::search::{UserDirectory, suggest_users};
use crate::types::{CurrentUser, User};

impl Gateway {
    /// User profiles, for resolving assignee filters and display names
    pub async fn list_users(&self) -> Result<UserDirectory, ClientError> {
        let body = self.execute_body(&ApiRequest::get("/api/user/")).await?;
        Ok(UserDirectory::new(decode_values(body)))
    }

    /// Member suggestions for `query`, drawn from the plain user listing
    pub async fn suggest_members(&self, query: &str) -> Result<Vec<User>, ClientError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let body = self.execute_body(&ApiRequest::get("/api/get_user/")).await?;
        Ok(suggest_users(&decode_values(body), query))
    }

    /// Identity and role of the logged-in user
    pub async fn current_user(&self) -> Result<CurrentUser, ClientError> {
        self.execute(&ApiRequest::get("/api/user/me")).await
    }
}
