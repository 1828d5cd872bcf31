//! Project endpoints

use crate::error::ClientError;
use crate::gateway::{ApiRequest, Gateway};
use crate::listing::decode_page;
use crate::types::{NewProject, Project};
use serde_json::{Value, json};
use tracing::debug;

impl Gateway {
    /// Projects visible to the current user
    ///
    /// Managers see the projects they created, employees the ones they are a
    /// member of.
    pub async fn list_projects(&self) -> Result<Vec<Project>, ClientError> {
        let body = self.execute_body(&ApiRequest::get("/api/project/")).await?;
        Ok(decode_page(body, 1, 0).items)
    }

    /// Create a project
    ///
    /// Some deployments name the member field `members_user`; when the
    /// `members` payload is refused the same project is posted again with
    /// that field. The error from the last attempt is returned.
    pub async fn create_project(&self, project: &NewProject) -> Result<Value, ClientError> {
        let request = ApiRequest::post("/api/project/").json(project)?;
        match self.execute_body(&request).await {
            Ok(body) => Ok(body.into_json()),
            Err(ClientError::Api { status, .. }) => {
                debug!(status, "Project payload refused, retrying with members_user");
                let fallback = ApiRequest::post("/api/project/").json(&json!({
                    "name": project.name,
                    "description": project.description,
                    "members_user": project.members,
                }))?;
                Ok(self.execute_body(&fallback).await?.into_json())
            }
            Err(e) => Err(e),
        }
    }

    /// Soft-delete a project by flagging it `is_deleted`
    pub async fn delete_project(&self, id: i64) -> Result<(), ClientError> {
        let request = ApiRequest::patch(format!("/api/project/{id}/")).json(&json!({
            "is_deleted": true
        }))?;
        self.execute_body(&request).await?;
        Ok(())
    }
}
