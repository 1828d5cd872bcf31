//! Task endpoints

use crate::error::ClientError;
use crate::gateway::{ApiRequest, Gateway};
use crate::listing::{Page, decode_page};
use crate::search::{TaskFilter, UserDirectory};
use crate::types::{NewTask, Role, Status, Task, TaskUpdate};
use serde_json::{Value, json};
use tracing::debug;

/// Where a new task is posted, given the creator's role
///
/// Employees go through `/api/emp_task`, which files the task as pending and
/// assigns it to the caller; everyone else posts to `/api/task/`.
pub const fn create_task_path(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Employee) => "/api/emp_task",
        _ => "/api/task/",
    }
}

impl Gateway {
    /// One page of tasks matching `filter`
    ///
    /// `previous_page_size` is reported back when the page comes back empty,
    /// so pagination controls keep their size.
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        directory: &UserDirectory,
        page: u32,
        previous_page_size: usize,
    ) -> Result<Page<Task>, ClientError> {
        let mut request = ApiRequest::get("/api/task/");
        for (key, value) in filter.query_params(directory, page) {
            request = request.query(key, value);
        }

        let body = self.execute_body(&request).await?;
        let page = decode_page(body, page, previous_page_size);
        debug!(count = page.info.count, shown = page.items.len(), "Fetched tasks");
        Ok(page)
    }

    /// Create a task through the endpoint matching `role`
    pub async fn create_task(&self, role: Option<Role>, task: &NewTask) -> Result<Value, ClientError> {
        let request = match role {
            Some(Role::Employee) => {
                let employee_task = NewTask {
                    assigned_to: None,
                    status: None,
                    ..task.clone()
                };
                ApiRequest::post(create_task_path(role)).json(&employee_task)?
            }
            _ => {
                let manager_task = NewTask {
                    status: Some(task.status.unwrap_or(Status::Todo)),
                    ..task.clone()
                };
                ApiRequest::post(create_task_path(role)).json(&manager_task)?
            }
        };

        Ok(self.execute_body(&request).await?.into_json())
    }

    pub async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<Value, ClientError> {
        let request = ApiRequest::patch(format!("/api/task/{id}/")).json(update)?;
        Ok(self.execute_body(&request).await?.into_json())
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        self.execute_body(&ApiRequest::delete(format!("/api/task/{id}/")))
            .await?;
        Ok(())
    }

    /// Approve a pending task (managers only)
    pub async fn approve_task(&self, id: i64) -> Result<Value, ClientError> {
        let request = ApiRequest::patch(format!("/api/task_approve/{id}/"))
            .json(&json!({ "status": Status::Todo }))?;
        Ok(self.execute_body(&request).await?.into_json())
    }

    /// Reject a pending task (managers only)
    pub async fn reject_task(&self, id: i64) -> Result<Value, ClientError> {
        let request = ApiRequest::patch(format!("/api/task_reject/{id}/"))
            .json(&json!({ "status": Status::Rejected }))?;
        Ok(self.execute_body(&request).await?.into_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_task_path() {
        assert_eq!(create_task_path(Some(Role::Employee)), "/api/emp_task");
        assert_eq!(create_task_path(Some(Role::Manager)), "/api/task/");
        assert_eq!(create_task_path(None), "/api/task/");
    }
}
