//! Client for the taskboard project and task service
//!
//! [`Gateway`] performs every request, attaching the session's access token
//! and transparently refreshing it when the service answers `401`. The typed
//! endpoint methods in [`api`] are built on top of it.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod listing;
pub mod search;
pub mod session;
pub mod types;

pub use api::Dashboard;
pub use config::ClientConfig;
pub use error::{ClientError, RefreshFailure};
pub use gateway::{ApiRequest, Gateway, GatewayBuilder, ResponseBody};
pub use listing::{Page, PageInfo};
pub use search::{ResolvedUser, TaskFilter, UserDirectory};
pub use session::{
    FileTokenStore, MemoryTokenStore, Session, SessionEvent, SessionState, TokenPair, TokenStore,
};
pub use types::{
    CurrentUser, NewProject, NewTask, Priority, Project, Role, SignupRequest, Status, Task,
    TaskUpdate, User,
};
