use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TodoListId;
use crate::models::user::UserId;

db_enum!(
    /// A user's grant on a list. List owners also hold an `Edit` grant on their own lists.
    AccessPermission, "access_permission", {
        Edit => "EDIT",
        View => "VIEW",
    }
);

#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct TodoList {
    pub id: TodoListId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A list that the user can see, along with how they can see it.
#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct AccessibleTodoList {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub list: TodoList,
    pub permission: AccessPermission,
    pub owner_username: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ListOwner {
    pub owner_id: UserId,
    pub username: String,
}

/// A user holding a grant on a list
#[derive(Serialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ListMember {
    pub user_id: UserId,
    pub username: String,
    pub permission: AccessPermission,
}

/// Public information about a list, shown to any logged-in user so they can decide whether to
/// request access.
#[derive(Serialize, Debug, Clone)]
pub struct TodoListSummary {
    #[serde(flatten)]
    pub list: TodoList,
    pub owner_username: String,
    #[serde(rename = "accessibleUsers")]
    pub accessible_users: Vec<ListMember>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TodoListCreatePayload {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListTodoListsQuery {
    pub owned: Option<String>,
}

impl ListTodoListsQuery {
    /// Only `owned=true` restricts the results to owned lists. Any other value is ignored.
    pub fn owned_only(&self) -> bool {
        self.owned.as_deref() == Some("true")
    }
}
