use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{serde_as, NoneAsEmptyString};

use super::TodoId;
use crate::models::{
    todo_list::{AccessPermission, ListMember, ListOwner, TodoListId},
    user::UserId,
};

db_enum!(
    /// Progress on a todo item
    TodoStatus, "todo_status", {
        NotStarted => "NOT_STARTED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Blocked => "BLOCKED",
    }
);

impl Default for TodoStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

db_enum!(
    /// Priority of a todo item. P0 is the most urgent.
    TodoPriority, "todo_priority", {
        P0 => "P0",
        P1 => "P1",
        P2 => "P2",
        P3 => "P3",
    }
);

impl Default for TodoPriority {
    fn default() -> Self {
        Self::P1
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Todo {
    pub id: TodoId,
    pub list_id: TodoListId,
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub created_at: DateTime<Utc>,
}

/// A todo along with the list owner and the requesting user's effective permission.
#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct TodoWithPermission {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub todo: Todo,
    pub owner_id: UserId,
    pub permission: AccessPermission,
}

/// The todos in a list, with the list's owner and the users who can access it.
#[derive(Serialize, Debug, Clone)]
pub struct TodoListContents {
    pub todos: Vec<Todo>,
    pub owner: Option<ListOwner>,
    #[serde(rename = "accessibleUsers")]
    pub accessible_users: Vec<ListMember>,
}

/// Parse a due date. Accepts `YYYY-MM-DD` or a full timestamp, of which only the date is kept.
fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
}

/// Deserialize an optional date where `null` and an empty string both mean no date.
fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Like [deserialize_optional_date], but distinguishes a field set to `null` (`Some(None)`)
/// from a missing field, which is handled by `#[serde(default)]`.
fn deserialize_date_update<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_optional_date(deserializer).map(Some)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TodoCreatePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "dueDate", default, deserialize_with = "deserialize_optional_date")]
    pub due_date: Option<NaiveDate>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TodoUpdatePayload {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "dueDate", default, deserialize_with = "deserialize_date_update")]
    pub due_date: Option<Option<NaiveDate>>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    #[default]
    DueDate,
    Status,
    Title,
    Priority,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DueDate => "due_date",
            Self::Status => "status",
            Self::Title => "title",
            Self::Priority => "priority",
            Self::CreatedAt => "created_at",
        }
    }

    /// Parse a sort field, falling back to the due date for anything unrecognized.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("status") => Self::Status,
            Some("title") => Self::Title,
            Some("priority") => Self::Priority,
            Some("created_at") => Self::CreatedAt,
            _ => Self::DueDate,
        }
    }
}

/// A date that can be read from a query string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDate(pub NaiveDate);

impl FromStr for QueryDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_date(s).map(QueryDate)
    }
}

impl Display for QueryDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[serde_as]
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListTodosQuery {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub status: Option<TodoStatus>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub priority: Option<TodoPriority>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default, rename = "dueDate")]
    pub due_date: Option<QueryDate>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortDir")]
    pub sort_dir: Option<String>,
}

impl ListTodosQuery {
    pub fn sort_field(&self) -> SortField {
        SortField::parse_or_default(self.sort_by.as_deref())
    }

    pub fn descending(&self) -> bool {
        self.sort_dir
            .as_deref()
            .map(|d| d.eq_ignore_ascii_case("desc"))
            .unwrap_or(false)
    }
}
