use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{
        todo_list::{AccessPermission, TodoListId},
        user::UserId,
    },
    Error,
};

db_enum!(
    /// The state of a request for access to a list
    RequestStatus, "request_status", {
        Pending => "PENDING",
        Accepted => "ACCEPTED",
    }
);

/// An access request, with the name of the user who made it
#[derive(Serialize, Debug, Clone, sqlx::FromRow)]
pub struct AccessRequest {
    pub list_id: TodoListId,
    pub user_id: UserId,
    pub requested_permission: AccessPermission,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ExistingRequest {
    pub requested_permission: AccessPermission,
    pub status: RequestStatus,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AccessRequestCreatePayload {
    pub permission: Option<String>,
}

impl AccessRequestCreatePayload {
    pub fn requested_permission(&self) -> Result<AccessPermission, Error> {
        self.permission
            .as_deref()
            .and_then(|p| p.parse().ok())
            .ok_or(Error::InvalidRequestedPermission)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ListAccessRequestsQuery {
    pub status: Option<String>,
}

impl ListAccessRequestsQuery {
    /// The status to filter on. A missing or empty value returns requests of every status.
    pub fn status_filter(&self) -> Result<Option<RequestStatus>, Error> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(|_| Error::InvalidStatusFilter),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AccessRequestUpdatePayload {
    pub status: Option<String>,
}

impl AccessRequestUpdatePayload {
    /// Requests can only move to `ACCEPTED`.
    pub fn new_status(&self) -> Result<RequestStatus, Error> {
        match self.status.as_deref().map(str::parse) {
            Some(Ok(RequestStatus::Accepted)) => Ok(RequestStatus::Accepted),
            _ => Err(Error::InvalidRequestUpdate),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestUpdated {
    pub message: &'static str,
    pub status: RequestStatus,
    pub user_id: UserId,
    pub list_id: TodoListId,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn requested_permission() {
        let p = AccessRequestCreatePayload {
            permission: Some("VIEW".into()),
        };
        assert_eq!(p.requested_permission().unwrap(), AccessPermission::View);

        for bad in [None, Some("OWNER".to_string()), Some("edit".to_string())] {
            let p = AccessRequestCreatePayload { permission: bad };
            assert!(matches!(
                p.requested_permission(),
                Err(Error::InvalidRequestedPermission)
            ));
        }
    }

    #[test]
    fn status_filter() {
        let q = ListAccessRequestsQuery::default();
        assert_eq!(q.status_filter().unwrap(), None);

        let q = ListAccessRequestsQuery {
            status: Some(String::new()),
        };
        assert_eq!(q.status_filter().unwrap(), None);

        let q = ListAccessRequestsQuery {
            status: Some("ACCEPTED".into()),
        };
        assert_eq!(q.status_filter().unwrap(), Some(RequestStatus::Accepted));

        let q = ListAccessRequestsQuery {
            status: Some("REJECTED".into()),
        };
        assert!(matches!(q.status_filter(), Err(Error::InvalidStatusFilter)));
    }

    #[test]
    fn only_accepting_is_allowed() {
        let p = AccessRequestUpdatePayload {
            status: Some("ACCEPTED".into()),
        };
        assert_eq!(p.new_status().unwrap(), RequestStatus::Accepted);

        for bad in [None, Some("PENDING".to_string()), Some("accepted".to_string())] {
            let p = AccessRequestUpdatePayload { status: bad };
            assert!(matches!(p.new_status(), Err(Error::InvalidRequestUpdate)));
        }
    }

    #[test]
    fn update_response_uses_camel_case() {
        let value = serde_json::to_value(AccessRequestUpdated {
            message: "ok",
            status: RequestStatus::Accepted,
            user_id: UserId(4),
            list_id: TodoListId(2),
        })
        .unwrap();

        assert_eq!(
            value,
            serde_json::json!({ "message": "ok", "status": "ACCEPTED", "userId": 4, "listId": 2 })
        );
    }
}
