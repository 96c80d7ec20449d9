pub mod endpoints;
pub mod queries;
pub mod types;

pub use types::*;

listmate_web::make_id!(
    /// The ID of a todo list
    TodoListId
);
