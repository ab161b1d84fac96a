//! Row visibility per role, appended to listing and summary queries.
//!
//! Doers see their own work, managers see their team's work plus whatever
//! they assigned, admins see everything. Clients have no task views.

use sqlx::{MySql, QueryBuilder};

use crate::auth::CurrentUser;
use crate::error::ApiError;

/// Expects `tasks t JOIN users u ON u.id = t.doer_id` in the FROM clause.
pub fn push_delegation_scope(builder: &mut QueryBuilder<'_, MySql>, user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_client() {
        return Err(ApiError::Forbidden("Clients cannot view tasks".into()));
    }
    if user.is_doer() {
        builder.push(" AND t.doer_id = ").push_bind(user.id);
    } else if user.is_manager() {
        builder
            .push(" AND (u.manager_id = ")
            .push_bind(user.id)
            .push(" OR t.assigned_by = ")
            .push_bind(user.id)
            .push(" OR t.doer_id = ")
            .push_bind(user.id)
            .push(")");
    }
    Ok(())
}

/// Expects `checklist_subtasks c` in the FROM clause.
pub fn push_checklist_scope(builder: &mut QueryBuilder<'_, MySql>, user: &CurrentUser) -> Result<(), ApiError> {
    if user.is_client() {
        return Err(ApiError::Forbidden("Clients cannot view tasks".into()));
    }
    if user.is_doer() {
        builder.push(" AND c.assignee = ").push_bind(user.username.clone());
    } else if user.is_manager() {
        builder
            .push(" AND (c.assignee IN (SELECT username FROM users WHERE manager_id = ")
            .push_bind(user.id)
            .push(") OR c.assigned_by = ")
            .push_bind(user.id)
            .push(" OR c.assignee = ")
            .push_bind(user.username.clone())
            .push(")");
    }
    Ok(())
}
