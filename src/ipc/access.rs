//! Who is calling. Each request names its actor in `params.actor`; the host
//! application has already authenticated them.

use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::HandlerErr;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "role", rename_all = "camelCase")]
pub enum Actor {
    #[serde(rename_all = "camelCase")]
    Student { student_id: String },
    #[serde(rename_all = "camelCase")]
    Admin { admin_id: String },
}

impl Actor {
    pub fn role(&self) -> &'static str {
        match self {
            Actor::Student { .. } => "student",
            Actor::Admin { .. } => "admin",
        }
    }
}

pub fn actor(params: &serde_json::Value) -> Result<Actor, HandlerErr> {
    let Some(raw) = params.get("actor") else {
        return Err(HandlerErr::new("unauthenticated", "missing actor"));
    };
    let actor: Actor = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::new("unauthenticated", format!("invalid actor: {}", e)))?;
    let id = match &actor {
        Actor::Student { student_id } => student_id,
        Actor::Admin { admin_id } => admin_id,
    };
    if id.trim().is_empty() {
        return Err(HandlerErr::new("unauthenticated", "actor id must not be empty"));
    }
    Ok(actor)
}

fn forbidden(actor: &Actor, required: &str) -> HandlerErr {
    HandlerErr::new("forbidden", format!("{} access required", required))
        .with_details(json!({ "role": actor.role() }))
}

/// Returns the admin id, or `forbidden` for any other role.
pub fn require_admin(params: &serde_json::Value) -> Result<String, HandlerErr> {
    match actor(params)? {
        Actor::Admin { admin_id } => Ok(admin_id),
        other @ Actor::Student { .. } => Err(forbidden(&other, "admin")),
    }
}

/// Returns the student id, or `forbidden` for any other role.
pub fn require_student(params: &serde_json::Value) -> Result<String, HandlerErr> {
    match actor(params)? {
        Actor::Student { student_id } => Ok(student_id),
        other @ Actor::Admin { .. } => Err(forbidden(&other, "student")),
    }
}
