use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::{fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, AssignmentPatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseKeyParams {
    grading_period: String,
    course_id: String,
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.overlay(&params.grading_period, &params.course_id) {
        Ok(overlay) => ok(
            &req.id,
            json!({
                "assignments": overlay.assignments,
                "needsRollback": overlay.needs_rollback,
            }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetParams {
    grading_period: String,
    course_id: String,
    assignments: Vec<Assignment>,
}

fn handle_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: SetParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    let count = params.assignments.len();
    match gb.set_assignments(&params.grading_period, &params.course_id, params.assignments) {
        Ok(()) => ok(&req.id, json!({ "count": count, "needsRollback": true })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.add_custom_assignment(&params.grading_period, &params.course_id) {
        Ok(assignment) => ok(&req.id, json!({ "index": 0, "assignment": assignment })),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    grading_period: String,
    course_id: String,
    index: usize,
    patch: AssignmentPatch,
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: UpdateParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.update_assignment(
        &params.grading_period,
        &params.course_id,
        params.index,
        params.patch,
    ) {
        Ok(assignment) => ok(
            &req.id,
            json!({ "index": params.index, "assignment": assignment }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteParams {
    grading_period: String,
    course_id: String,
    index: usize,
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: DeleteParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.delete_assignment(&params.grading_period, &params.course_id, params.index) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => fail(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignments.list" => Some(handle_list(state, req)),
        "assignments.set" => Some(handle_set(state, req)),
        "assignment.add" => Some(handle_add(state, req)),
        "assignment.update" => Some(handle_update(state, req)),
        "assignment.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
