use serde::Deserialize;
use serde_json::json;

use crate::ipc::error::{fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Course;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PopulateParams {
    grading_period: String,
    courses: Vec<Course>,
}

fn handle_populate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: PopulateParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.populate_all(&params.grading_period, params.courses) {
        Ok(count) => {
            tracing::debug!(period = %params.grading_period, count, "grading period populated");
            ok(&req.id, json!({ "gradingPeriod": params.grading_period, "count": count }))
        }
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseLoadParams {
    grading_period: String,
    course: Course,
}

fn handle_course_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseLoadParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    let class_id = params.course.class_id.clone();
    let count = params.course.assignments.len();
    match gb.accept_snapshot(&params.grading_period, params.course) {
        Ok(()) => ok(
            &req.id,
            json!({ "classId": class_id, "assignmentCount": count }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PeriodParams {
    #[serde(default)]
    grading_period: Option<String>,
}

fn handle_course_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: PeriodParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    let period = params
        .grading_period
        .unwrap_or_else(|| gb.default_grading_period().to_string());
    match gb.course_list(&period) {
        Ok(tiles) => ok(&req.id, json!({ "gradingPeriod": period, "courses": tiles })),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseKeyParams {
    grading_period: String,
    course_id: String,
}

fn handle_course_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.overlay(&params.grading_period, &params.course_id) {
        Ok(overlay) => ok(&req.id, json!({ "needsRollback": overlay.needs_rollback })),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseSetStateParams {
    grading_period: String,
    course_id: String,
    needs_rollback: bool,
}

fn handle_course_set_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseSetStateParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.set_needs_rollback(&params.grading_period, &params.course_id, params.needs_rollback) {
        Ok(()) => ok(&req.id, json!({ "needsRollback": params.needs_rollback })),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_course_rollback(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook_mut(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.rollback(&params.grading_period, &params.course_id) {
        Ok(overlay) => ok(
            &req.id,
            json!({
                "needsRollback": overlay.needs_rollback,
                "assignmentCount": overlay.assignments.len(),
            }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.populate" => Some(handle_populate(state, req)),
        "course.load" => Some(handle_course_load(state, req)),
        "course.list" => Some(handle_course_list(state, req)),
        "course.state" => Some(handle_course_state(state, req)),
        "course.setState" => Some(handle_course_set_state(state, req)),
        "course.rollback" => Some(handle_course_rollback(state, req)),
        _ => None,
    }
}
