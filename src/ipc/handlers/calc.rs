use serde::Deserialize;
use serde_json::json;

use crate::calc::{ratio_opt, CategoryAdjustment};
use crate::ipc::error::{fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Assignment;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatioParams {
    grading_period: String,
    course_id: String,
    #[serde(default)]
    adjustments: Vec<CategoryAdjustment>,
    /// Hypothetical list to grade instead of the overlay, e.g. the prefix
    /// of assignments accumulated up to one due date.
    #[serde(default)]
    assignments: Option<Vec<Assignment>>,
}

fn handle_ratio(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: RatioParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.weighted_ratio(
        &params.grading_period,
        &params.course_id,
        &params.adjustments,
        params.assignments.as_deref(),
    ) {
        Ok(ratio) => ok(&req.id, json!({ "ratio": ratio_opt(ratio) })),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseKeyParams {
    grading_period: String,
    course_id: String,
}

fn handle_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.mark(&params.grading_period, &params.course_id) {
        Ok((rule, ratio)) => ok(
            &req.id,
            json!({
                "mark": rule.mark,
                "color": rule.color,
                "ratio": ratio_opt(ratio),
            }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsParams {
    grading_period: String,
    course_id: String,
    #[serde(default)]
    category: Option<String>,
}

fn handle_points(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: PointsParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.points(
        &params.grading_period,
        &params.course_id,
        params.category.as_deref(),
    ) {
        Ok((points, max_points)) => ok(
            &req.id,
            json!({ "points": points, "maxPoints": max_points }),
        ),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImpactParams {
    grading_period: String,
    course_id: String,
    index: usize,
}

fn handle_impact(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: ImpactParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.impact(&params.grading_period, &params.course_id, params.index) {
        Ok(impact) => ok(&req.id, json!({ "impact": ratio_opt(impact) })),
        Err(e) => fail(&req.id, e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GpaParams {
    #[serde(default)]
    grading_period: Option<String>,
}

fn handle_gpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: GpaParams = match super::parse_params(req) {
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
    match gb.gpa(&period) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => fail(&req.id, e),
    }
}

fn handle_trend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CourseKeyParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    match gb.trend(&params.grading_period, &params.course_id) {
        Ok(points) => ok(&req.id, json!({ "points": points })),
        Err(e) => fail(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.ratio" => Some(handle_ratio(state, req)),
        "calc.mark" => Some(handle_mark(state, req)),
        "calc.points" => Some(handle_points(state, req)),
        "calc.impact" => Some(handle_impact(state, req)),
        "calc.gpa" => Some(handle_gpa(state, req)),
        "calc.trend" => Some(handle_trend(state, req)),
        _ => None,
    }
}
