use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;

use crate::calc::CalcError;
use crate::gradebook::{Gradebook, SessionContext};
use crate::ipc::error::{fail, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::GradingPeriod;
use crate::policy::{InstitutionProfile, PolicyConfig};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "institution": state.gradebook.as_ref().map(|gb| gb.profile().id.clone()),
            "host": state.gradebook.as_ref().and_then(|gb| gb.context().host.clone()),
        }),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionOpenParams {
    #[serde(default)]
    institution: Option<String>,
    #[serde(default)]
    policy: Option<PolicyConfig>,
    #[serde(default)]
    policy_path: Option<PathBuf>,
    #[serde(default)]
    context: SessionContext,
    grading_periods: Vec<GradingPeriod>,
    default_grading_period: String,
}

fn load_policy_file(path: &Path) -> anyhow::Result<PolicyConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn resolve_profile(params: &mut SessionOpenParams) -> Result<InstitutionProfile, CalcError> {
    if let Some(config) = params.policy.take() {
        return config.build();
    }
    if let Some(path) = params.policy_path.take() {
        let config = load_policy_file(&path).map_err(|e| {
            CalcError::new(
                "bad_policy",
                format!("failed to load policy file {}: {e:#}", path.display()),
            )
        })?;
        return config.build();
    }
    let id = params.institution.as_deref().unwrap_or("default");
    InstitutionProfile::builtin(id).ok_or_else(|| {
        CalcError::new("bad_policy", format!("unknown institution {id:?}"))
    })
}

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut params: SessionOpenParams = match super::parse_params(req) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };

    let profile = match resolve_profile(&mut params) {
        Ok(p) => p,
        Err(e) => return fail(&req.id, e),
    };

    let institution = profile.id.clone();
    let gradebook = match Gradebook::new(
        profile,
        params.context,
        params.grading_periods,
        params.default_grading_period,
    ) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };

    tracing::info!(
        institution = %institution,
        periods = gradebook.grading_periods().len(),
        "session opened"
    );

    let result = json!({
        "institution": institution,
        "defaultGradingPeriod": gradebook.default_grading_period(),
        "gradingPeriods": gradebook.grading_periods(),
        // Echo the active policy so the host can render category labels
        // and mark colors without a second round trip.
        "policy": {
            "weights": gradebook.profile().weighting.weights,
            "markRules": gradebook.profile().marking.rules().collect::<Vec<_>>(),
        },
    });
    state.gradebook = Some(gradebook);
    ok(&req.id, result)
}

fn handle_periods_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let gb = match super::gradebook(state) {
        Ok(gb) => gb,
        Err(e) => return fail(&req.id, e),
    };
    ok(
        &req.id,
        json!({
            "gradingPeriods": gb.grading_periods(),
            "defaultGradingPeriod": gb.default_grading_period(),
            "loaded": gb.loaded_periods(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        "periods.list" => Some(handle_periods_list(state, req)),
        _ => None,
    }
}
