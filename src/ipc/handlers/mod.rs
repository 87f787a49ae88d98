pub mod assignments;
pub mod calc;
pub mod core;
pub mod courses;

use serde::de::DeserializeOwned;

use super::types::{AppState, Request};
use crate::calc::CalcError;
use crate::gradebook::Gradebook;

pub(crate) fn parse_params<T: DeserializeOwned>(req: &Request) -> Result<T, CalcError> {
    serde_json::from_value(req.params.clone())
        .map_err(|e| CalcError::new("bad_params", e.to_string()))
}

pub(crate) fn gradebook(state: &AppState) -> Result<&Gradebook, CalcError> {
    state
        .gradebook
        .as_ref()
        .ok_or_else(|| CalcError::new("no_session", "no session is open"))
}

pub(crate) fn gradebook_mut(state: &mut AppState) -> Result<&mut Gradebook, CalcError> {
    state
        .gradebook
        .as_mut()
        .ok_or_else(|| CalcError::new("no_session", "no session is open"))
}
