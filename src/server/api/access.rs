//! Loaders that fetch a record, check the caller's permission and confine
//! the caller to their own institution.

use crate::auth::RequireAuth;
use crate::domain::lifecycle::Transition;
use crate::server::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::{Activity, PerformanceData, PerformanceIndicator, Program, Permission};

pub fn program(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<Program, ApiError> {
    auth.require(required)?;
    let program = store
        .get_program(id)
        .api_err("Failed to get program")?
        .or_not_found("Program not found")?;
    auth.check_institution(&program.institution_id)?;
    Ok(program)
}

/// An activity together with the program that places it in an institution.
pub fn activity(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<(Activity, Program), ApiError> {
    auth.require(required)?;
    let activity = store
        .get_activity(id)
        .api_err("Failed to get activity")?
        .or_not_found("Activity not found")?;
    let program = store
        .get_program(&activity.program_id)
        .api_err("Failed to get program")?
        .or_not_found("Program not found")?;
    auth.check_institution(&program.institution_id)?;
    Ok((activity, program))
}

pub fn indicator(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<PerformanceIndicator, ApiError> {
    auth.require(required)?;
    let indicator = store
        .get_indicator(id)
        .api_err("Failed to get indicator")?
        .or_not_found("Indicator not found")?;
    auth.check_institution(&indicator.institution_id)?;
    Ok(indicator)
}

pub fn performance_data(
    auth: &RequireAuth,
    store: &dyn Store,
    id: &str,
    required: Permission,
) -> Result<PerformanceData, ApiError> {
    auth.require(required)?;
    let data = store
        .get_performance_data(id)
        .api_err("Failed to get performance data")?
        .or_not_found("Performance data not found")?;
    auth.check_institution(&data.institution_id)?;
    Ok(data)
}

/// Trims the supplied notes and rejects blanks when the transition needs them.
pub fn transition_notes<S>(
    transition: &Transition<S>,
    notes: Option<String>,
) -> Result<Option<String>, ApiError> {
    let notes = non_empty(notes);
    if transition.requires_notes && notes.is_none() {
        return Err(ApiError::invalid_field("notes", "The notes field is required."));
    }
    Ok(notes)
}

/// Empty strings from form-style clients count as absent.
#[must_use]
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
