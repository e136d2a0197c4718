//! Unpaginated lists used to fill cascading form selects.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use super::AppState;
use super::api::access;
use super::dto::IndicatorDetail;
use super::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::auth::RequireAuth;
use crate::store::{ActivityFilter, DataFilter, IndicatorFilter, ProgramFilter};
use crate::types::Permission;

const LOOKUP_LIMIT: i32 = 500;

pub fn lookup_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sasaran-strategis/by-instansi/{id}",
            get(objectives_by_institution),
        )
        .route("/programs/by-instansi/{id}", get(programs_by_institution))
        .route("/programs/by-sasaran/{id}", get(programs_by_objective))
        .route("/kegiatan/by-program/{id}", get(activities_by_program))
        .route("/indicators/by-instansi/{id}", get(indicators_by_institution))
        .route("/indicators/{id}", get(indicator_detail))
        .route(
            "/indicators/{id}/performance-data",
            get(indicator_performance_data),
        )
}

async fn objectives_by_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    auth.check_institution(&id)?;

    let objectives = state
        .store
        .list_objectives(Some(&id), "", LOOKUP_LIMIT)
        .api_err("Failed to list strategic objectives")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(objectives)))
}

async fn programs_by_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    auth.check_institution(&id)?;

    let filter = ProgramFilter {
        institution_id: Some(id),
        ..Default::default()
    };
    let programs = state
        .store
        .list_programs(&filter, "", LOOKUP_LIMIT)
        .api_err("Failed to list programs")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(programs)))
}

async fn programs_by_objective(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::MASTER_READ)?;
    let store = state.store.as_ref();
    let objective = store
        .get_objective(&id)
        .api_err("Failed to get strategic objective")?
        .or_not_found("Strategic objective not found")?;
    auth.check_institution(&objective.institution_id)?;

    let filter = ProgramFilter {
        objective_id: Some(objective.id),
        ..Default::default()
    };
    let programs = store
        .list_programs(&filter, "", LOOKUP_LIMIT)
        .api_err("Failed to list programs")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(programs)))
}

async fn activities_by_program(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let program = access::program(&auth, store, &id, Permission::MASTER_READ)?;

    let filter = ActivityFilter {
        program_id: Some(program.id),
        ..Default::default()
    };
    let activities = store
        .list_activities(&filter, "", LOOKUP_LIMIT)
        .api_err("Failed to list activities")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(activities)))
}

async fn indicators_by_institution(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    auth.require(Permission::INDICATOR_READ)?;
    auth.check_institution(&id)?;

    let filter = IndicatorFilter {
        institution_id: Some(id),
        ..Default::default()
    };
    let indicators = state
        .store
        .list_indicators(&filter, "", LOOKUP_LIMIT)
        .api_err("Failed to list indicators")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(indicators)))
}

async fn indicator_detail(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_READ)?;
    let targets = store
        .list_targets(&indicator.id)
        .api_err("Failed to list targets")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(IndicatorDetail {
        indicator,
        targets,
    })))
}

async fn indicator_performance_data(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    auth.require(Permission::DATA_READ)?;
    let indicator = access::indicator(&auth, store, &id, Permission::INDICATOR_READ)?;

    let filter = DataFilter {
        indicator_id: Some(indicator.id),
        ..Default::default()
    };
    let records = store
        .list_performance_data(&filter, "", LOOKUP_LIMIT)
        .api_err("Failed to list performance data")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(records)))
}
