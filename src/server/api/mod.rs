pub mod access;
mod activities;
mod assessments;
mod auth;
mod dashboard;
mod evidence;
mod imports;
mod indicators;
mod institutions;
mod objectives;
mod performance_data;
mod programs;
mod reports;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Institutions
        .route(
            "/instansi",
            get(institutions::list_institutions).post(institutions::create_institution),
        )
        .route(
            "/instansi/{id}",
            get(institutions::get_institution)
                .put(institutions::update_institution)
                .delete(institutions::delete_institution),
        )
        // Strategic objectives
        .route(
            "/sasaran-strategis",
            get(objectives::list_objectives).post(objectives::create_objective),
        )
        .route(
            "/sasaran-strategis/{id}",
            get(objectives::get_objective)
                .put(objectives::update_objective)
                .delete(objectives::delete_objective),
        )
        // Programs
        .route(
            "/programs",
            get(programs::list_programs).post(programs::create_program),
        )
        .route(
            "/programs/{id}",
            get(programs::get_program)
                .put(programs::update_program)
                .delete(programs::delete_program),
        )
        // Activities
        .route(
            "/kegiatan",
            get(activities::list_activities).post(activities::create_activity),
        )
        .route(
            "/kegiatan/{id}",
            get(activities::get_activity)
                .put(activities::update_activity)
                .delete(activities::delete_activity),
        )
        // Indicators and targets
        .route(
            "/indicators",
            get(indicators::list_indicators).post(indicators::create_indicator),
        )
        .route(
            "/indicators/{id}",
            get(indicators::get_indicator)
                .put(indicators::update_indicator)
                .delete(indicators::delete_indicator),
        )
        .route(
            "/indicators/{id}/targets",
            get(indicators::list_targets).put(indicators::replace_targets),
        )
        .route("/indicators/{id}/periods", get(indicators::list_periods))
        // Import and export
        .route(
            "/performance-data/import/template",
            get(imports::download_template),
        )
        .route("/performance-data/import/preview", post(imports::preview))
        .route(
            "/performance-data/import/{session}/confirm",
            post(imports::confirm),
        )
        .route(
            "/performance-data/export",
            get(performance_data::export_performance_data),
        )
        // Performance data
        .route(
            "/performance-data",
            get(performance_data::list_performance_data)
                .post(performance_data::create_performance_data),
        )
        .route(
            "/performance-data/{id}",
            get(performance_data::get_performance_data)
                .put(performance_data::update_performance_data)
                .delete(performance_data::delete_performance_data),
        )
        .route(
            "/performance-data/{id}/submit",
            post(performance_data::submit),
        )
        .route(
            "/performance-data/{id}/validate",
            post(performance_data::validate),
        )
        .route(
            "/performance-data/{id}/reject",
            post(performance_data::reject),
        )
        .route(
            "/performance-data/{id}/request-revision",
            post(performance_data::request_revision),
        )
        .route(
            "/performance-data/{id}/quality",
            get(performance_data::quality),
        )
        // Evidence
        .route(
            "/performance-data/{id}/evidence",
            get(evidence::list_evidence).post(evidence::upload_evidence),
        )
        .route("/evidence/{id}/download", get(evidence::download_evidence))
        .route(
            "/evidence/{id}",
            delete(evidence::delete_evidence),
        )
        // Assessments
        .route("/assessments/auto", post(assessments::auto_assess))
        .route(
            "/assessments",
            get(assessments::list_assessments).post(assessments::create_assessment),
        )
        .route(
            "/assessments/{id}",
            get(assessments::get_assessment)
                .put(assessments::update_assessment)
                .delete(assessments::delete_assessment),
        )
        .route("/assessments/{id}/submit", post(assessments::submit))
        .route("/assessments/{id}/approve", post(assessments::approve))
        .route("/assessments/{id}/reject", post(assessments::reject))
        // Reports
        .route(
            "/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/reports/{id}",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/reports/{id}/submit", post(reports::submit))
        .route("/reports/{id}/approve", post(reports::approve))
        .route("/reports/{id}/reject", post(reports::reject))
        .route("/reports/{id}/export", get(reports::export_report))
        // Dashboard
        .route("/dashboard", get(dashboard::dashboard))
}
