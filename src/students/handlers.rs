use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    error::AppError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
    students::{
        dto::{MessageResponse, StudentCreate, StudentFilter, StudentUpdate},
        repo_types::Student,
        services,
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/students", get(list_students))
        .route("/students/:id", get(get_student))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/students", axum::routing::post(create_student))
        .route(
            "/students/:id",
            axum::routing::put(update_student).delete(delete_student),
        )
}

#[instrument(skip(state, actor, payload), fields(nim = %payload.nim))]
pub async fn create_student(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    ApiJson(payload): ApiJson<StudentCreate>,
) -> Result<Json<Student>, AppError> {
    let student = services::create_student(state.students.as_ref(), &actor, payload).await?;
    Ok(Json(student))
}

#[instrument(skip(state, _user))]
pub async fn list_students(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    ApiQuery(filter): ApiQuery<StudentFilter>,
) -> Result<Json<Vec<Student>>, AppError> {
    let students = services::list_students(state.students.as_ref(), filter).await?;
    Ok(Json(students))
}

#[instrument(skip(state, _user))]
pub async fn get_student(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Student>, AppError> {
    let student = services::get_student(state.students.as_ref(), &id).await?;
    Ok(Json(student))
}

#[instrument(skip(state, actor, payload))]
pub async fn update_student(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<StudentUpdate>,
) -> Result<Json<Student>, AppError> {
    let student = services::update_student(state.students.as_ref(), &actor, &id, payload).await?;
    Ok(Json(student))
}

#[instrument(skip(state, actor))]
pub async fn delete_student(
    State(state): State<AppState>,
    AdminUser(actor): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_student(state.students.as_ref(), &actor, &id).await?;
    Ok(Json(MessageResponse {
        message: "Student deleted successfully",
    }))
}
