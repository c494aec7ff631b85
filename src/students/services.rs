use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{repo_types::User, services::is_valid_email},
    error::AppError,
    store::{now_utc, StoreError},
    students::{
        dto::{StudentCreate, StudentFilter, StudentUpdate},
        repo::{StudentRepo, LIST_LIMIT},
        repo_types::Student,
    },
};

const NOT_FOUND: AppError = AppError::NotFound("Student not found");

fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::Duplicate(_) => AppError::Conflict("NIM already exists"),
        StoreError::Backend(e) => AppError::Internal(e),
    }
}

/// Ids are opaque to callers; one that is not even a UUID simply does not exist.
fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| NOT_FOUND)
}

pub async fn create_student(
    repo: &dyn StudentRepo,
    actor: &User,
    req: StudentCreate,
) -> Result<Student, AppError> {
    if !is_valid_email(&req.email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    if repo.find_student_by_nim(&req.nim).await.map_err(store_error)?.is_some() {
        warn!(nim = %req.nim, "nim already exists");
        return Err(AppError::Conflict("NIM already exists"));
    }

    let now = now_utc();
    let student = Student {
        id: Uuid::new_v4(),
        nim: req.nim,
        nama: req.nama,
        email: req.email,
        program_studi: req.program_studi,
        angkatan: req.angkatan,
        created_at: now,
        updated_at: now,
    };
    repo.insert_student(&student).await.map_err(store_error)?;

    info!(student_id = %student.id, nim = %student.nim, actor = %actor.id, "student created");
    Ok(student)
}

pub async fn list_students(
    repo: &dyn StudentRepo,
    filter: StudentFilter,
) -> Result<Vec<Student>, AppError> {
    let filter = filter.normalized();
    repo.list_students(&filter, LIST_LIMIT)
        .await
        .map_err(store_error)
}

pub async fn get_student(repo: &dyn StudentRepo, id: &str) -> Result<Student, AppError> {
    let id = parse_id(id)?;
    repo.find_student(id)
        .await
        .map_err(store_error)?
        .ok_or(NOT_FOUND)
}

/// Apply only the provided fields. An empty update is a no-op that returns
/// the record as stored, `updated_at` included.
pub async fn update_student(
    repo: &dyn StudentRepo,
    actor: &User,
    id: &str,
    changes: StudentUpdate,
) -> Result<Student, AppError> {
    let id = parse_id(id)?;
    let current = repo
        .find_student(id)
        .await
        .map_err(store_error)?
        .ok_or(NOT_FOUND)?;

    if let Some(email) = changes.email.as_option() {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email".into()));
        }
    }
    if changes.is_empty() {
        return Ok(current);
    }

    let updated = repo
        .update_student(id, &changes, now_utc())
        .await
        .map_err(store_error)?
        .ok_or(NOT_FOUND)?;

    info!(student_id = %id, actor = %actor.id, "student updated");
    Ok(updated)
}

pub async fn delete_student(
    repo: &dyn StudentRepo,
    actor: &User,
    id: &str,
) -> Result<(), AppError> {
    let id = parse_id(id)?;
    if !repo.delete_student(id).await.map_err(store_error)? {
        return Err(NOT_FOUND);
    }
    info!(student_id = %id, actor = %actor.id, "student deleted");
    Ok(())
}
