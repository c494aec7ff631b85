use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{repo::UserRepo, repo_types::User},
    store::StoreError,
    students::{
        dto::{StudentFilter, StudentUpdate},
        repo::StudentRepo,
        repo_types::Student,
    },
};

/// In-process store. Uniqueness checks run under the write lock, so they are
/// atomic with the insert or update they guard.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    students: RwLock<Vec<Student>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        users.push(user.clone());
        Ok(())
    }
}

#[async_trait]
impl StudentRepo for MemoryStore {
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, StoreError> {
        let students = self.students.read().await;
        Ok(students.iter().find(|s| s.id == id).cloned())
    }

    async fn find_student_by_nim(&self, nim: &str) -> Result<Option<Student>, StoreError> {
        let students = self.students.read().await;
        Ok(students.iter().find(|s| s.nim == nim).cloned())
    }

    async fn list_students(
        &self,
        filter: &StudentFilter,
        limit: usize,
    ) -> Result<Vec<Student>, StoreError> {
        let students = self.students.read().await;
        Ok(students
            .iter()
            .filter(|s| filter.matches(s))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut students = self.students.write().await;
        if students.iter().any(|s| s.nim == student.nim) {
            return Err(StoreError::Duplicate("nim"));
        }
        students.push(student.clone());
        Ok(())
    }

    async fn update_student(
        &self,
        id: Uuid,
        changes: &StudentUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Student>, StoreError> {
        let mut students = self.students.write().await;
        if let Some(nim) = changes.nim.as_option() {
            if students.iter().any(|s| s.id != id && &s.nim == nim) {
                return Err(StoreError::Duplicate("nim"));
            }
        }
        let Some(student) = students.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        changes.apply(student);
        student.updated_at = updated_at;
        Ok(Some(student.clone()))
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut students = self.students.write().await;
        let before = students.len();
        students.retain(|s| s.id != id);
        Ok(students.len() != before)
    }
}
