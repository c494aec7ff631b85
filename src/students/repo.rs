use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    store::StoreError,
    students::{
        dto::{StudentFilter, StudentUpdate},
        repo_types::Student,
    },
};

/// Most records a single listing returns.
pub const LIST_LIMIT: usize = 1000;

/// Access to the student collection.
#[async_trait]
pub trait StudentRepo: Send + Sync {
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, StoreError>;

    async fn find_student_by_nim(&self, nim: &str) -> Result<Option<Student>, StoreError>;

    /// Students matching `filter`, in insertion order, at most `limit` of them.
    async fn list_students(
        &self,
        filter: &StudentFilter,
        limit: usize,
    ) -> Result<Vec<Student>, StoreError>;

    /// Fails with `Duplicate("nim")` if the nim is taken.
    async fn insert_student(&self, student: &Student) -> Result<(), StoreError>;

    /// Apply the provided fields and stamp `updated_at`. `None` if the id is gone.
    async fn update_student(
        &self,
        id: Uuid,
        changes: &StudentUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Student>, StoreError>;

    /// `true` if a record was removed.
    async fn delete_student(&self, id: Uuid) -> Result<bool, StoreError>;
}
