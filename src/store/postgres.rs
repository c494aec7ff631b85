use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    FromRow, PgPool,
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepo,
        repo_types::{Role, User},
    },
    store::StoreError,
    students::{
        dto::{StudentFilter, StudentUpdate},
        repo::StudentRepo,
        repo_types::Student,
    },
};

const STUDENT_COLUMNS: &str =
    "id, nim, nama, email, program_studi, angkatan, created_at, updated_at";

/// Postgres-backed store. Uniqueness of `users.email` and `students.nim` is
/// enforced by table constraints, so concurrent duplicate inserts cannot both win.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, database: Option<&str>) -> anyhow::Result<Self> {
        let mut options = PgConnectOptions::from_str(url).context("parse DATABASE_URL")?;
        if let Some(name) = database {
            options = options.database(name);
        }
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            email: r.email,
            name: r.name,
            role: r.role.parse::<Role>()?,
            password_hash: r.password_hash,
            created_at: r.created_at,
        })
    }
}

fn write_error(e: sqlx::Error, unique_field: &'static str, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(unique_field);
        }
    }
    StoreError::Backend(anyhow::Error::new(e).context(what))
}

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, role, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::try_from).transpose()?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, "email", "insert user"))?;
        Ok(())
    }
}

#[async_trait]
impl StudentRepo for PgStore {
    async fn find_student(&self, id: Uuid) -> Result<Option<Student>, StoreError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find student")?;
        Ok(student)
    }

    async fn find_student_by_nim(&self, nim: &str) -> Result<Option<Student>, StoreError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE nim = $1"
        ))
        .bind(nim)
        .fetch_optional(&self.db)
        .await
        .context("find student by nim")?;
        Ok(student)
    }

    async fn list_students(
        &self,
        filter: &StudentFilter,
        limit: usize,
    ) -> Result<Vec<Student>, StoreError> {
        // strpos keeps the match literal; LIKE would treat % and _ as wildcards.
        let rows = sqlx::query_as::<_, Student>(&format!(
            r#"
            SELECT {STUDENT_COLUMNS}
            FROM students
            WHERE ($1::text IS NULL
                   OR strpos(lower(nama), lower($1)) > 0
                   OR strpos(lower(nim), lower($1)) > 0
                   OR strpos(lower(email), lower($1)) > 0)
              AND ($2::text IS NULL OR strpos(lower(program_studi), lower($2)) > 0)
              AND ($3::int IS NULL OR angkatan = $3)
            ORDER BY created_at
            LIMIT $4
            "#
        ))
        .bind(filter.search.as_deref())
        .bind(filter.program_studi.as_deref())
        .bind(filter.angkatan)
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await
        .context("list students")?;
        Ok(rows)
    }

    async fn insert_student(&self, student: &Student) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO students (id, nim, nama, email, program_studi, angkatan, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(student.id)
        .bind(&student.nim)
        .bind(&student.nama)
        .bind(&student.email)
        .bind(&student.program_studi)
        .bind(student.angkatan)
        .bind(student.created_at)
        .bind(student.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| write_error(e, "nim", "insert student"))?;
        Ok(())
    }

    async fn update_student(
        &self,
        id: Uuid,
        changes: &StudentUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Student>, StoreError> {
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            UPDATE students
               SET nim = COALESCE($2, nim),
                   nama = COALESCE($3, nama),
                   email = COALESCE($4, email),
                   program_studi = COALESCE($5, program_studi),
                   angkatan = COALESCE($6, angkatan),
                   updated_at = $7
             WHERE id = $1
            RETURNING {STUDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.nim.as_option().map(String::as_str))
        .bind(changes.nama.as_option().map(String::as_str))
        .bind(changes.email.as_option().map(String::as_str))
        .bind(changes.program_studi.as_option().map(String::as_str))
        .bind(changes.angkatan.as_option().copied())
        .bind(updated_at)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, "nim", "update student"))?;
        Ok(student)
    }

    async fn delete_student(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete student")?;
        Ok(result.rows_affected() > 0)
    }
}
