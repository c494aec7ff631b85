//! Storage backends behind the [`UserRepo`](crate::auth::repo::UserRepo) and
//! [`StudentRepo`](crate::students::repo::StudentRepo) traits.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use time::OffsetDateTime;

/// Current UTC time truncated to microseconds, the precision of `TIMESTAMPTZ`,
/// so a record reads back exactly as it was returned when written.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A write collided with a uniqueness constraint on the named field.
    #[error("duplicate value for unique field `{0}`")]
    Duplicate(&'static str),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
