/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Job id used for preview conversions that are never persisted.
pub const PREVIEW_JOB_ID: DbId = 0;
