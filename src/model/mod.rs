pub mod record;
pub mod user;

pub use record::Record;
pub use user::{
    COLUMN_CREATED_AT, COLUMN_EMAIL, COLUMN_FIRST_NAME, COLUMN_ID, COLUMN_LAST_NAME, COLUMN_MEMO,
    COLUMN_SOFT_DELETED_AT, COLUMN_STATUS, COLUMN_UPDATED_AT, RESERVED_COLUMNS, UserStatus,
    user_schema,
};
