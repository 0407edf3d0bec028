pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, StoreError};
pub use types::{Column, DataType, Row, Schema};
pub use value::{
    DATETIME_FORMAT, MAX_DATETIME, Value, format_datetime, now_utc_string,
    parse_datetime,
};
