//! Data types used in DLMS/COSEM protocol

pub mod bit_string;
pub mod data_info;
pub mod data_type;
pub mod date_time;
pub mod value;

pub use bit_string::BitString;
pub use data_info::DataInfo;
pub use data_type::DataType;
pub use date_time::{days_in_month, ClockStatus, CosemDateTime, DateTimeSkips};
pub use value::Value;
