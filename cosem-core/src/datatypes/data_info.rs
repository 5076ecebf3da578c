use crate::datatypes::data_type::DataType;
use crate::datatypes::value::Value;

/// Decode context for one A-XDR value
///
/// `data_type` is `None` for self-describing input (the tag is read from
/// the buffer) or the known type of the value. `count` and `index` track
/// progress through an array or structure so that an interrupted decode can
/// be resumed once more bytes arrive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataInfo {
    pub data_type: Option<DataType>,
    /// Element count of the array being decoded, 0 until read
    pub count: usize,
    /// Number of elements decoded so far
    pub index: usize,
    /// `false` when more bytes are needed
    pub complete: bool,
    /// Elements decoded before an array was interrupted
    pub partial: Vec<Value>,
}

impl DataInfo {
    pub fn new() -> Self {
        Self {
            complete: true,
            ..Self::default()
        }
    }

    /// Context for a value whose type is already known.
    pub fn with_type(data_type: DataType) -> Self {
        Self {
            data_type: Some(data_type),
            complete: true,
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
