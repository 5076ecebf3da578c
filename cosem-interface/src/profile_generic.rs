//! Profile Generic interface class (Class ID: 7)
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: buffer, rows of captured values
//! - Attribute 3: capture_objects
//! - Attribute 4: capture_period, seconds
//! - Attribute 5: sort_method
//! - Attribute 6: sort_object
//! - Attribute 7: entries_in_use
//! - Attribute 8: profile_entries
//!
//! # Methods
//!
//! - Method 1: reset
//!
//! The buffer supports selective access by range (selector 1) and by entry
//! (selector 2). Rows are appended with [`ProfileGeneric::capture_row`];
//! method 2 (capture) needs access to other objects and is not accessible.

use crate::object::{
    date_time_of, invalid_attribute, invalid_method, logical_name_value, set_logical_name,
    CosemObject, ObjectBase, Selection,
};
use chrono::{DateTime, FixedOffset};
use cosem_application::Settings;
use cosem_core::{
    DataType, DlmsError, DlmsResult, MethodAccessMode, ObisCode, ObjectType, Value,
};

pub const SELECTOR_RANGE: u8 = 1;
pub const SELECTOR_ENTRY: u8 = 2;

/// One column of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureObject {
    pub object_type: ObjectType,
    pub logical_name: ObisCode,
    pub attribute_index: i8,
    /// 0 for the whole attribute
    pub data_index: u16,
}

impl CaptureObject {
    pub fn new(object_type: ObjectType, logical_name: ObisCode, attribute_index: i8) -> Self {
        Self {
            object_type,
            logical_name,
            attribute_index,
            data_index: 0,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Structure(vec![
            Value::UInt16(self.object_type.class_id()),
            Value::OctetString(self.logical_name.to_bytes().to_vec()),
            Value::Int8(self.attribute_index),
            Value::UInt16(self.data_index),
        ])
    }

    /// # Errors
    ///
    /// Anything but a four element capture object definition.
    pub fn from_value(value: &Value) -> DlmsResult<Self> {
        match value.as_structure()? {
            [class_id, ln, attribute, data_index] => Ok(Self {
                object_type: ObjectType::from_class_id(class_id.as_u16()?),
                logical_name: ObisCode::from_bytes(ln.as_bytes()?)?,
                attribute_index: attribute.as_i8()?,
                data_index: data_index.as_u16()?,
            }),
            other => Err(DlmsError::InvalidData(format!(
                "Capture object has {} elements",
                other.len()
            ))),
        }
    }

    fn same_target(&self, other: &Self) -> bool {
        self.object_type == other.object_type
            && self.logical_name == other.logical_name
            && self.attribute_index == other.attribute_index
    }
}

/// Profile Generic interface class (Class ID: 7)
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileGeneric {
    base: ObjectBase,
    pub buffer: Vec<Vec<Value>>,
    pub capture_objects: Vec<CaptureObject>,
    pub capture_period: u32,
    pub sort_method: u8,
    pub sort_object: Option<CaptureObject>,
    /// Maximum number of rows kept, 0 for no limit
    pub profile_entries: u32,
}

impl ProfileGeneric {
    pub const ATTR_BUFFER: u8 = 2;
    pub const ATTR_CAPTURE_OBJECTS: u8 = 3;
    pub const METHOD_RESET: u8 = 1;

    pub fn new(logical_name: ObisCode) -> Self {
        let mut base = ObjectBase::new(logical_name);
        base.version = 1;
        base.set_method_access(2, MethodAccessMode::NoAccess);
        Self {
            base,
            buffer: Vec::new(),
            capture_objects: Vec::new(),
            capture_period: 0,
            sort_method: 1,
            sort_object: None,
            profile_entries: 0,
        }
    }

    /// Append a row, dropping the oldest one when `profile_entries` is
    /// reached.
    pub fn capture_row(&mut self, row: Vec<Value>) -> DlmsResult<()> {
        if row.len() != self.capture_objects.len() {
            return Err(DlmsError::InvalidData(format!(
                "Row of {} values for {} capture objects",
                row.len(),
                self.capture_objects.len()
            )));
        }
        if self.profile_entries != 0 && self.buffer.len() >= self.profile_entries as usize {
            self.buffer.remove(0);
        }
        self.buffer.push(row);
        Ok(())
    }

    fn rows_value<'a>(rows: impl Iterator<Item = &'a Vec<Value>>, columns: &[usize]) -> Value {
        Value::Array(
            rows.map(|row| {
                let cells = if columns.is_empty() {
                    row.clone()
                } else {
                    columns.iter().filter_map(|c| row.get(*c).cloned()).collect()
                };
                Value::Structure(cells)
            })
            .collect(),
        )
    }

    fn column_of(&self, target: &CaptureObject) -> DlmsResult<usize> {
        self.capture_objects
            .iter()
            .position(|c| c.same_target(target))
            .ok_or_else(|| {
                DlmsError::InvalidData(format!(
                    "{} {} is not a capture object",
                    target.object_type, target.logical_name
                ))
            })
    }

    fn rows_by_entry(&self, parameters: &Value) -> DlmsResult<Value> {
        let (from, to, from_column, to_column) = match parameters.as_structure()? {
            [from, to, from_column, to_column] => (
                from.as_u32()? as usize,
                to.as_u32()? as usize,
                from_column.as_u16()? as usize,
                to_column.as_u16()? as usize,
            ),
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Entry descriptor has {} elements",
                    other.len()
                )))
            }
        };
        let from = from.max(1);
        let to = if to == 0 { self.buffer.len() } else { to.min(self.buffer.len()) };
        let from_column = from_column.max(1);
        let to_column = if to_column == 0 {
            self.capture_objects.len()
        } else {
            to_column.min(self.capture_objects.len())
        };
        let columns: Vec<usize> = (from_column - 1..to_column).collect();
        let rows = self
            .buffer
            .iter()
            .skip(from - 1)
            .take((to + 1).saturating_sub(from));
        Ok(Self::rows_value(rows, &columns))
    }

    fn rows_by_range(&self, settings: &Settings, parameters: &Value) -> DlmsResult<Value> {
        let (restricting, from, to, selected) = match parameters.as_structure()? {
            [restricting, from, to, selected] => (restricting, from, to, selected),
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Range descriptor has {} elements",
                    other.len()
                )))
            }
        };
        let column = self.column_of(&CaptureObject::from_value(restricting)?)?;
        let from = chrono_of(&date_time_of(from, settings)?)?;
        let to = chrono_of(&date_time_of(to, settings)?)?;
        let columns = selected
            .as_array()?
            .iter()
            .map(|c| CaptureObject::from_value(c).and_then(|c| self.column_of(&c)))
            .collect::<DlmsResult<Vec<_>>>()?;

        let mut rows = Vec::new();
        for row in &self.buffer {
            let Some(cell) = row.get(column) else { continue };
            let time = chrono_of(&date_time_of(cell, settings)?)?;
            if time >= from && time <= to {
                rows.push(row);
            }
        }
        Ok(Self::rows_value(rows.into_iter(), &columns))
    }
}

fn chrono_of(value: &cosem_core::CosemDateTime) -> DlmsResult<DateTime<FixedOffset>> {
    value
        .to_chrono()
        .ok_or_else(|| DlmsError::InvalidData(format!("Invalid date-time {:?}", value)))
}

impl CosemObject for ProfileGeneric {
    fn object_type(&self) -> ObjectType {
        ObjectType::ProfileGeneric
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        8
    }

    fn method_count(&self) -> u8 {
        2
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 => DataType::OctetString,
            2 | 3 => DataType::Array,
            4 | 7 | 8 => DataType::UInt32,
            5 => DataType::Enum,
            6 => DataType::Structure,
            _ => DataType::None,
        }
    }

    fn get_value(
        &mut self,
        settings: &Settings,
        index: u8,
        selection: Option<&Selection>,
    ) -> DlmsResult<Value> {
        let value = match index {
            1 => logical_name_value(&self.base),
            2 => match selection {
                None => Self::rows_value(self.buffer.iter(), &[]),
                Some(s) if s.selector == SELECTOR_RANGE => {
                    self.rows_by_range(settings, &s.parameters)?
                }
                Some(s) if s.selector == SELECTOR_ENTRY => self.rows_by_entry(&s.parameters)?,
                Some(s) => {
                    return Err(DlmsError::InvalidData(format!(
                        "Invalid selector {}",
                        s.selector
                    )))
                }
            },
            3 => Value::Array(self.capture_objects.iter().map(CaptureObject::to_value).collect()),
            4 => Value::UInt32(self.capture_period),
            5 => Value::Enum(self.sort_method),
            6 => match &self.sort_object {
                Some(object) => object.to_value(),
                None => CaptureObject::new(ObjectType::None, ObisCode::new(0, 0, 0, 0, 0, 0), 0)
                    .to_value(),
            },
            7 => Value::UInt32(self.buffer.len() as u32),
            8 => Value::UInt32(self.profile_entries),
            _ => return Err(invalid_attribute(self.object_type(), index)),
        };
        Ok(value)
    }

    fn set_value(&mut self, _settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value)?,
            2 => {
                self.buffer = match value {
                    Value::None => Vec::new(),
                    Value::Array(rows) => rows
                        .into_iter()
                        .map(|row| match row {
                            Value::Structure(cells) | Value::Array(cells) => Ok(cells),
                            other => Err(DlmsError::InvalidData(format!(
                                "Buffer row is {}",
                                other.data_type()
                            ))),
                        })
                        .collect::<DlmsResult<_>>()?,
                    other => {
                        return Err(DlmsError::InvalidData(format!(
                            "Buffer is {}",
                            other.data_type()
                        )))
                    }
                };
            }
            3 => {
                self.capture_objects = value
                    .as_array()?
                    .iter()
                    .map(CaptureObject::from_value)
                    .collect::<DlmsResult<_>>()?;
                self.buffer.clear();
            }
            4 => self.capture_period = value.as_u32()?,
            5 => self.sort_method = value.as_u8()?,
            6 => {
                let object = CaptureObject::from_value(&value)?;
                self.sort_object = (object.object_type != ObjectType::None).then_some(object);
            }
            // entries_in_use follows the buffer
            7 => {}
            8 => self.profile_entries = value.as_u32()?,
            _ => return Err(invalid_attribute(self.object_type(), index)),
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        _settings: &mut Settings,
        index: u8,
        _parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        match index {
            Self::METHOD_RESET => {
                self.buffer.clear();
                Ok(None)
            }
            _ => Err(invalid_method(self.object_type(), index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_core::CosemDateTime;

    fn load_profile() -> ProfileGeneric {
        let mut profile = ProfileGeneric::new(ObisCode::new(1, 0, 99, 1, 0, 255));
        profile.capture_objects = vec![
            CaptureObject::new(ObjectType::Clock, ObisCode::CLOCK, 2),
            CaptureObject::new(ObjectType::Register, ObisCode::new(1, 0, 1, 8, 0, 255), 2),
            CaptureObject::new(ObjectType::Register, ObisCode::new(1, 0, 2, 8, 0, 255), 2),
        ];
        for hour in 0..4u8 {
            let time = CosemDateTime::new(2024, 5, 1, hour, 0, 0, 0, 0).unwrap();
            profile
                .capture_row(vec![
                    Value::DateTime(time),
                    Value::UInt32(u32::from(hour) * 10),
                    Value::UInt32(u32::from(hour)),
                ])
                .unwrap();
        }
        profile
    }

    #[test]
    fn test_read_by_entry() {
        let settings = Settings::new(true);
        let mut profile = load_profile();
        let selection = Selection {
            selector: SELECTOR_ENTRY,
            parameters: Value::Structure(vec![
                Value::UInt32(2),
                Value::UInt32(3),
                Value::UInt16(2),
                Value::UInt16(2),
            ]),
        };
        let rows = profile.get_value(&settings, 2, Some(&selection)).unwrap();
        assert_eq!(
            rows,
            Value::Array(vec![
                Value::Structure(vec![Value::UInt32(10)]),
                Value::Structure(vec![Value::UInt32(20)]),
            ])
        );
        assert_eq!(profile.get_value(&settings, 7, None).unwrap(), Value::UInt32(4));
    }

    #[test]
    fn test_read_by_range() {
        let settings = Settings::new(true);
        let mut profile = load_profile();
        let from = CosemDateTime::new(2024, 5, 1, 1, 0, 0, 0, 0).unwrap();
        let to = CosemDateTime::new(2024, 5, 1, 2, 30, 0, 0, 0).unwrap();
        let selection = Selection {
            selector: SELECTOR_RANGE,
            parameters: Value::Structure(vec![
                profile.capture_objects[0].to_value(),
                Value::OctetString(from.to_date_time_bytes(false).to_vec()),
                Value::OctetString(to.to_date_time_bytes(false).to_vec()),
                Value::Array(vec![]),
            ]),
        };
        let rows = profile.get_value(&settings, 2, Some(&selection)).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_profile_entries_limit_and_reset() {
        let mut settings = Settings::new(true);
        let mut profile = load_profile();
        profile.profile_entries = 4;
        profile
            .capture_row(vec![Value::None, Value::UInt32(99), Value::UInt32(9)])
            .unwrap();
        assert_eq!(profile.buffer.len(), 4);
        assert_eq!(profile.buffer[3][1], Value::UInt32(99));
        assert!(profile.capture_row(vec![Value::None]).is_err());

        profile.invoke(&mut settings, 1, &Value::Int8(0)).unwrap();
        assert!(profile.buffer.is_empty());
        assert!(profile.invoke(&mut settings, 2, &Value::Int8(0)).is_err());
    }

    #[test]
    fn test_set_capture_objects_clears_buffer() {
        let mut settings = Settings::new(false);
        let mut profile = load_profile();
        let columns = Value::Array(vec![profile.capture_objects[1].to_value()]);
        profile.set_value(&mut settings, 3, columns).unwrap();
        assert_eq!(profile.capture_objects.len(), 1);
        assert!(profile.buffer.is_empty());
    }
}
