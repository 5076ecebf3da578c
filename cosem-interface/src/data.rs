//! Data interface class (Class ID: 1)
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: value

use crate::object::{
    invalid_attribute, logical_name_value, set_logical_name, CosemObject, ObjectBase, Selection,
};
use cosem_application::Settings;
use cosem_core::{DataType, DlmsResult, ObisCode, ObjectType, Value};

/// Data interface class (Class ID: 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    base: ObjectBase,
    pub value: Value,
}

impl Data {
    pub const ATTR_VALUE: u8 = 2;

    pub fn new(logical_name: ObisCode, value: Value) -> Self {
        Self {
            base: ObjectBase::new(logical_name),
            value,
        }
    }
}

impl CosemObject for Data {
    fn object_type(&self) -> ObjectType {
        ObjectType::Data
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        2
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 => DataType::OctetString,
            _ => DataType::None,
        }
    }

    fn get_value(
        &mut self,
        _settings: &Settings,
        index: u8,
        _selection: Option<&Selection>,
    ) -> DlmsResult<Value> {
        match index {
            1 => Ok(logical_name_value(&self.base)),
            2 => Ok(self.value.clone()),
            _ => Err(invalid_attribute(self.object_type(), index)),
        }
    }

    fn set_value(&mut self, _settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value),
            2 => {
                self.value = value;
                Ok(())
            }
            _ => Err(invalid_attribute(self.object_type(), index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_core::{DlmsError, ErrorCode};

    #[test]
    fn test_data_attributes() {
        let obis = ObisCode::new(0, 0, 96, 1, 0, 255);
        let mut settings = Settings::new(true);
        let mut data = Data::new(obis, Value::Int32(12345));

        assert_eq!(
            data.get_value(&settings, 1, None).unwrap(),
            Value::OctetString(obis.to_bytes().to_vec())
        );
        assert_eq!(data.get_value(&settings, 2, None).unwrap(), Value::Int32(12345));

        data.set_value(&mut settings, 2, Value::String("serial".into())).unwrap();
        assert_eq!(data.value, Value::String("serial".into()));
        assert_eq!(data.method_count(), 0);
    }

    #[test]
    fn test_data_invalid_index() {
        let settings = Settings::new(true);
        let mut data = Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None);
        assert!(matches!(
            data.get_value(&settings, 3, None),
            Err(DlmsError::Device(ErrorCode::ReadWriteDenied))
        ));
        let mut settings = settings;
        assert!(data.invoke(&mut settings, 1, &Value::None).is_err());
    }
}
