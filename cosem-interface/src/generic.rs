//! Interface classes without a dedicated implementation
//!
//! Attribute values are kept as received, so objects of unknown classes
//! found in an object list can still be read and written.

use crate::object::{
    invalid_attribute, logical_name_value, set_logical_name, CosemObject, ObjectBase, Selection,
};
use cosem_application::Settings;
use cosem_core::{DataType, DlmsResult, ObisCode, ObjectType, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct GenericObject {
    object_type: ObjectType,
    base: ObjectBase,
    attribute_count: u8,
    method_count: u8,
    values: BTreeMap<u8, Value>,
}

impl GenericObject {
    pub fn new(
        object_type: ObjectType,
        logical_name: ObisCode,
        attribute_count: u8,
        method_count: u8,
    ) -> Self {
        Self {
            object_type,
            base: ObjectBase::new(logical_name),
            attribute_count: attribute_count.max(1),
            method_count,
            values: BTreeMap::new(),
        }
    }
}

impl CosemObject for GenericObject {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        self.attribute_count
    }

    fn method_count(&self) -> u8 {
        self.method_count
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
            i if i <= self.attribute_count => {
                Ok(self.values.get(&i).cloned().unwrap_or(Value::None))
            }
            _ => Err(invalid_attribute(self.object_type, index)),
        }
    }

    fn set_value(&mut self, _settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value),
            i if i <= self.attribute_count => {
                self.values.insert(i, value);
                Ok(())
            }
            _ => Err(invalid_attribute(self.object_type, index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_values() {
        let mut settings = Settings::new(false);
        let mut object = GenericObject::new(
            ObjectType::Other(9999),
            ObisCode::new(0, 0, 99, 0, 0, 255),
            3,
            0,
        );
        assert_eq!(object.get_value(&settings, 2, None).unwrap(), Value::None);
        object.set_value(&mut settings, 3, Value::UInt8(7)).unwrap();
        assert_eq!(object.get_value(&settings, 3, None).unwrap(), Value::UInt8(7));
        assert!(object.set_value(&mut settings, 4, Value::UInt8(7)).is_err());
    }
}
