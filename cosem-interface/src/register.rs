//! Register interface class (Class ID: 3)
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: value
//! - Attribute 3: scaler_unit, structure of scaler (integer) and unit (enum)
//!
//! # Methods
//!
//! - Method 1: reset

use crate::object::{
    invalid_attribute, invalid_method, logical_name_value, set_logical_name, CosemObject,
    ObjectBase, Selection,
};
use cosem_application::Settings;
use cosem_core::{DataType, DlmsError, DlmsResult, ObisCode, ObjectType, Value};

/// Scaling factor and unit of a register value
///
/// The physical value is `value * 10^scaler` in `unit` (0x1E = Wh,
/// 0x1B = W, 0x23 = V).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScalerUnit {
    pub scaler: i8,
    pub unit: u8,
}

impl ScalerUnit {
    pub fn new(scaler: i8, unit: u8) -> Self {
        Self { scaler, unit }
    }

    pub fn to_value(self) -> Value {
        Value::Structure(vec![Value::Int8(self.scaler), Value::Enum(self.unit)])
    }

    /// # Errors
    ///
    /// Anything but a two element structure of numbers.
    pub fn from_value(value: &Value) -> DlmsResult<Self> {
        match value.as_structure()? {
            [scaler, unit] => Ok(Self {
                scaler: scaler.as_i8()?,
                unit: unit.as_u8()?,
            }),
            other => Err(DlmsError::InvalidData(format!(
                "Scaler unit has {} elements",
                other.len()
            ))),
        }
    }

    pub fn apply(self, raw: f64) -> f64 {
        raw * 10f64.powi(i32::from(self.scaler))
    }
}

/// Register interface class (Class ID: 3)
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    base: ObjectBase,
    pub value: Value,
    pub scaler_unit: ScalerUnit,
}

impl Register {
    pub const ATTR_VALUE: u8 = 2;
    pub const ATTR_SCALER_UNIT: u8 = 3;
    pub const METHOD_RESET: u8 = 1;

    pub fn new(logical_name: ObisCode, value: Value, scaler_unit: ScalerUnit) -> Self {
        Self {
            base: ObjectBase::new(logical_name),
            value,
            scaler_unit,
        }
    }

    /// Value with the scaler applied, `None` for non-numeric values.
    pub fn scaled_value(&self) -> Option<f64> {
        self.value.as_f64().map(|raw| self.scaler_unit.apply(raw))
    }
}

impl CosemObject for Register {
    fn object_type(&self) -> ObjectType {
        ObjectType::Register
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        3
    }

    fn method_count(&self) -> u8 {
        1
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 => DataType::OctetString,
            3 => DataType::Structure,
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
            3 => Ok(self.scaler_unit.to_value()),
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
            3 => {
                self.scaler_unit = ScalerUnit::from_value(&value)?;
                Ok(())
            }
            _ => Err(invalid_attribute(self.object_type(), index)),
        }
    }

    fn invoke(
        &mut self,
        _settings: &mut Settings,
        index: u8,
        _parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        match index {
            Self::METHOD_RESET => {
                self.value = Value::None;
                Ok(None)
            }
            _ => Err(invalid_method(self.object_type(), index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energy() -> Register {
        Register::new(
            ObisCode::new(1, 0, 1, 8, 0, 255),
            Value::UInt32(12345),
            ScalerUnit::new(-1, 0x1E),
        )
    }

    #[test]
    fn test_scaler_unit() {
        let register = energy();
        assert_eq!(register.scaled_value(), Some(1234.5));
        assert_eq!(
            ScalerUnit::from_value(&Value::Structure(vec![Value::Int8(3), Value::Enum(0x1B)])).unwrap(),
            ScalerUnit::new(3, 0x1B)
        );
        assert!(ScalerUnit::from_value(&Value::Structure(vec![Value::Int8(3)])).is_err());
    }

    #[test]
    fn test_register_attributes_and_reset() {
        let mut settings = Settings::new(true);
        let mut register = energy();
        assert_eq!(
            register.get_value(&settings, 3, None).unwrap(),
            Value::Structure(vec![Value::Int8(-1), Value::Enum(0x1E)])
        );
        register
            .set_value(&mut settings, 3, ScalerUnit::new(0, 0x1B).to_value())
            .unwrap();
        assert_eq!(register.scaler_unit, ScalerUnit::new(0, 0x1B));

        assert_eq!(register.invoke(&mut settings, 1, &Value::Int8(0)).unwrap(), None);
        assert_eq!(register.value, Value::None);
        assert!(register.invoke(&mut settings, 2, &Value::None).is_err());
    }
}
