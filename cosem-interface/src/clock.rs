//! Clock interface class (Class ID: 8)
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: time
//! - Attribute 3: time_zone, minutes from UTC
//! - Attribute 4: status
//! - Attribute 5: daylight_savings_begin
//! - Attribute 6: daylight_savings_end
//! - Attribute 7: daylight_savings_deviation
//! - Attribute 8: daylight_savings_enabled
//! - Attribute 9: clock_base
//!
//! # Methods
//!
//! - Method 1: adjust_to_quarter
//! - Method 3: adjust_to_minute
//! - Method 6: shift_time(seconds)
//!
//! Methods 2, 4 and 5 need a measuring period or a preset time and are not
//! accessible.

use crate::object::{
    date_time_of, invalid_attribute, invalid_method, logical_name_value, set_logical_name,
    CosemObject, ObjectBase, Selection,
};
use chrono::{DateTime, Duration, FixedOffset, Timelike};
use cosem_application::Settings;
use cosem_core::{
    ClockStatus, CosemDateTime, DataType, DlmsError, DlmsResult, MethodAccessMode, ObisCode,
    ObjectType, Value,
};

/// Clock interface class (Class ID: 8)
#[derive(Debug, Clone, PartialEq)]
pub struct Clock {
    base: ObjectBase,
    pub time: CosemDateTime,
    pub time_zone: i16,
    pub status: ClockStatus,
    pub begin: CosemDateTime,
    pub end: CosemDateTime,
    pub deviation: i8,
    pub enabled: bool,
    pub clock_base: u8,
}

impl Clock {
    pub const ATTR_TIME: u8 = 2;
    pub const METHOD_ADJUST_TO_QUARTER: u8 = 1;
    pub const METHOD_ADJUST_TO_MINUTE: u8 = 3;
    pub const METHOD_SHIFT_TIME: u8 = 6;

    pub fn new(logical_name: ObisCode) -> Self {
        let mut base = ObjectBase::new(logical_name);
        for index in [2, 4, 5] {
            base.set_method_access(index, MethodAccessMode::NoAccess);
        }
        Self {
            base,
            time: CosemDateTime::default(),
            time_zone: 0,
            status: ClockStatus::OK,
            begin: CosemDateTime::default(),
            end: CosemDateTime::default(),
            deviation: 0,
            enabled: false,
            clock_base: 0,
        }
    }

    fn chrono_time(&self) -> DlmsResult<DateTime<FixedOffset>> {
        self.time
            .to_chrono()
            .ok_or_else(|| DlmsError::InvalidData(format!("Clock time {:?} is not valid", self.time)))
    }

    fn set_chrono_time(&mut self, time: DateTime<FixedOffset>) {
        let status = self.time.status;
        self.time = CosemDateTime::from_chrono(&time);
        self.time.status = status;
    }

    /// Round the time to the nearest multiple of `step` seconds within the
    /// hour.
    fn round_to(&mut self, step: i64) -> DlmsResult<()> {
        let time = self.chrono_time()?;
        let in_hour = i64::from(time.minute() * 60 + time.second());
        let rounded = (in_hour + step / 2) / step * step;
        let time = time.with_nanosecond(0).unwrap_or(time) + Duration::seconds(rounded - in_hour);
        self.set_chrono_time(time);
        Ok(())
    }
}

impl CosemObject for Clock {
    fn object_type(&self) -> ObjectType {
        ObjectType::Clock
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        9
    }

    fn method_count(&self) -> u8 {
        6
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 | 2 | 5 | 6 => DataType::OctetString,
            3 => DataType::Int16,
            4 => DataType::UInt8,
            7 => DataType::Int8,
            8 => DataType::Boolean,
            9 => DataType::Enum,
            _ => DataType::None,
        }
    }

    fn get_value(
        &mut self,
        _settings: &Settings,
        index: u8,
        _selection: Option<&Selection>,
    ) -> DlmsResult<Value> {
        let value = match index {
            1 => logical_name_value(&self.base),
            2 => Value::DateTime(self.time),
            3 => Value::Int16(self.time_zone),
            4 => Value::UInt8(self.status.bits()),
            5 => Value::DateTime(self.begin),
            6 => Value::DateTime(self.end),
            7 => Value::Int8(self.deviation),
            8 => Value::Boolean(self.enabled),
            9 => Value::Enum(self.clock_base),
            _ => return Err(invalid_attribute(self.object_type(), index)),
        };
        Ok(value)
    }

    fn set_value(&mut self, settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value)?,
            2 => self.time = date_time_of(&value, settings)?,
            3 => {
                self.time_zone = value
                    .as_integer()
                    .and_then(|v| i16::try_from(v).ok())
                    .ok_or_else(|| DlmsError::InvalidData("Invalid time zone".to_string()))?;
            }
            4 => self.status = ClockStatus::from_bits(value.as_u8()?),
            5 => self.begin = date_time_of(&value, settings)?,
            6 => self.end = date_time_of(&value, settings)?,
            7 => self.deviation = value.as_i8()?,
            8 => self.enabled = value.as_bool()?,
            9 => self.clock_base = value.as_u8()?,
            _ => return Err(invalid_attribute(self.object_type(), index)),
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        _settings: &mut Settings,
        index: u8,
        parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        match index {
            Self::METHOD_ADJUST_TO_QUARTER => self.round_to(15 * 60)?,
            Self::METHOD_ADJUST_TO_MINUTE => self.round_to(60)?,
            Self::METHOD_SHIFT_TIME => {
                let seconds = parameters
                    .as_integer()
                    .and_then(|v| i16::try_from(v).ok())
                    .ok_or_else(|| DlmsError::InvalidData("Invalid time shift".to_string()))?;
                let time = self.chrono_time()? + Duration::seconds(i64::from(seconds));
                self.set_chrono_time(time);
            }
            _ => return Err(invalid_method(self.object_type(), index)),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_at(hour: u8, minute: u8, second: u8) -> Clock {
        let mut clock = Clock::new(ObisCode::CLOCK);
        clock.time = CosemDateTime::new(2024, 3, 31, hour, minute, second, 0, 60).unwrap();
        clock
    }

    #[test]
    fn test_clock_attributes() {
        let mut settings = Settings::new(true);
        let mut clock = clock_at(10, 20, 30);
        assert_eq!(
            clock.get_value(&settings, 2, None).unwrap(),
            Value::DateTime(clock.time)
        );
        clock.set_value(&mut settings, 3, Value::Int16(-120)).unwrap();
        assert_eq!(clock.time_zone, -120);
        assert!(clock.set_value(&mut settings, 3, Value::Int32(40000)).is_err());

        let time = CosemDateTime::new(2024, 1, 2, 3, 4, 5, 0, 0).unwrap();
        let bytes = time.to_date_time_bytes(false).to_vec();
        clock.set_value(&mut settings, 2, Value::OctetString(bytes)).unwrap();
        assert_eq!((clock.time.hour, clock.time.minute), (3, 4));
    }

    #[test]
    fn test_adjust_methods() {
        let mut settings = Settings::new(true);
        let mut clock = clock_at(10, 7, 20);
        clock.invoke(&mut settings, 1, &Value::Int8(0)).unwrap();
        assert_eq!((clock.time.hour, clock.time.minute, clock.time.second), (10, 0, 0));

        let mut clock = clock_at(10, 52, 31);
        clock.invoke(&mut settings, 1, &Value::Int8(0)).unwrap();
        assert_eq!((clock.time.hour, clock.time.minute), (11, 0));

        let mut clock = clock_at(10, 7, 40);
        clock.invoke(&mut settings, 3, &Value::Int8(0)).unwrap();
        assert_eq!((clock.time.minute, clock.time.second), (8, 0));

        clock.invoke(&mut settings, 6, &Value::Int16(-90)).unwrap();
        assert_eq!((clock.time.minute, clock.time.second), (6, 30));
    }

    #[test]
    fn test_unsupported_methods_have_no_access() {
        let mut settings = Settings::new(true);
        let mut clock = clock_at(0, 0, 0);
        assert_eq!(clock.method_access(1), MethodAccessMode::Access);
        assert_eq!(clock.method_access(4), MethodAccessMode::NoAccess);
        assert_eq!(clock.method_access(7), MethodAccessMode::NoAccess);
        assert!(clock.invoke(&mut settings, 4, &Value::None).is_err());
    }
}
