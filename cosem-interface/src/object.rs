//! The contract between the protocol layers and COSEM objects
//!
//! The server dispatcher and the client reply handling only ever see an
//! object through [`CosemObject`]: an attribute index goes in, a typed
//! [`Value`] comes out (or the other way round for writes).

use crate::object_list::ObjectDescriptor;
use cosem_application::Settings;
use cosem_core::{
    AccessMode, CosemDateTime, DataType, DlmsError, DlmsResult, ErrorCode, MethodAccessMode, ObisCode,
    ObjectType, Value,
};
use std::collections::BTreeMap;
use std::fmt;

/// Selective access of a Get/Read request
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub selector: u8,
    pub parameters: Value,
}

/// Fields every interface class has
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBase {
    pub logical_name: ObisCode,
    /// Base name for short-name referencing, 0 when not used
    pub short_name: u16,
    pub version: u8,
    attribute_access: BTreeMap<u8, AccessMode>,
    method_access: BTreeMap<u8, MethodAccessMode>,
}

impl ObjectBase {
    pub fn new(logical_name: ObisCode) -> Self {
        Self {
            logical_name,
            short_name: 0,
            version: 0,
            attribute_access: BTreeMap::new(),
            method_access: BTreeMap::new(),
        }
    }

    /// Access of attribute `index`. The logical name is read-only and
    /// everything else read-write unless overridden.
    pub fn access(&self, index: u8) -> AccessMode {
        match self.attribute_access.get(&index) {
            Some(mode) => *mode,
            None if index == 1 => AccessMode::Read,
            None => AccessMode::ReadWrite,
        }
    }

    pub fn set_access(&mut self, index: u8, mode: AccessMode) {
        self.attribute_access.insert(index, mode);
    }

    pub fn method_access(&self, index: u8) -> MethodAccessMode {
        self.method_access
            .get(&index)
            .copied()
            .unwrap_or(MethodAccessMode::Access)
    }

    pub fn set_method_access(&mut self, index: u8, mode: MethodAccessMode) {
        self.method_access.insert(index, mode);
    }
}

/// A COSEM interface class instance
pub trait CosemObject: fmt::Debug + Send {
    fn object_type(&self) -> ObjectType;

    fn base(&self) -> &ObjectBase;

    fn base_mut(&mut self) -> &mut ObjectBase;

    fn attribute_count(&self) -> u8;

    fn method_count(&self) -> u8 {
        0
    }

    fn logical_name(&self) -> ObisCode {
        self.base().logical_name
    }

    fn short_name(&self) -> u16 {
        self.base().short_name
    }

    fn version(&self) -> u8 {
        self.base().version
    }

    fn access(&self, index: u8) -> AccessMode {
        if index == 0 || index > self.attribute_count() {
            return AccessMode::NoAccess;
        }
        self.base().access(index)
    }

    fn method_access(&self, index: u8) -> MethodAccessMode {
        if index == 0 || index > self.method_count() {
            return MethodAccessMode::NoAccess;
        }
        self.base().method_access(index)
    }

    /// Wire type of attribute `index`, [`DataType::None`] when it follows the
    /// value.
    fn data_type(&self, index: u8) -> DataType;

    /// Read attribute `index`.
    ///
    /// # Errors
    ///
    /// `DlmsError::Device` carries the data-access-result to report; any
    /// other error is reported as a hardware fault.
    fn get_value(
        &mut self,
        settings: &Settings,
        index: u8,
        selection: Option<&Selection>,
    ) -> DlmsResult<Value>;

    /// Write attribute `index`.
    fn set_value(&mut self, settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()>;

    /// Run method `index`. `Ok(None)` means no return parameters.
    fn invoke(
        &mut self,
        settings: &mut Settings,
        index: u8,
        parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        let _ = (settings, parameters);
        Err(invalid_method(self.object_type(), index))
    }

    /// Object list of association objects, `None` for every other class.
    fn object_list_mut(&mut self) -> Option<&mut Vec<ObjectDescriptor>> {
        None
    }
}

pub(crate) fn invalid_attribute(object_type: ObjectType, index: u8) -> DlmsError {
    log::debug!("{} has no attribute {}", object_type, index);
    DlmsError::Device(ErrorCode::ReadWriteDenied)
}

pub(crate) fn invalid_method(object_type: ObjectType, index: u8) -> DlmsError {
    log::debug!("{} has no method {}", object_type, index);
    DlmsError::Device(ErrorCode::ReadWriteDenied)
}

pub(crate) fn logical_name_value(base: &ObjectBase) -> Value {
    Value::OctetString(base.logical_name.to_bytes().to_vec())
}

/// Date-time carried either as a date-time value or as its 12 byte octet
/// string form.
pub(crate) fn date_time_of(value: &Value, settings: &Settings) -> DlmsResult<CosemDateTime> {
    match value {
        Value::DateTime(dt) | Value::Date(dt) | Value::Time(dt) => Ok(*dt),
        Value::OctetString(bytes) => {
            let bytes: &[u8; 12] = bytes.as_slice().try_into().map_err(|_| {
                DlmsError::InvalidData(format!("Date-time of {} bytes", bytes.len()))
            })?;
            CosemDateTime::from_date_time_bytes(bytes, settings.codec.use_utc2_normal_time)
        }
        other => Err(DlmsError::InvalidData(format!(
            "Expected date-time, got {}",
            other.data_type()
        ))),
    }
}

/// Update the logical name from attribute 1.
pub(crate) fn set_logical_name(base: &mut ObjectBase, value: &Value) -> DlmsResult<()> {
    base.logical_name = ObisCode::from_bytes(value.as_bytes()?)?;
    Ok(())
}
