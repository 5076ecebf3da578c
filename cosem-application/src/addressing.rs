//! Object addressing for LN and SN referencing
//!
//! With logical-name referencing an attribute or method is addressed by
//! class id, six byte logical name and index. With short-name referencing
//! every attribute and method has its own 16 bit name derived from the base
//! name of the object.

use cosem_core::{ByteBuffer, DlmsError, DlmsResult, ObisCode, ObjectType};
use std::fmt;

/// Name of a COSEM object in either referencing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectName {
    Logical(ObisCode),
    Short(u16),
}

impl ObjectName {
    /// # Errors
    ///
    /// Fails for a short name.
    pub fn logical(&self) -> DlmsResult<ObisCode> {
        match self {
            Self::Logical(ln) => Ok(*ln),
            Self::Short(sn) => Err(DlmsError::InvalidData(format!(
                "Logical name expected, got short name {:04X}",
                sn
            ))),
        }
    }

    /// # Errors
    ///
    /// Fails for a logical name.
    pub fn short(&self) -> DlmsResult<u16> {
        match self {
            Self::Short(sn) => Ok(*sn),
            Self::Logical(ln) => Err(DlmsError::InvalidData(format!(
                "Short name expected, got logical name {}",
                ln
            ))),
        }
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logical(ln) => write!(f, "{}", ln),
            Self::Short(sn) => write!(f, "{:04X}", sn),
        }
    }
}

impl From<ObisCode> for ObjectName {
    fn from(ln: ObisCode) -> Self {
        Self::Logical(ln)
    }
}

/// Parse a logical name written as six dot-separated numbers.
///
/// # Errors
///
/// Returns `InvalidData` unless the text has exactly six components that
/// each fit in a byte.
pub fn parse_logical_name(text: &str) -> DlmsResult<ObisCode> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 6 {
        return Err(DlmsError::InvalidData(format!("Invalid Logical Name: {}", text)));
    }
    let mut bytes = [0u8; 6];
    for (byte, part) in bytes.iter_mut().zip(parts) {
        *byte = part
            .trim()
            .parse()
            .map_err(|_| DlmsError::InvalidData(format!("Invalid Logical Name: {}", text)))?;
    }
    Ok(ObisCode::from(bytes))
}

/// Attribute and method indexes start from 1.
pub fn check_index(index: u8) -> DlmsResult<u8> {
    if index == 0 {
        return Err(DlmsError::InvalidData("Invalid index 0".to_string()));
    }
    Ok(index)
}

/// Short name of attribute `index` of the object at `base`.
pub fn sn_attribute(base: u16, index: u8) -> DlmsResult<u16> {
    let index = check_index(index)?;
    base.checked_add((u16::from(index) - 1) * 8)
        .ok_or_else(|| DlmsError::InvalidData(format!("Short name overflow {:04X}/{}", base, index)))
}

/// Short name of method `index` of the object at `base`.
///
/// # Errors
///
/// Classes without SN methods and indexes past the method count are
/// rejected.
pub fn sn_method(object_type: ObjectType, base: u16, index: u8) -> DlmsResult<u16> {
    let index = check_index(index)?;
    let (offset, count) = object_type.sn_action_info();
    if index > count {
        return Err(DlmsError::InvalidData(format!(
            "{} has no method {}",
            object_type, index
        )));
    }
    base.checked_add(offset + (u16::from(index) - 1) * 8)
        .ok_or_else(|| DlmsError::InvalidData(format!("Short name overflow {:04X}/{}", base, index)))
}

/// Cosem-Attribute-Descriptor / Cosem-Method-Descriptor of LN services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnDescriptor {
    pub object_type: ObjectType,
    pub logical_name: ObisCode,
    /// Attribute or method id
    pub index: u8,
}

impl LnDescriptor {
    pub fn new(object_type: ObjectType, logical_name: ObisCode, index: u8) -> Self {
        Self {
            object_type,
            logical_name,
            index,
        }
    }

    pub fn write(&self, buff: &mut ByteBuffer) {
        buff.set_u16(self.object_type.class_id());
        buff.set_slice(self.logical_name.as_bytes());
        buff.set_u8(self.index);
    }

    /// # Errors
    ///
    /// `NotEnoughData` when fewer than nine bytes remain.
    pub fn read(buff: &mut ByteBuffer) -> DlmsResult<Self> {
        let class_id = buff.get_u16()?;
        let mut ln = [0u8; 6];
        buff.get(&mut ln)?;
        let index = buff.get_u8()?;
        Ok(Self::new(ObjectType::from_class_id(class_id), ObisCode::from(ln), index))
    }
}

impl fmt::Display for LnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.object_type, self.logical_name, self.index)
    }
}
