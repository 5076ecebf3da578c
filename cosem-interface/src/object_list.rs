//! Object list of Association LN/SN (attribute 2)
//!
//! LN entry: `structure { class_id, version, logical_name, access_rights }`
//! with `access_rights = structure { array of attribute access, array of
//! method access }`. SN entry: `structure { base_name, class_id, version,
//! logical_name }`.

use crate::generic::GenericObject;
use crate::object::CosemObject;
use crate::registry::create_object;
use cosem_application::Quirks;
use cosem_asn1::CodecOptions;
use cosem_core::{
    AccessMode, ByteBuffer, DataInfo, DlmsError, DlmsResult, MethodAccessMode, ObisCode,
    ObjectType, Value,
};

/// What the object list says about one object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDescriptor {
    pub object_type: ObjectType,
    pub version: u8,
    pub logical_name: ObisCode,
    pub short_name: u16,
    pub attribute_access: Vec<(u8, AccessMode)>,
    pub method_access: Vec<(u8, MethodAccessMode)>,
}

impl ObjectDescriptor {
    pub fn of(object: &dyn CosemObject) -> Self {
        Self {
            object_type: object.object_type(),
            version: object.version(),
            logical_name: object.logical_name(),
            short_name: object.short_name(),
            attribute_access: (1..=object.attribute_count())
                .map(|i| (i, object.access(i)))
                .collect(),
            method_access: (1..=object.method_count())
                .map(|i| (i, object.method_access(i)))
                .collect(),
        }
    }

    /// Instantiate the interface class this entry describes. Classes
    /// without an implementation become a [`GenericObject`].
    pub fn create_object(&self) -> Box<dyn CosemObject> {
        let mut object = create_object(self.object_type, self.logical_name).unwrap_or_else(|| {
            Box::new(GenericObject::new(
                self.object_type,
                self.logical_name,
                self.attribute_access.iter().map(|(i, _)| *i).max().unwrap_or(0),
                self.method_access.iter().map(|(i, _)| *i).max().unwrap_or(0),
            ))
        });
        let base = object.base_mut();
        base.version = self.version;
        base.short_name = self.short_name;
        for (index, mode) in &self.attribute_access {
            base.set_access(*index, *mode);
        }
        for (index, mode) in &self.method_access {
            base.set_method_access(*index, *mode);
        }
        object
    }

    /// LN object list entry. Association LN version 0 sends method access
    /// as boolean.
    pub fn to_ln_value(&self, association_version: u8) -> Value {
        let attributes = self
            .attribute_access
            .iter()
            .map(|(index, mode)| {
                Value::Structure(vec![
                    Value::Int8(*index as i8),
                    Value::Enum(*mode as u8),
                    Value::None,
                ])
            })
            .collect();
        let methods = self
            .method_access
            .iter()
            .map(|(index, mode)| {
                let access = if association_version == 0 {
                    Value::Boolean(*mode != MethodAccessMode::NoAccess)
                } else {
                    Value::Enum(*mode as u8)
                };
                Value::Structure(vec![Value::Int8(*index as i8), access])
            })
            .collect();
        Value::Structure(vec![
            Value::UInt16(self.object_type.class_id()),
            Value::UInt8(self.version),
            Value::OctetString(self.logical_name.to_bytes().to_vec()),
            Value::Structure(vec![Value::Array(attributes), Value::Array(methods)]),
        ])
    }

    pub fn to_sn_value(&self) -> Value {
        Value::Structure(vec![
            Value::Int16(self.short_name as i16),
            Value::UInt16(self.object_type.class_id()),
            Value::UInt8(self.version),
            Value::OctetString(self.logical_name.to_bytes().to_vec()),
        ])
    }

    /// # Errors
    ///
    /// Entries that are not a four element structure of the expected types.
    pub fn from_ln_value(value: &Value, quirks: &Quirks) -> DlmsResult<Self> {
        let (class_id, version, ln, rights) = match value.as_structure()? {
            [class_id, version, ln, rights] => (class_id, version, ln, rights),
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Object list entry has {} elements",
                    other.len()
                )))
            }
        };
        let mut descriptor = Self {
            object_type: ObjectType::from_class_id(class_id.as_u16()?),
            version: version.as_u8()?,
            logical_name: ObisCode::from_bytes(ln.as_bytes()?)?,
            short_name: 0,
            attribute_access: Vec::new(),
            method_access: Vec::new(),
        };
        if let Value::Structure(rights) = rights {
            if let Some(attributes) = rights.first() {
                for item in attributes.as_list()? {
                    let item = item.as_structure()?;
                    if let [index, mode, ..] = item {
                        descriptor
                            .attribute_access
                            .push((index.as_u8()?, AccessMode::from_u8(mode.as_u8()?)));
                    }
                }
            }
            if let Some(methods) = rights.get(1) {
                descriptor.method_access = parse_method_access(methods, quirks)?;
            }
        }
        Ok(descriptor)
    }

    pub fn from_sn_value(value: &Value) -> DlmsResult<Self> {
        match value.as_structure()? {
            [base_name, class_id, version, ln] => Ok(Self {
                object_type: ObjectType::from_class_id(class_id.as_u16()?),
                version: version.as_u8()?,
                logical_name: ObisCode::from_bytes(ln.as_bytes()?)?,
                short_name: base_name
                    .as_integer()
                    .map(|v| v as u16)
                    .ok_or_else(|| DlmsError::InvalidData("Invalid base name".to_string()))?,
                attribute_access: Vec::new(),
                method_access: Vec::new(),
            }),
            other => Err(DlmsError::InvalidData(format!(
                "Object list entry has {} elements",
                other.len()
            ))),
        }
    }
}

fn method_mode(value: &Value) -> DlmsResult<MethodAccessMode> {
    match value {
        Value::Boolean(true) => Ok(MethodAccessMode::Access),
        Value::Boolean(false) => Ok(MethodAccessMode::NoAccess),
        other => Ok(MethodAccessMode::from_u8(other.as_u8()?)),
    }
}

fn parse_method_access(
    methods: &Value,
    quirks: &Quirks,
) -> DlmsResult<Vec<(u8, MethodAccessMode)>> {
    let items = methods.as_list()?;
    let flat = matches!(methods, Value::Structure(_))
        && items.first().is_some_and(|v| v.as_integer().is_some());
    if flat {
        if !quirks.flat_method_access {
            return Err(DlmsError::InvalidData(
                "Method access is not an array of structures".to_string(),
            ));
        }
        // id and mode pairs with zero-based ids
        return items
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| Ok((pair[0].as_u8()?.wrapping_add(1), method_mode(&pair[1])?)))
            .collect();
    }
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        if let [index, mode, ..] = item.as_structure()? {
            result.push((index.as_u8()?, method_mode(mode)?));
        }
    }
    Ok(result)
}

/// Decode an encoded object list. A list with fewer entries than announced
/// is accepted when `quirks.tolerate_wrong_item_count` is set.
///
/// # Errors
///
/// Malformed entries, and truncated lists unless tolerated.
pub fn parse_object_list(
    options: &CodecOptions,
    data: &[u8],
    use_logical_name_referencing: bool,
    quirks: &Quirks,
) -> DlmsResult<Vec<ObjectDescriptor>> {
    let mut buff = ByteBuffer::from_slice(data);
    let mut info = DataInfo::new();
    let entries = match cosem_asn1::get_data(options, &mut buff, &mut info)? {
        Some(value) => value.as_list()?.to_vec(),
        None if quirks.tolerate_wrong_item_count => {
            log::warn!(
                "Object list announced {} entries, {} received",
                info.count,
                info.partial.len()
            );
            std::mem::take(&mut info.partial)
        }
        None => {
            return Err(DlmsError::InvalidData(format!(
                "Object list is incomplete: {} of {} entries",
                info.index, info.count
            )))
        }
    };
    entries
        .iter()
        .map(|entry| {
            if use_logical_name_referencing {
                ObjectDescriptor::from_ln_value(entry, quirks)
            } else {
                ObjectDescriptor::from_sn_value(entry)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Data;
    use cosem_asn1::set_data;
    use cosem_core::DataType;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buff = ByteBuffer::new();
        set_data(&CodecOptions::default(), &mut buff, DataType::Array, value).unwrap();
        buff.into_vec()
    }

    #[test]
    fn test_ln_entry() {
        let data = Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None);
        let descriptor = ObjectDescriptor::of(&data);
        assert_eq!(
            descriptor.attribute_access,
            vec![(1, AccessMode::Read), (2, AccessMode::ReadWrite)]
        );
        let list = Value::Array(vec![descriptor.to_ln_value(1)]);
        let parsed =
            parse_object_list(&CodecOptions::default(), &encode(&list), true, &Quirks::default())
                .unwrap();
        assert_eq!(parsed, vec![descriptor]);
        let object = parsed[0].create_object();
        assert_eq!(object.object_type(), ObjectType::Data);
        assert_eq!(object.access(2), AccessMode::ReadWrite);
    }

    #[test]
    fn test_unknown_class_is_generic() {
        let descriptor = ObjectDescriptor {
            object_type: ObjectType::Other(8192),
            version: 0,
            logical_name: ObisCode::new(0, 0, 128, 0, 0, 255),
            short_name: 0,
            attribute_access: vec![(1, AccessMode::Read), (4, AccessMode::Read)],
            method_access: Vec::new(),
        };
        let object = descriptor.create_object();
        assert_eq!(object.attribute_count(), 4);
        assert_eq!(object.access(4), AccessMode::Read);
        assert_eq!(object.access(5), AccessMode::NoAccess);
    }

    #[test]
    fn test_sn_entry() {
        let mut descriptor =
            ObjectDescriptor::of(&Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None));
        descriptor.short_name = 0xA000;
        let list = Value::Array(vec![descriptor.to_sn_value()]);
        let parsed =
            parse_object_list(&CodecOptions::default(), &encode(&list), false, &Quirks::default())
                .unwrap();
        assert_eq!(parsed[0].short_name, 0xA000);
        assert_eq!(parsed[0].logical_name, descriptor.logical_name);
    }

    #[test]
    fn test_wrong_item_count() {
        let descriptor =
            ObjectDescriptor::of(&Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None));
        let mut bytes = encode(&Value::Array(vec![descriptor.to_sn_value()]));
        // announce two entries, send one
        bytes[1] = 2;
        assert!(parse_object_list(&CodecOptions::default(), &bytes, false, &Quirks::default())
            .is_err());
        let quirks = Quirks {
            tolerate_wrong_item_count: true,
            ..Quirks::default()
        };
        let parsed = parse_object_list(&CodecOptions::default(), &bytes, false, &quirks).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_flat_method_access() {
        let methods = Value::Structure(vec![
            Value::Int8(0),
            Value::Enum(1),
            Value::Int8(1),
            Value::Boolean(false),
        ]);
        assert!(parse_method_access(&methods, &Quirks::default()).is_err());
        let quirks = Quirks {
            flat_method_access: true,
            ..Quirks::default()
        };
        assert_eq!(
            parse_method_access(&methods, &quirks).unwrap(),
            vec![(1, MethodAccessMode::Access), (2, MethodAccessMode::NoAccess)]
        );
    }
}
