//! COSEM Association SN interface class (Class ID: 12)
//!
//! Default OBIS: 0-0:40.0.0.255, base name 0xFA00
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: object_list
//! - Attribute 3: access_rights_list
//! - Attribute 4: security_setup_reference
//!
//! # Methods
//!
//! - Method 3: change_LLS_secret
//! - Method 4: change_HLS_secret
//! - Method 8: reply_to_HLS_authentication

use crate::association_ln::reply_to_hls;
use crate::object::{
    invalid_attribute, invalid_method, logical_name_value, set_logical_name, CosemObject,
    ObjectBase, Selection,
};
use crate::object_list::ObjectDescriptor;
use cosem_application::Settings;
use cosem_asn1::xdlms::VAA_NAME_SN;
use cosem_core::{
    AccessMode, DataType, DlmsResult, MethodAccessMode, ObisCode, ObjectType, Value,
};

/// Association SN interface class (Class ID: 12)
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationSn {
    base: ObjectBase,
    pub object_list: Vec<ObjectDescriptor>,
    pub secret: Vec<u8>,
    pub security_setup_reference: ObisCode,
}

impl AssociationSn {
    pub const METHOD_CHANGE_LLS_SECRET: u8 = 3;
    pub const METHOD_CHANGE_HLS_SECRET: u8 = 4;
    pub const METHOD_REPLY_TO_HLS: u8 = 8;

    pub fn new(logical_name: ObisCode) -> Self {
        let mut base = ObjectBase::new(logical_name);
        base.version = 2;
        base.short_name = VAA_NAME_SN;
        for index in 2..=4 {
            base.set_access(index, AccessMode::Read);
        }
        for index in [1, 2, 5, 6, 7] {
            base.set_method_access(index, MethodAccessMode::NoAccess);
        }
        Self {
            base,
            object_list: Vec::new(),
            secret: Vec::new(),
            security_setup_reference: ObisCode::new(0, 0, 43, 0, 0, 255),
        }
    }
}

impl CosemObject for AssociationSn {
    fn object_type(&self) -> ObjectType {
        ObjectType::AssociationShortName
    }

    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn attribute_count(&self) -> u8 {
        4
    }

    fn method_count(&self) -> u8 {
        8
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 | 4 => DataType::OctetString,
            2 | 3 => DataType::Array,
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
            2 => Ok(Value::Array(
                self.object_list
                    .iter()
                    .map(ObjectDescriptor::to_sn_value)
                    .collect(),
            )),
            3 => Ok(Value::Array(Vec::new())),
            4 => Ok(Value::OctetString(
                self.security_setup_reference.to_bytes().to_vec(),
            )),
            _ => Err(invalid_attribute(self.object_type(), index)),
        }
    }

    fn set_value(&mut self, _settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value),
            2 => {
                self.object_list = value
                    .as_list()?
                    .iter()
                    .map(ObjectDescriptor::from_sn_value)
                    .collect::<DlmsResult<_>>()?;
                Ok(())
            }
            4 => {
                self.security_setup_reference = ObisCode::from_bytes(value.as_bytes()?)?;
                Ok(())
            }
            _ => Err(invalid_attribute(self.object_type(), index)),
        }
    }

    fn invoke(
        &mut self,
        settings: &mut Settings,
        index: u8,
        parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        match index {
            Self::METHOD_CHANGE_LLS_SECRET | Self::METHOD_CHANGE_HLS_SECRET => {
                self.secret = parameters.as_bytes()?.to_vec();
                settings.password = self.secret.clone();
                Ok(None)
            }
            Self::METHOD_REPLY_TO_HLS => reply_to_hls(settings, parameters).map(Some),
            _ => Err(invalid_method(self.object_type(), index)),
        }
    }

    fn object_list_mut(&mut self) -> Option<&mut Vec<ObjectDescriptor>> {
        Some(&mut self.object_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{Register, ScalerUnit};
    use cosem_application::AssociationStatus;
    use cosem_security::{secure, Authentication};

    #[test]
    fn test_sn_object_list() {
        let mut settings = Settings::new(true);
        let mut association = AssociationSn::new(ObisCode::CURRENT_ASSOCIATION);
        let mut register = Register::new(
            ObisCode::new(1, 0, 1, 8, 0, 255),
            Value::UInt32(0),
            ScalerUnit::default(),
        );
        register.base_mut().short_name = 0x0100;
        association.object_list.push(ObjectDescriptor::of(&register));

        let list = association.get_value(&settings, 2, None).unwrap();
        assert_eq!(
            list.as_array().unwrap()[0],
            Value::Structure(vec![
                Value::Int16(0x0100),
                Value::UInt16(3),
                Value::UInt8(0),
                Value::OctetString(vec![1, 0, 1, 8, 0, 255]),
            ])
        );
        association.set_value(&mut settings, 2, list).unwrap();
        assert_eq!(association.object_list[0].short_name, 0x0100);
    }

    #[test]
    fn test_reply_to_hls_is_method_8() {
        let mut settings = Settings::new(true);
        settings.use_logical_name_referencing = false;
        settings.authentication = Authentication::HighSha256;
        settings.password = b"Gurux".to_vec();
        settings.stoc_challenge = Some(b"ABCDEFGH".to_vec());
        settings.ctos_challenge = Some(b"12345678".to_vec());
        settings.set_status(AssociationStatus::AssociationPending);

        let mut association = AssociationSn::new(ObisCode::CURRENT_ASSOCIATION);
        assert_eq!(association.method_access(1), MethodAccessMode::NoAccess);
        assert_eq!(association.method_access(8), MethodAccessMode::Access);
        let proof = secure(None, Authentication::HighSha256, 0, b"ABCDEFGH", b"Gurux").unwrap();
        let reply = association
            .invoke(&mut settings, 8, &Value::OctetString(proof))
            .unwrap();
        assert!(reply.is_some());
        assert!(settings.is_connected());
    }
}
