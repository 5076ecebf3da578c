//! COSEM Association LN interface class (Class ID: 15)
//!
//! Default OBIS: 0-0:40.0.0.255
//!
//! # Attributes
//!
//! - Attribute 1: logical_name
//! - Attribute 2: object_list
//! - Attribute 3: associated_partners_id
//! - Attribute 4: application_context_name
//! - Attribute 5: xDLMS_context_info
//! - Attribute 6: authentication_mechanism_name
//! - Attribute 7: secret (write only)
//! - Attribute 8: association_status
//! - Attribute 9: security_setup_reference
//!
//! # Methods
//!
//! - Method 1: reply_to_HLS_authentication
//! - Method 2: change_HLS_secret
//!
//! Attributes 3 to 6 and 8 describe the current association and are taken
//! from the session settings of the connection.

use crate::object::{
    invalid_attribute, invalid_method, logical_name_value, set_logical_name, CosemObject,
    ObjectBase, Selection,
};
use crate::object_list::ObjectDescriptor;
use cosem_application::{AssociationStatus, Settings};
use cosem_core::{
    AccessMode, BitString, DataType, DlmsError, DlmsResult, ErrorCode, ObisCode, ObjectType,
    Value,
};
use cosem_security::{secure, verify_proof, Authentication};

/// Application context name `2.16.756.5.8.1.x`, 1 = LN without ciphering
const APPLICATION_CONTEXT_LN: u8 = 1;

/// Prefix shared by the application context and mechanism name OIDs, the
/// last two arcs follow.
fn dlms_ua_oid(kind: u8, id: u8) -> Value {
    Value::Structure(vec![
        Value::UInt8(2),
        Value::UInt8(16),
        Value::UInt16(756),
        Value::UInt8(5),
        Value::UInt8(8),
        Value::UInt8(kind),
        Value::UInt8(id),
    ])
}

fn association_status_value(settings: &Settings) -> Value {
    Value::Enum(match settings.status {
        AssociationStatus::Disconnected => 0,
        AssociationStatus::AssociationPending => 1,
        AssociationStatus::Connected => 2,
    })
}

/// Check the client proof of an HLS association and produce the server
/// proof.
///
/// The proof must be `secure()` of the challenge the server sent in the
/// AARE. On success the association becomes connected and the server proof
/// of the client challenge is returned. A wrong proof or a replayed GMAC
/// counter disconnects.
pub(crate) fn reply_to_hls(settings: &mut Settings, parameters: &Value) -> DlmsResult<Value> {
    let mechanism = settings.authentication;
    if !mechanism.is_high_level() {
        log::warn!("Reply to HLS with authentication {}", mechanism);
        return Err(DlmsError::Device(ErrorCode::ReadWriteDenied));
    }
    let proof = parameters.as_bytes()?;
    let challenge = settings
        .stoc_challenge
        .clone()
        .ok_or_else(|| DlmsError::Security("No server challenge sent".to_string()))?;
    let accepted = match verify_proof(
        Some(&mut settings.cipher),
        mechanism,
        &challenge,
        &settings.password,
        proof,
    ) {
        Ok(accepted) => accepted,
        Err(e) => {
            log::warn!("HLS proof rejected: {}", e);
            false
        }
    };
    if !accepted {
        log::warn!("Invalid {} proof from client {}", mechanism, settings.client_address);
        settings.set_status(AssociationStatus::Disconnected);
        return Err(DlmsError::Device(ErrorCode::ReadWriteDenied));
    }

    let client_challenge = settings
        .ctos_challenge
        .clone()
        .ok_or_else(|| DlmsError::Security("No client challenge received".to_string()))?;
    let (ic, secret) = if mechanism == Authentication::HighGmac {
        (
            settings.cipher.next_invocation_counter()?,
            settings.cipher.system_title().to_vec(),
        )
    } else {
        (0, settings.password.clone())
    };
    let reply = secure(Some(&settings.cipher), mechanism, ic, &client_challenge, &secret)?;
    settings.set_status(AssociationStatus::Connected);
    log::info!(
        "{} association with client {} established",
        mechanism,
        settings.client_address
    );
    Ok(Value::OctetString(reply))
}

/// Association LN interface class (Class ID: 15)
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationLn {
    base: ObjectBase,
    pub object_list: Vec<ObjectDescriptor>,
    /// HLS secret, copied into the session when written
    pub secret: Vec<u8>,
    pub security_setup_reference: ObisCode,
}

impl AssociationLn {
    pub const ATTR_OBJECT_LIST: u8 = 2;
    pub const ATTR_SECRET: u8 = 7;
    pub const ATTR_ASSOCIATION_STATUS: u8 = 8;
    pub const METHOD_REPLY_TO_HLS: u8 = 1;
    pub const METHOD_CHANGE_HLS_SECRET: u8 = 2;

    pub fn default_obis() -> ObisCode {
        ObisCode::CURRENT_ASSOCIATION
    }

    pub fn new(logical_name: ObisCode) -> Self {
        let mut base = ObjectBase::new(logical_name);
        base.version = 1;
        for index in 2..=9 {
            base.set_access(index, AccessMode::Read);
        }
        base.set_access(Self::ATTR_SECRET, AccessMode::Write);
        Self {
            base,
            object_list: Vec::new(),
            secret: Vec::new(),
            security_setup_reference: ObisCode::new(0, 0, 43, 0, 0, 255),
        }
    }

    fn xdlms_context(settings: &Settings) -> DlmsResult<Value> {
        let conformance = settings.proposed_conformance.to_wire();
        Ok(Value::Structure(vec![
            Value::BitString(BitString::new(conformance.to_vec(), 24)?),
            Value::UInt16(settings.max_server_pdu_size),
            Value::UInt16(settings.max_pdu_size),
            Value::UInt8(settings.dlms_version),
            Value::Int8(0),
            Value::OctetString(Vec::new()),
        ]))
    }
}

impl CosemObject for AssociationLn {
    fn object_type(&self) -> ObjectType {
        ObjectType::AssociationLogicalName
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
        2
    }

    fn data_type(&self, index: u8) -> DataType {
        match index {
            1 | 7 | 9 => DataType::OctetString,
            2 => DataType::Array,
            3..=6 => DataType::Structure,
            8 => DataType::Enum,
            _ => DataType::None,
        }
    }

    fn get_value(
        &mut self,
        settings: &Settings,
        index: u8,
        _selection: Option<&Selection>,
    ) -> DlmsResult<Value> {
        let version = self.version();
        let value = match index {
            1 => logical_name_value(&self.base),
            2 => Value::Array(
                self.object_list
                    .iter()
                    .map(|descriptor| descriptor.to_ln_value(version))
                    .collect(),
            ),
            3 => Value::Structure(vec![
                Value::Int8(settings.client_address as i8),
                Value::UInt16(settings.server_address as u16),
            ]),
            4 => dlms_ua_oid(1, APPLICATION_CONTEXT_LN),
            5 => Self::xdlms_context(settings)?,
            6 => dlms_ua_oid(2, settings.authentication.id()),
            8 => association_status_value(settings),
            9 => Value::OctetString(self.security_setup_reference.to_bytes().to_vec()),
            _ => return Err(invalid_attribute(self.object_type(), index)),
        };
        Ok(value)
    }

    fn set_value(&mut self, settings: &mut Settings, index: u8, value: Value) -> DlmsResult<()> {
        match index {
            1 => set_logical_name(&mut self.base, &value)?,
            2 => {
                self.object_list = value
                    .as_list()?
                    .iter()
                    .map(|entry| ObjectDescriptor::from_ln_value(entry, &settings.quirks))
                    .collect::<DlmsResult<_>>()?;
            }
            7 => {
                self.secret = value.as_bytes()?.to_vec();
                settings.password = self.secret.clone();
            }
            9 => self.security_setup_reference = ObisCode::from_bytes(value.as_bytes()?)?,
            _ => return Err(invalid_attribute(self.object_type(), index)),
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        settings: &mut Settings,
        index: u8,
        parameters: &Value,
    ) -> DlmsResult<Option<Value>> {
        match index {
            Self::METHOD_REPLY_TO_HLS => reply_to_hls(settings, parameters).map(Some),
            Self::METHOD_CHANGE_HLS_SECRET => {
                self.secret = parameters.as_bytes()?.to_vec();
                settings.password = self.secret.clone();
                Ok(None)
            }
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
    use crate::data::Data;

    const SERVER_CHALLENGE: &[u8] = b"ABCDEFGH";
    const CLIENT_CHALLENGE: &[u8] = b"P6wRJ21F";

    fn pending_settings() -> Settings {
        let mut settings = Settings::new(true);
        settings.authentication = Authentication::HighMd5;
        settings.password = b"Gurux".to_vec();
        settings.stoc_challenge = Some(SERVER_CHALLENGE.to_vec());
        settings.ctos_challenge = Some(CLIENT_CHALLENGE.to_vec());
        settings.set_status(AssociationStatus::AssociationPending);
        settings
    }

    #[test]
    fn test_reply_to_hls() {
        let mut settings = pending_settings();
        let mut association = AssociationLn::new(AssociationLn::default_obis());
        let proof = secure(None, Authentication::HighMd5, 0, SERVER_CHALLENGE, b"Gurux").unwrap();
        let reply = association
            .invoke(&mut settings, 1, &Value::OctetString(proof))
            .unwrap();
        let expected = secure(None, Authentication::HighMd5, 0, CLIENT_CHALLENGE, b"Gurux").unwrap();
        assert_eq!(reply, Some(Value::OctetString(expected)));
        assert!(settings.is_connected());
        assert_eq!(
            association.get_value(&settings, 8, None).unwrap(),
            Value::Enum(2)
        );
    }

    #[test]
    fn test_wrong_proof_disconnects() {
        let mut settings = pending_settings();
        let mut association = AssociationLn::new(AssociationLn::default_obis());
        let proof = secure(None, Authentication::HighMd5, 0, SERVER_CHALLENGE, b"wrong").unwrap();
        assert!(matches!(
            association.invoke(&mut settings, 1, &Value::OctetString(proof)),
            Err(DlmsError::Device(ErrorCode::ReadWriteDenied))
        ));
        assert_eq!(settings.status, AssociationStatus::Disconnected);
    }

    #[test]
    fn test_object_list_and_context() {
        let mut settings = Settings::new(true);
        let mut association = AssociationLn::new(AssociationLn::default_obis());
        let data = Data::new(ObisCode::new(0, 0, 96, 1, 0, 255), Value::None);
        association.object_list.push(ObjectDescriptor::of(&data));

        let list = association.get_value(&settings, 2, None).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
        association.set_value(&mut settings, 2, list.clone()).unwrap();
        assert_eq!(association.get_value(&settings, 2, None).unwrap(), list);

        assert_eq!(
            association.get_value(&settings, 4, None).unwrap(),
            dlms_ua_oid(1, 1)
        );
        let context = association.get_value(&settings, 5, None).unwrap();
        assert_eq!(context.as_structure().unwrap()[3], Value::UInt8(6));
        assert_eq!(association.access(7), AccessMode::Write);
        assert!(association.get_value(&settings, 7, None).is_err());

        association
            .set_value(&mut settings, 7, Value::OctetString(b"secret".to_vec()))
            .unwrap();
        assert_eq!(settings.password, b"secret");
    }
}
