//! AARQ, AARE, RLRQ and RLRE
//!
//! Only the fields a COSEM association carries are modelled. Unknown
//! context-specific fields are skipped when decoding.

use super::types::*;
use crate::ber::decoder::{integer_from_content, object_identifier_from_content};
use crate::ber::encoder::object_identifier_content;
use crate::ber::{BerDecoder, BerEncoder, BerTag};
use cosem_core::{DlmsError, DlmsResult};

const TAG_APPLICATION_CONTEXT: u8 = 0xA1;
const TAG_CALLING_AP_TITLE: u8 = 0xA6;
const TAG_SENDER_REQUIREMENTS: u8 = 0x8A;
const TAG_AARQ_MECHANISM: u8 = 0x8B;
const TAG_CALLING_AUTHENTICATION: u8 = 0xAC;
const TAG_RESULT: u8 = 0xA2;
const TAG_RESULT_DIAGNOSTIC: u8 = 0xA3;
const TAG_RESPONDING_AP_TITLE: u8 = 0xA4;
const TAG_RESPONDER_REQUIREMENTS: u8 = 0x88;
const TAG_AARE_MECHANISM: u8 = 0x89;
const TAG_RESPONDING_AUTHENTICATION: u8 = 0xAA;
const TAG_USER_INFORMATION: u8 = 0xBE;

/// ACSE requirements bit string with only the authentication unit set
const AUTHENTICATION_FUNCTIONAL_UNIT: [u8; 2] = [0x07, 0x80];

fn encode_application_context(encoder: &mut BerEncoder, context: ApplicationContext) {
    let mut oid = BerEncoder::new();
    oid.encode_object_identifier(&context.arcs());
    encoder.encode_context_specific(1, true, &oid.into_bytes());
}

fn decode_application_context(content: &[u8]) -> DlmsResult<ApplicationContext> {
    let arcs = BerDecoder::new(content).decode_object_identifier()?;
    ApplicationContext::from_u8(dlms_oid_id(&arcs, APPLICATION_CONTEXT_ARC)?)
}

fn encode_mechanism(encoder: &mut BerEncoder, tag_number: u8, mechanism_id: u8) {
    let content = object_identifier_content(&dlms_oid(MECHANISM_NAME_ARC, mechanism_id as u32));
    encoder.encode_context_specific(tag_number, false, &content);
}

fn decode_mechanism(content: &[u8]) -> DlmsResult<u8> {
    dlms_oid_id(&object_identifier_from_content(content)?, MECHANISM_NAME_ARC)
}

fn encode_ap_title(encoder: &mut BerEncoder, tag_number: u8, title: &[u8]) {
    let mut inner = BerEncoder::new();
    inner.encode_octet_string(title);
    encoder.encode_context_specific(tag_number, true, &inner.into_bytes());
}

fn decode_ap_title(content: &[u8]) -> DlmsResult<Vec<u8>> {
    BerDecoder::new(content).decode_octet_string()
}

/// Authentication value as the `charstring [0]` choice
fn encode_authentication_value(encoder: &mut BerEncoder, tag_number: u8, value: &[u8]) {
    let mut inner = BerEncoder::new();
    inner.encode_context_specific(0, false, value);
    encoder.encode_context_specific(tag_number, true, &inner.into_bytes());
}

fn decode_authentication_value(content: &[u8]) -> DlmsResult<Vec<u8>> {
    let (tag, value) = BerDecoder::new(content).decode_tlv()?;
    if tag != BerTag::context_specific(false, 0) {
        return Err(DlmsError::Asn1Decoding(format!(
            "Unsupported authentication value choice {:02X}",
            tag.to_byte()
        )));
    }
    Ok(value.to_vec())
}

fn encode_user_information(encoder: &mut BerEncoder, information: &[u8]) {
    let mut inner = BerEncoder::new();
    inner.encode_octet_string(information);
    encoder.encode_context_specific(30, true, &inner.into_bytes());
}

fn decode_user_information(content: &[u8]) -> DlmsResult<Vec<u8>> {
    BerDecoder::new(content).decode_octet_string()
}

/// Association request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AARQApdu {
    pub application_context: ApplicationContext,
    /// Client system title, sent with HLS-GMAC
    pub calling_ap_title: Option<Vec<u8>>,
    pub sender_acse_requirements: bool,
    /// Last arc of the authentication mechanism name
    pub mechanism_id: Option<u8>,
    /// Password (LLS) or client-to-server challenge (HLS)
    pub calling_authentication_value: Option<Vec<u8>>,
    /// Encoded xDLMS InitiateRequest
    pub user_information: Option<Vec<u8>>,
}

impl AARQApdu {
    pub fn new(application_context: ApplicationContext) -> Self {
        Self {
            application_context,
            ..Self::default()
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = BerEncoder::with_capacity(64);
        encode_application_context(&mut body, self.application_context);
        if let Some(title) = &self.calling_ap_title {
            encode_ap_title(&mut body, 6, title);
        }
        if self.sender_acse_requirements {
            body.encode_context_specific(10, false, &AUTHENTICATION_FUNCTIONAL_UNIT);
        }
        if let Some(mechanism_id) = self.mechanism_id {
            encode_mechanism(&mut body, 11, mechanism_id);
        }
        if let Some(value) = &self.calling_authentication_value {
            encode_authentication_value(&mut body, 12, value);
        }
        if let Some(information) = &self.user_information {
            encode_user_information(&mut body, information);
        }
        let mut out = BerEncoder::new();
        out.encode_application(0, true, &body.into_bytes());
        out.into_bytes()
    }

    /// Decode an AARQ.
    ///
    /// # Errors
    ///
    /// Fails on malformed BER, a missing application context or an object
    /// identifier outside the DLMS-UA arcs.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let body = BerDecoder::new(data).decode_application(0, true)?;
        let mut decoder = BerDecoder::new(body);
        let mut context = None;
        let mut aarq = AARQApdu::default();
        while decoder.has_remaining() {
            let (tag, content) = decoder.decode_tlv()?;
            match tag.to_byte() {
                TAG_APPLICATION_CONTEXT => context = Some(decode_application_context(content)?),
                TAG_CALLING_AP_TITLE => aarq.calling_ap_title = Some(decode_ap_title(content)?),
                TAG_SENDER_REQUIREMENTS => {
                    aarq.sender_acse_requirements =
                        content.len() == 2 && content[1] & 0x80 != 0;
                }
                TAG_AARQ_MECHANISM => aarq.mechanism_id = Some(decode_mechanism(content)?),
                TAG_CALLING_AUTHENTICATION => {
                    aarq.calling_authentication_value = Some(decode_authentication_value(content)?)
                }
                TAG_USER_INFORMATION => {
                    aarq.user_information = Some(decode_user_information(content)?)
                }
                other => log::trace!("AARQ: ignoring field {:02X}", other),
            }
        }
        aarq.application_context = context
            .ok_or_else(|| DlmsError::Asn1Decoding("AARQ without application context".to_string()))?;
        Ok(aarq)
    }
}

/// Association response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AAREApdu {
    pub application_context: ApplicationContext,
    pub result: AssociateResult,
    pub diagnostic: SourceDiagnostic,
    /// Server system title, sent with HLS-GMAC
    pub responding_ap_title: Option<Vec<u8>>,
    pub responder_acse_requirements: bool,
    pub mechanism_id: Option<u8>,
    /// Server-to-client challenge (HLS)
    pub responding_authentication_value: Option<Vec<u8>>,
    /// Encoded xDLMS InitiateResponse or confirmed service error
    pub user_information: Option<Vec<u8>>,
}

impl AAREApdu {
    pub fn new(
        application_context: ApplicationContext,
        result: AssociateResult,
        diagnostic: SourceDiagnostic,
    ) -> Self {
        Self {
            application_context,
            result,
            diagnostic,
            responding_ap_title: None,
            responder_acse_requirements: false,
            mechanism_id: None,
            responding_authentication_value: None,
            user_information: None,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = BerEncoder::with_capacity(64);
        encode_application_context(&mut body, self.application_context);

        let mut result = BerEncoder::new();
        result.encode_integer(self.result as i64);
        body.encode_context_specific(2, true, &result.into_bytes());

        let mut value = BerEncoder::new();
        value.encode_integer(self.diagnostic as i64);
        let mut choice = BerEncoder::new();
        choice.encode_context_specific(1, true, &value.into_bytes());
        body.encode_context_specific(3, true, &choice.into_bytes());

        if let Some(title) = &self.responding_ap_title {
            encode_ap_title(&mut body, 4, title);
        }
        if self.responder_acse_requirements {
            body.encode_context_specific(8, false, &AUTHENTICATION_FUNCTIONAL_UNIT);
        }
        if let Some(mechanism_id) = self.mechanism_id {
            encode_mechanism(&mut body, 9, mechanism_id);
        }
        if let Some(value) = &self.responding_authentication_value {
            encode_authentication_value(&mut body, 10, value);
        }
        if let Some(information) = &self.user_information {
            encode_user_information(&mut body, information);
        }
        let mut out = BerEncoder::new();
        out.encode_application(1, true, &body.into_bytes());
        out.into_bytes()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let body = BerDecoder::new(data).decode_application(1, true)?;
        let mut decoder = BerDecoder::new(body);
        let mut context = None;
        let mut result = None;
        let mut aare = AAREApdu::new(
            ApplicationContext::LogicalName,
            AssociateResult::Accepted,
            SourceDiagnostic::Null,
        );
        while decoder.has_remaining() {
            let (tag, content) = decoder.decode_tlv()?;
            match tag.to_byte() {
                TAG_APPLICATION_CONTEXT => context = Some(decode_application_context(content)?),
                TAG_RESULT => {
                    let value = BerDecoder::new(content).decode_integer()?;
                    result = Some(AssociateResult::from_value(value)?);
                }
                TAG_RESULT_DIAGNOSTIC => {
                    // acse-service-user [1] or acse-service-provider [2]
                    let (_, inner) = BerDecoder::new(content).decode_tlv()?;
                    let (_, value) = BerDecoder::new(inner).decode_tlv()?;
                    aare.diagnostic = SourceDiagnostic::from_value(integer_from_content(value)?);
                }
                TAG_RESPONDING_AP_TITLE => {
                    aare.responding_ap_title = Some(decode_ap_title(content)?)
                }
                TAG_RESPONDER_REQUIREMENTS => {
                    aare.responder_acse_requirements =
                        content.len() == 2 && content[1] & 0x80 != 0;
                }
                TAG_AARE_MECHANISM => aare.mechanism_id = Some(decode_mechanism(content)?),
                TAG_RESPONDING_AUTHENTICATION => {
                    aare.responding_authentication_value =
                        Some(decode_authentication_value(content)?)
                }
                TAG_USER_INFORMATION => {
                    aare.user_information = Some(decode_user_information(content)?)
                }
                other => log::trace!("AARE: ignoring field {:02X}", other),
            }
        }
        aare.application_context = context
            .ok_or_else(|| DlmsError::Asn1Decoding("AARE without application context".to_string()))?;
        aare.result =
            result.ok_or_else(|| DlmsError::Asn1Decoding("AARE without result".to_string()))?;
        Ok(aare)
    }
}

fn encode_release(tag_number: u8, reason: Option<ReleaseReason>, information: Option<&[u8]>) -> Vec<u8> {
    let mut body = BerEncoder::new();
    if let Some(reason) = reason {
        body.encode_context_specific(0, false, &[reason as u8]);
    }
    if let Some(information) = information {
        encode_user_information(&mut body, information);
    }
    let mut out = BerEncoder::new();
    out.encode_application(tag_number, true, &body.into_bytes());
    out.into_bytes()
}

type ReleaseFields = (Option<ReleaseReason>, Option<Vec<u8>>);

fn decode_release(tag_number: u8, data: &[u8]) -> DlmsResult<ReleaseFields> {
    let body = BerDecoder::new(data).decode_application(tag_number, true)?;
    let mut decoder = BerDecoder::new(body);
    let mut reason = None;
    let mut information = None;
    while decoder.has_remaining() {
        let (tag, content) = decoder.decode_tlv()?;
        if tag == BerTag::context_specific(false, 0) {
            reason = Some(ReleaseReason::from_value(integer_from_content(content)?)?);
        } else if tag.to_byte() == TAG_USER_INFORMATION {
            information = Some(decode_user_information(content)?);
        }
    }
    Ok((reason, information))
}

/// Release request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RLRQApdu {
    pub reason: Option<ReleaseReason>,
    pub user_information: Option<Vec<u8>>,
}

impl RLRQApdu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_release(2, self.reason, self.user_information.as_deref())
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let (reason, user_information) = decode_release(2, data)?;
        Ok(Self {
            reason,
            user_information,
        })
    }
}

/// Release response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RLREApdu {
    pub reason: Option<ReleaseReason>,
    pub user_information: Option<Vec<u8>>,
}

impl RLREApdu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_release(3, self.reason, self.user_information.as_deref())
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let (reason, user_information) = decode_release(3, data)?;
        Ok(Self {
            reason,
            user_information,
        })
    }
}
