//! SNMP PDU types.
//!
//! All operations except the v1 trap share one body layout: request-id,
//! error-status, error-index, varbind list. GETBULK reuses the two error
//! fields as non-repeaters and max-repetitions. The v1 trap has its own
//! six-field layout.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, push_varbind_list, read_varbind_list};

/// Common PDU body for everything except TrapV1 and GetBulk.
#[derive(Debug, Clone, PartialEq)]
pub struct PduFields {
    /// Request identifier used for response correlation.
    pub request_id: i32,
    /// Error status (0 = noError) as reported by the agent.
    pub error_status: i32,
    /// One-based index of the varbind the error refers to (0 = none).
    pub error_index: i32,
    /// The variable bindings.
    pub varbinds: Vec<VarBind>,
}

impl PduFields {
    /// Typed view of the error status field.
    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }
}

/// GETBULK body: the error fields carry iteration controls instead.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkFields {
    /// Request identifier used for response correlation.
    pub request_id: i32,
    /// Number of leading varbinds fetched as plain GETNEXT.
    pub non_repeaters: i32,
    /// Number of GETNEXT iterations over the remaining varbinds.
    pub max_repetitions: i32,
    /// The variable bindings.
    pub varbinds: Vec<VarBind>,
}

/// SNMPv1 trap body.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// OID of the object generating the trap.
    pub enterprise: Oid,
    /// IPv4 address of the generating agent.
    pub agent_addr: [u8; 4],
    /// Generic trap type, 0..=6.
    pub generic_trap: i32,
    /// Enterprise-specific trap code.
    pub specific_trap: i32,
    /// sysUpTime at generation, in TimeTicks.
    pub timestamp: u32,
    /// The variable bindings.
    pub varbinds: Vec<VarBind>,
}

/// An SNMP PDU, tagged by operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    /// GET request (0xA0).
    GetRequest(PduFields),
    /// GET-NEXT request (0xA1).
    GetNextRequest(PduFields),
    /// Response (0xA2).
    Response(PduFields),
    /// SET request (0xA3).
    SetRequest(PduFields),
    /// SNMPv1 trap (0xA4).
    TrapV1(TrapV1Pdu),
    /// GET-BULK request (0xA5).
    GetBulkRequest(BulkFields),
    /// INFORM request (0xA6).
    InformRequest(PduFields),
    /// SNMPv2 trap (0xA7).
    TrapV2(PduFields),
    /// Report (0xA8).
    Report(PduFields),
}

impl Pdu {
    /// Build a GET request binding NULL values to the given OIDs.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::GetRequest(request_fields(request_id, oids))
    }

    /// Build a GET-NEXT request binding NULL values to the given OIDs.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        Self::GetNextRequest(request_fields(request_id, oids))
    }

    /// Build a GET-BULK request. Both iteration controls must be non-negative.
    pub fn get_bulk_request(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Result<Self> {
        if non_repeaters < 0 {
            return Err(Error::decode(
                0,
                DecodeErrorKind::NegativeNonRepeaters {
                    value: non_repeaters,
                },
            ));
        }
        if max_repetitions < 0 {
            return Err(Error::decode(
                0,
                DecodeErrorKind::NegativeMaxRepetitions {
                    value: max_repetitions,
                },
            ));
        }
        Ok(Self::GetBulkRequest(BulkFields {
            request_id,
            non_repeaters,
            max_repetitions,
            varbinds: oids.iter().cloned().map(VarBind::null).collect(),
        }))
    }

    /// Build a SET request with fully typed varbinds.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::SetRequest(PduFields {
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    /// Build a response PDU.
    pub fn response(
        request_id: i32,
        error_status: ErrorStatus,
        error_index: i32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self::Response(PduFields {
            request_id,
            error_status: error_status.as_i32(),
            error_index,
            varbinds,
        })
    }

    /// Build an INFORM request (acknowledged notification).
    pub fn inform_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::InformRequest(PduFields {
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    /// Build a v2 trap (unacknowledged notification).
    pub fn trap_v2(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::TrapV2(PduFields {
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    /// Build a Report PDU.
    pub fn report(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::Report(PduFields {
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    /// The BER tag of this PDU.
    pub fn tag(&self) -> u8 {
        match self {
            Self::GetRequest(_) => tag::GET_REQUEST,
            Self::GetNextRequest(_) => tag::GET_NEXT_REQUEST,
            Self::Response(_) => tag::RESPONSE,
            Self::SetRequest(_) => tag::SET_REQUEST,
            Self::TrapV1(_) => tag::TRAP_V1,
            Self::GetBulkRequest(_) => tag::GET_BULK_REQUEST,
            Self::InformRequest(_) => tag::INFORM_REQUEST,
            Self::TrapV2(_) => tag::TRAP_V2,
            Self::Report(_) => tag::REPORT,
        }
    }

    /// Request identifier, if this PDU layout carries one.
    pub fn request_id(&self) -> Option<i32> {
        match self {
            Self::GetRequest(f)
            | Self::GetNextRequest(f)
            | Self::Response(f)
            | Self::SetRequest(f)
            | Self::InformRequest(f)
            | Self::TrapV2(f)
            | Self::Report(f) => Some(f.request_id),
            Self::GetBulkRequest(f) => Some(f.request_id),
            Self::TrapV1(_) => None,
        }
    }

    /// The varbind list.
    pub fn varbinds(&self) -> &[VarBind] {
        match self {
            Self::GetRequest(f)
            | Self::GetNextRequest(f)
            | Self::Response(f)
            | Self::SetRequest(f)
            | Self::InformRequest(f)
            | Self::TrapV2(f)
            | Self::Report(f) => &f.varbinds,
            Self::GetBulkRequest(f) => &f.varbinds,
            Self::TrapV1(f) => &f.varbinds,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Self::TrapV1(trap) => {
                buf.push_constructed(tag::TRAP_V1, |buf| {
                    push_varbind_list(buf, &trap.varbinds);
                    buf.push_unsigned32(tag::TIMETICKS, trap.timestamp);
                    buf.push_integer(trap.specific_trap);
                    buf.push_integer(trap.generic_trap);
                    buf.push_ip_address(trap.agent_addr);
                    buf.push_oid(&trap.enterprise);
                });
            }
            Self::GetBulkRequest(fields) => {
                buf.push_constructed(tag::GET_BULK_REQUEST, |buf| {
                    push_varbind_list(buf, &fields.varbinds);
                    buf.push_integer(fields.max_repetitions);
                    buf.push_integer(fields.non_repeaters);
                    buf.push_integer(fields.request_id);
                });
            }
            Self::GetRequest(fields)
            | Self::GetNextRequest(fields)
            | Self::Response(fields)
            | Self::SetRequest(fields)
            | Self::InformRequest(fields)
            | Self::TrapV2(fields)
            | Self::Report(fields) => {
                buf.push_constructed(self.tag(), |buf| {
                    push_varbind_list(buf, &fields.varbinds);
                    buf.push_integer(fields.error_index);
                    buf.push_integer(fields.error_status);
                    buf.push_integer(fields.request_id);
                });
            }
        }
    }

    /// Decode from BER, dispatching on the PDU tag.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let offset = decoder.position();
        let pdu_tag = decoder.peek_tag()?;
        if !tag::is_pdu_tag(pdu_tag) {
            return Err(Error::decode(offset, DecodeErrorKind::UnknownPduType(pdu_tag)));
        }

        let mut body = decoder.read_constructed(pdu_tag)?;

        if pdu_tag == tag::TRAP_V1 {
            let enterprise = body.read_oid()?;
            let agent_addr = body.read_ip_address()?;
            let generic_offset = body.position();
            let generic_trap = body.read_integer()?;
            if !(0..=6).contains(&generic_trap) {
                return Err(Error::decode(
                    generic_offset,
                    DecodeErrorKind::GenericTrapOutOfRange {
                        value: generic_trap,
                    },
                ));
            }
            let specific_trap = body.read_integer()?;
            let timestamp = body.read_unsigned32(tag::TIMETICKS)?;
            let varbinds = read_varbind_list(&mut body)?;
            return Ok(Self::TrapV1(TrapV1Pdu {
                enterprise,
                agent_addr,
                generic_trap,
                specific_trap,
                timestamp,
                varbinds,
            }));
        }

        let request_id = body.read_integer()?;
        let second_offset = body.position();
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let varbinds = read_varbind_list(&mut body)?;

        if pdu_tag == tag::GET_BULK_REQUEST {
            if error_status < 0 {
                return Err(Error::decode(
                    second_offset,
                    DecodeErrorKind::NegativeNonRepeaters {
                        value: error_status,
                    },
                ));
            }
            if error_index < 0 {
                return Err(Error::decode(
                    second_offset,
                    DecodeErrorKind::NegativeMaxRepetitions { value: error_index },
                ));
            }
            return Ok(Self::GetBulkRequest(BulkFields {
                request_id,
                non_repeaters: error_status,
                max_repetitions: error_index,
                varbinds,
            }));
        }

        let fields = PduFields {
            request_id,
            error_status,
            error_index,
            varbinds,
        };

        Ok(match pdu_tag {
            tag::GET_REQUEST => Self::GetRequest(fields),
            tag::GET_NEXT_REQUEST => Self::GetNextRequest(fields),
            tag::RESPONSE => Self::Response(fields),
            tag::SET_REQUEST => Self::SetRequest(fields),
            tag::INFORM_REQUEST => Self::InformRequest(fields),
            tag::TRAP_V2 => Self::TrapV2(fields),
            tag::REPORT => Self::Report(fields),
            _ => unreachable!("tag checked above"),
        })
    }

    /// Access the common fields of a non-TrapV1, non-GetBulk PDU.
    pub fn fields(&self) -> Option<&PduFields> {
        match self {
            Self::GetRequest(f)
            | Self::GetNextRequest(f)
            | Self::Response(f)
            | Self::SetRequest(f)
            | Self::InformRequest(f)
            | Self::TrapV2(f)
            | Self::Report(f) => Some(f),
            Self::GetBulkRequest(_) | Self::TrapV1(_) => None,
        }
    }
}

fn request_fields(request_id: i32, oids: &[Oid]) -> PduFields {
    PduFields {
        request_id,
        error_status: 0,
        error_index: 0,
        varbinds: oids.iter().cloned().map(VarBind::null).collect(),
    }
}
