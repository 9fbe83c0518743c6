//! Variable bindings.
//!
//! A VarBind is SNMP's unit of data transfer: a two-element SEQUENCE with
//! the object name first and its value second. PDUs carry them in a
//! VarBindList (SEQUENCE OF VarBind). Decoding insists on the pair shape;
//! a binding with extra elements is rejected.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::value::Value;

/// sysUpTime.0, the mandatory first binding of every v2 notification.
pub fn sys_uptime_oid() -> Oid {
    crate::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// snmpTrapOID.0, the mandatory second binding of every v2 notification.
pub fn snmp_trap_oid() -> Oid {
    crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
}

/// An object name bound to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object name.
    pub oid: Oid,
    /// The bound value.
    pub value: Value,
}

impl VarBind {
    /// Bind `value` to `oid`.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Bind NULL to `oid`, the way read requests do.
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, Value::Null)
    }

    /// Encode the two-element SEQUENCE.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            // Backwards writer: value goes in first so the name ends up in front
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    /// Decode one binding, requiring exactly two elements with the name first.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pair = decoder.read_sequence()?;
        let oid = pair.read_oid()?;
        let value = Value::decode(&mut pair)?;
        if !pair.is_empty() {
            return Err(Error::decode(
                pair.position(),
                DecodeErrorKind::TrailingVarBindData,
            ));
        }
        Ok(Self { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a VarBindList.
pub fn push_varbind_list(buf: &mut EncodeBuf, bindings: &[VarBind]) {
    buf.push_sequence(|buf| {
        bindings.iter().rev().for_each(|vb| vb.encode(buf));
    });
}

/// Decode a VarBindList.
pub fn read_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut list = decoder.read_sequence()?;
    std::iter::from_fn(|| (!list.is_empty()).then(|| VarBind::decode(&mut list))).collect()
}

/// Prefix user bindings with the fixed v2 notification header: sysUpTime.0
/// carrying the sender's uptime, then snmpTrapOID.0 naming the notification.
pub fn notification_varbinds(
    sys_uptime: u32,
    trap_oid: Oid,
    user_varbinds: Vec<VarBind>,
) -> Vec<VarBind> {
    let mut bindings = vec![
        VarBind::new(sys_uptime_oid(), Value::TimeTicks(sys_uptime)),
        VarBind::new(snmp_trap_oid(), Value::ObjectIdentifier(trap_oid)),
    ];
    bindings.extend(user_varbinds);
    bindings
}
