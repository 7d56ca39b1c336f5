//! Canonical reply types shared by dispatch and the wire codec.

/// Wire-level error category carried inside an ERR reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Unknown command or wrong arity.
    Unknown = 1,
    /// Payload exceeds a configured ceiling.
    TooBig = 2,
    /// Operation applied to an entry of the wrong type.
    BadType = 3,
    /// Argument failed numeric/format validation.
    BadArg = 4,
}

impl ErrorCode {
    /// Numeric code written on the wire.
    #[must_use]
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Reply payload type tags.
pub const TAG_NIL: u8 = 0;
pub const TAG_ERR: u8 = 1;
pub const TAG_STR: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_DOUBLE: u8 = 4;
pub const TAG_ARRAY: u8 = 5;

/// Protocol-neutral command reply.
///
/// Handlers build replies from this enum; the one encoding site lives here so dispatch logic
/// stays independent of the byte layout.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Absent value.
    Nil,
    /// Typed error with a human-readable message.
    Err(ErrorCode, String),
    /// Binary-safe string payload.
    Str(Vec<u8>),
    /// 64-bit signed integer.
    Int(i64),
    /// IEEE-754 double.
    Double(f64),
    /// Nested sequence of replies.
    Array(Vec<CommandReply>),
}

impl CommandReply {
    /// Appends the tagged payload encoding (no length prefix) to `out`.
    pub fn encode_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::Nil => out.push(TAG_NIL),
            Self::Err(code, message) => {
                out.push(TAG_ERR);
                out.extend_from_slice(&code.code().to_le_bytes());
                out.extend_from_slice(&(message.len() as u32).to_le_bytes());
                out.extend_from_slice(message.as_bytes());
            }
            Self::Str(value) => {
                out.push(TAG_STR);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value);
            }
            Self::Int(value) => {
                out.push(TAG_INT);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Self::Double(value) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Self::Array(items) => {
                out.push(TAG_ARRAY);
                out.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    item.encode_payload(out);
                }
            }
        }
    }
}
