use crate::exception::ExceptionCode;

/// The request/connection task has been shut down
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shutdown;

impl std::fmt::Display for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("task shutdown")
    }
}

/// Errors that can be produced when making a request
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequestError {
    /// An I/O error occurred on the underlying stream
    Io(std::io::ErrorKind),
    /// Frame could not be parsed off the stream
    BadFrame(FrameParseError),
    /// An ADU could not be parsed
    BadResponse(AduParseError),
    /// A request parameter is invalid
    BadRequest(InvalidRange),
    /// The server responded with a Modbus exception
    Exception(ExceptionCode),
    /// An error occurred while serializing data (library bug)
    Internal(InternalError),
    /// Timeout occurred before receiving a response from the server
    ResponseTimeout,
    /// No connection exists to the Modbus server
    NoConnection,
    /// Every transaction id on the connection is awaiting a response
    NoFreeTransactionIds,
    /// The task processing requests has been shut down
    Shutdown,
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::Io(kind) => write!(f, "I/O error: {kind}"),
            RequestError::BadFrame(err) => write!(f, "bad frame: {err}"),
            RequestError::BadResponse(err) => write!(f, "bad response: {err}"),
            RequestError::BadRequest(err) => write!(f, "bad request: {err}"),
            RequestError::Exception(ex) => write!(f, "Modbus exception: {ex}"),
            RequestError::Internal(err) => write!(f, "internal error: {err}"),
            RequestError::ResponseTimeout => {
                f.write_str("timeout occurred before receiving a response from the server")
            }
            RequestError::NoConnection => f.write_str("no connection exists to the Modbus server"),
            RequestError::NoFreeTransactionIds => {
                f.write_str("every transaction id on the connection is awaiting a response")
            }
            RequestError::Shutdown => f.write_str("the task processing requests has been shut down"),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<FrameParseError> for RequestError {
    fn from(err: FrameParseError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<AduParseError> for RequestError {
    fn from(err: AduParseError) -> Self {
        RequestError::BadResponse(err)
    }
}

impl From<InvalidRange> for RequestError {
    fn from(err: InvalidRange) -> Self {
        RequestError::BadRequest(err)
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<ExceptionCode> for RequestError {
    fn from(ex: ExceptionCode) -> Self {
        RequestError::Exception(ex)
    }
}

impl From<Shutdown> for RequestError {
    fn from(_: Shutdown) -> Self {
        RequestError::Shutdown
    }
}

/// Errors that should never occur, but are guarded against for panic safety
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InternalError {
    /// Attempted to write more bytes than fit in the output buffer
    InsufficientWriteSpace(usize, usize), // written vs remaining
    /// The calculated ADU size exceeds the maximum allowed by the spec
    AduTooBig(usize),
    /// Attempted to read more bytes than currently buffered
    InsufficientBytesForRead(usize, usize), // requested vs remaining
    /// Cursor seek operation exceeded the bounds of the underlying buffer
    BadSeekOperation,
    /// Byte count would exceed the maximum size of a u8
    BadByteCount(usize),
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace(write_size, remaining) => write!(
                f,
                "attempted to write {write_size} bytes with {remaining} bytes remaining"
            ),
            InternalError::AduTooBig(size) => write!(
                f,
                "ADU length of {size} exceeds the maximum allowed length"
            ),
            InternalError::InsufficientBytesForRead(requested, remaining) => write!(
                f,
                "attempted to read {requested} bytes with only {remaining} remaining"
            ),
            InternalError::BadSeekOperation => {
                f.write_str("cursor seek operation exceeded the bounds of the underlying buffer")
            }
            InternalError::BadByteCount(count) => {
                write!(f, "byte count would exceed maximum size of u8: {count}")
            }
        }
    }
}

/// Errors that occur while parsing a frame off the TCP stream
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameParseError {
    /// Received a frame with the MBAP length field set to zero
    MbapLengthZero,
    /// Received a frame with a length field that exceeds the maximum allowed size
    MbapLengthTooBig(usize, usize), // actual size and maximum size
    /// Received a frame with a non-Modbus protocol id
    UnknownProtocolId(u16),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameParseError::MbapLengthZero => {
                f.write_str("received frame with the MBAP length field set to zero")
            }
            FrameParseError::MbapLengthTooBig(size, max) => write!(
                f,
                "received frame with length ({size}) that exceeds the maximum allowed size ({max})"
            ),
            FrameParseError::UnknownProtocolId(id) => {
                write!(f, "received frame with non-Modbus protocol id: {id}")
            }
        }
    }
}

/// Errors that occur while parsing requests and responses
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AduParseError {
    /// ADU is too short to be valid
    InsufficientBytes,
    /// Byte count doesn't match the actual number of bytes present
    InsufficientBytesForByteCount(usize, usize), // count / remaining
    /// Byte count field doesn't agree with the declared quantity
    ByteCountMismatch(usize, usize), // expected / actual
    /// ADU contains extra trailing bytes
    TrailingBytes(usize),
    /// A parameter expected to be echoed in the reply did not match
    ReplyEchoMismatch,
    /// An unknown response function code was received
    UnknownResponseFunction(u8, u8, u8), // actual, expected, expected error
    /// Bad value for the coil state
    UnknownCoilState(u16),
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => f.write_str("ADU is too short to be valid"),
            AduParseError::InsufficientBytesForByteCount(count, remaining) => write!(
                f,
                "byte count ({count}) doesn't match the actual number of bytes remaining ({remaining})"
            ),
            AduParseError::ByteCountMismatch(expected, actual) => write!(
                f,
                "byte count field ({actual}) doesn't agree with the declared quantity (expected {expected})"
            ),
            AduParseError::TrailingBytes(remaining) => {
                write!(f, "ADU contains {remaining} extra trailing bytes")
            }
            AduParseError::ReplyEchoMismatch => {
                f.write_str("a parameter expected to be echoed in the reply did not match")
            }
            AduParseError::UnknownResponseFunction(actual, expected, error) => write!(
                f,
                "received unknown response function code: {actual}, expected {expected} or {error}"
            ),
            AduParseError::UnknownCoilState(value) => write!(
                f,
                "received coil state with unspecified value: {value:#06X}"
            ),
        }
    }
}

/// Errors that result from a bad address range
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvalidRange {
    /// Range contains a count of zero
    CountOfZero,
    /// Start and count would overflow the u16 address space
    AddressOverflow(u16, u16),
    /// Count is larger than what is allowed for this request type
    CountTooLargeForType(u16, u16), // count / max
    /// Count exceeds the maximum value of a u16
    CountTooBigForU16(usize),
}

impl std::error::Error for InvalidRange {}

impl std::fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRange::CountOfZero => f.write_str("range contains a count of zero"),
            InvalidRange::AddressOverflow(start, count) => write!(
                f,
                "start ({start}) and count ({count}) would overflow the representation of u16"
            ),
            InvalidRange::CountTooLargeForType(count, max) => write!(
                f,
                "the requested count of {count} exceeds the maximum allowed count of {max} for this type"
            ),
            InvalidRange::CountTooBigForU16(count) => write!(
                f,
                "the requested count of objects exceeds the maximum value of u16: {count}"
            ),
        }
    }
}
