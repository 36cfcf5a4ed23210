use crate::common::buffer::ReadBuffer;
use crate::common::function::FunctionCode;
use crate::common::phys::PhysLayer;
use crate::common::traits::{Loggable, LoggableDisplay, Serialize};
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::exception::ExceptionCode;
use crate::tcp::frame::{MbapFormatter, MbapParser};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const MAX_ADU_LENGTH: usize = 253;
}

/// Transaction id of a TCP frame, a wrapping u16 counter per connection
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
pub(crate) struct TxId {
    value: u16,
}

impl TxId {
    pub(crate) fn new(value: u16) -> Self {
        TxId { value }
    }

    pub(crate) fn to_u16(self) -> u16 {
        self.value
    }

    pub(crate) fn next(&mut self) -> TxId {
        let ret = self.value;
        self.value = self.value.wrapping_add(1);
        TxId::new(ret)
    }
}

impl Default for TxId {
    fn default() -> Self {
        TxId::new(0)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct FrameHeader {
    pub(crate) unit_id: UnitId,
    pub(crate) tx_id: TxId,
}

impl FrameHeader {
    pub(crate) fn new(unit_id: UnitId, tx_id: TxId) -> Self {
        FrameHeader { unit_id, tx_id }
    }
}

pub(crate) struct Frame {
    pub(crate) header: FrameHeader,
    length: usize,
    adu: [u8; constants::MAX_ADU_LENGTH],
}

impl Frame {
    pub(crate) fn new(header: FrameHeader) -> Frame {
        Frame {
            header,
            length: 0,
            adu: [0; constants::MAX_ADU_LENGTH],
        }
    }

    pub(crate) fn set(&mut self, src: &[u8]) -> bool {
        if src.len() > self.adu.len() {
            return false;
        }

        self.adu[0..src.len()].copy_from_slice(src);
        self.length = src.len();
        true
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.adu[0..self.length]
    }
}

/// The function code byte written to a response PDU, which is either
/// the request function code or its error variant with the high bit set
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum FunctionField {
    Valid(FunctionCode),
    Exception(FunctionCode),
    UnknownFunction(u8),
}

impl FunctionField {
    pub(crate) fn get_value(self) -> u8 {
        match self {
            FunctionField::Valid(x) => x.get_value(),
            FunctionField::Exception(x) => x.as_error(),
            FunctionField::UnknownFunction(x) => x | 0x80,
        }
    }
}

impl std::fmt::Display for FunctionField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FunctionField::Valid(x) => write!(f, "{x}"),
            FunctionField::Exception(x) => write!(f, "EXCEPTION TO {x}"),
            FunctionField::UnknownFunction(x) => write!(f, "UNKNOWN FUNCTION ({x:#04X})"),
        }
    }
}

/// Reads complete frames off a transport, buffering partial reads
pub(crate) struct FramedReader {
    parser: MbapParser,
    buffer: ReadBuffer,
}

impl FramedReader {
    pub(crate) fn tcp() -> Self {
        Self {
            parser: MbapParser::new(),
            buffer: ReadBuffer::new(crate::tcp::frame::constants::MAX_FRAME_LENGTH),
        }
    }

    pub(crate) async fn next_frame(
        &mut self,
        io: &mut PhysLayer,
        decode: DecodeLevel,
    ) -> Result<Frame, RequestError> {
        loop {
            match self.parser.parse(&mut self.buffer, decode.frame)? {
                Some(frame) => return Ok(frame),
                None => {
                    self.buffer.read_some(io, decode.physical).await?;
                }
            }
        }
    }
}

/// Writes complete frames to an internal buffer, echoing or assigning headers
pub(crate) struct FrameWriter {
    formatter: MbapFormatter,
}

impl FrameWriter {
    pub(crate) fn tcp() -> Self {
        Self {
            formatter: MbapFormatter::new(),
        }
    }

    pub(crate) fn format_request<T>(
        &mut self,
        header: FrameHeader,
        function: FunctionCode,
        msg: &T,
        decode: DecodeLevel,
    ) -> Result<&[u8], RequestError>
    where
        T: Serialize + Loggable,
    {
        let len = self
            .formatter
            .format(header, FunctionField::Valid(function), msg, decode.frame)?;

        if decode.app.enabled() {
            tracing::info!(
                "PDU TX - {} {}",
                function,
                LoggableDisplay::new(msg, self.formatter.pdu_body(len), decode.app)
            );
        }

        Ok(self.formatter.frame_bytes(len))
    }

    // try to serialize a successful reply, falling back to an exception
    // response when the handler rejects part of the request
    pub(crate) fn format_reply<T>(
        &mut self,
        header: FrameHeader,
        function: FunctionCode,
        msg: &T,
        decode: DecodeLevel,
    ) -> Result<&[u8], RequestError>
    where
        T: Serialize + Loggable,
    {
        match self
            .formatter
            .format(header, FunctionField::Valid(function), msg, decode.frame)
        {
            Ok(len) => {
                if decode.app.enabled() {
                    tracing::info!(
                        "PDU TX - {} {}",
                        function,
                        LoggableDisplay::new(msg, self.formatter.pdu_body(len), decode.app)
                    );
                }
                Ok(self.formatter.frame_bytes(len))
            }
            Err(RequestError::Exception(ex)) => {
                self.format_ex(header, FunctionField::Exception(function), ex, decode)
            }
            Err(err) => Err(err),
        }
    }

    // make a single effort to serialize an exception response
    pub(crate) fn format_ex(
        &mut self,
        header: FrameHeader,
        function: FunctionField,
        ex: ExceptionCode,
        decode: DecodeLevel,
    ) -> Result<&[u8], RequestError> {
        if decode.app.enabled() {
            tracing::warn!("PDU TX - Modbus exception {:?} ({:#04X})", ex, u8::from(ex));
        }

        let len = self.formatter.format(header, function, &ex, decode.frame)?;
        Ok(self.formatter.frame_bytes(len))
    }
}
