use crate::common::buffer::ReadBuffer;
use crate::common::cursor::WriteCursor;
use crate::common::frame::{Frame, FrameHeader, FunctionField, TxId};
use crate::common::phys::format_bytes;
use crate::common::traits::Serialize;
use crate::decode::FrameDecodeLevel;
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_FRAME_LENGTH: usize =
        HEADER_LENGTH + crate::common::frame::constants::MAX_ADU_LENGTH;
    // the length field includes the 1-byte unit id
    pub(crate) const MAX_LENGTH_FIELD: usize =
        crate::common::frame::constants::MAX_ADU_LENGTH + 1;
}

#[derive(Clone, Copy)]
struct MbapHeader {
    tx_id: TxId,
    adu_length: usize,
    unit_id: UnitId,
}

#[derive(Clone, Copy)]
enum ParseState {
    Begin,
    Header(MbapHeader),
}

pub(crate) struct MbapParser {
    state: ParseState,
}

impl MbapParser {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::Begin,
        }
    }

    fn parse_header(cursor: &mut ReadBuffer) -> Result<MbapHeader, RequestError> {
        let tx_id = TxId::new(cursor.read_u16_be()?);
        let protocol_id = cursor.read_u16_be()?;
        let length = cursor.read_u16_be()? as usize;
        let unit_id = UnitId::new(cursor.read_u8()?);

        if protocol_id != 0 {
            return Err(FrameParseError::UnknownProtocolId(protocol_id).into());
        }

        if length > constants::MAX_LENGTH_FIELD {
            return Err(
                FrameParseError::MbapLengthTooBig(length, constants::MAX_LENGTH_FIELD).into(),
            );
        }

        // must be > 0 b/c the 1-byte unit identifier counts towards length
        if length == 0 {
            return Err(FrameParseError::MbapLengthZero.into());
        }

        Ok(MbapHeader {
            tx_id,
            adu_length: length - 1,
            unit_id,
        })
    }

    fn parse_body(header: &MbapHeader, cursor: &mut ReadBuffer) -> Result<Frame, RequestError> {
        let mut frame = Frame::new(FrameHeader::new(header.unit_id, header.tx_id));
        frame.set(cursor.read(header.adu_length)?);
        Ok(frame)
    }

    pub(crate) fn parse(
        &mut self,
        cursor: &mut ReadBuffer,
        decode: FrameDecodeLevel,
    ) -> Result<Option<Frame>, RequestError> {
        match self.state {
            ParseState::Header(header) => {
                if cursor.len() < header.adu_length {
                    return Ok(None);
                }

                let frame = Self::parse_body(&header, cursor)?;
                self.state = ParseState::Begin;

                if decode.enabled() {
                    tracing::info!(
                        "FRAME RX - {}",
                        MbapDisplay::new(decode, frame.header, frame.payload())
                    );
                }

                Ok(Some(frame))
            }
            ParseState::Begin => {
                if cursor.len() < constants::HEADER_LENGTH {
                    return Ok(None);
                }

                self.state = ParseState::Header(Self::parse_header(cursor)?);
                self.parse(cursor, decode)
            }
        }
    }
}

pub(crate) struct MbapFormatter {
    buffer: [u8; constants::MAX_FRAME_LENGTH],
}

impl MbapFormatter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: [0; constants::MAX_FRAME_LENGTH],
        }
    }

    pub(crate) fn format(
        &mut self,
        header: FrameHeader,
        function: FunctionField,
        body: &dyn Serialize,
        decode: FrameDecodeLevel,
    ) -> Result<usize, RequestError> {
        let mut cursor = WriteCursor::new(self.buffer.as_mut());
        cursor.write_u16_be(header.tx_id.to_u16())?;
        cursor.write_u16_be(0)?; // protocol id
        cursor.seek_from_current(2)?; // the length is written afterwards
        cursor.write_u8(header.unit_id.value)?;

        let adu_length: usize = {
            let start = cursor.position();
            cursor.write_u8(function.get_value())?;
            body.serialize(&mut cursor)?;
            cursor.position() - start
        };

        {
            // write the resulting length
            let frame_length_value = u16::try_from(adu_length + 1)
                .map_err(|_| InternalError::AduTooBig(adu_length))?;
            cursor.seek_from_start(4)?;
            cursor.write_u16_be(frame_length_value)?;
        }

        let total_length = constants::HEADER_LENGTH + adu_length;

        if decode.enabled() {
            tracing::info!(
                "FRAME TX - {}",
                MbapDisplay::new(decode, header, self.pdu_with_function(total_length))
            );
        }

        Ok(total_length)
    }

    pub(crate) fn frame_bytes(&self, len: usize) -> &[u8] {
        self.buffer.get(..len).unwrap_or(&[])
    }

    // the serialized PDU minus its function code byte
    pub(crate) fn pdu_body(&self, len: usize) -> &[u8] {
        self.buffer
            .get(constants::HEADER_LENGTH + 1..len)
            .unwrap_or(&[])
    }

    fn pdu_with_function(&self, len: usize) -> &[u8] {
        self.buffer.get(constants::HEADER_LENGTH..len).unwrap_or(&[])
    }
}

struct MbapDisplay<'a> {
    level: FrameDecodeLevel,
    header: FrameHeader,
    adu: &'a [u8],
}

impl<'a> MbapDisplay<'a> {
    fn new(level: FrameDecodeLevel, header: FrameHeader, adu: &'a [u8]) -> Self {
        MbapDisplay { level, header, adu }
    }
}

impl std::fmt::Display for MbapDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tx id: {} unit: {} (len = {})",
            self.header.tx_id,
            self.header.unit_id,
            self.adu.len()
        )?;
        if self.level.payload_enabled() {
            format_bytes(f, self.adu)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use crate::common::frame::{FramedReader, FrameWriter};
    use crate::common::function::FunctionCode;
    use crate::common::phys::PhysLayer;
    use crate::common::traits::Loggable;
    use crate::decode::{AppDecodeLevel, DecodeLevel};

    use super::*;

    //                            |   tx id  |  proto id |  length  | unit |  payload  |
    const SIMPLE_FRAME: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x2A, 0x03, 0x04];

    struct MockMessage {
        a: u8,
    }

    impl Serialize for MockMessage {
        fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
            cursor.write_u8(self.a)?;
            Ok(())
        }
    }

    impl Loggable for MockMessage {
        fn log(
            &self,
            _payload: &[u8],
            _level: AppDecodeLevel,
            _f: &mut std::fmt::Formatter,
        ) -> std::fmt::Result {
            Ok(())
        }
    }

    fn simple_frame_header() -> FrameHeader {
        FrameHeader::new(UnitId::new(42), TxId::new(7))
    }

    fn assert_equals_simple_frame(frame: &Frame) {
        assert_eq!(frame.header, simple_frame_header());
        assert_eq!(frame.payload(), &[0x03, 0x04]);
    }

    async fn test_segmented_parse(split_at: usize) {
        let (f1, f2) = SIMPLE_FRAME.split_at(split_at);
        let mut io = PhysLayer::new_mock(Builder::new().read(f1).read(f2).build());
        let mut reader = FramedReader::tcp();
        let frame = reader
            .next_frame(&mut io, DecodeLevel::nothing())
            .await
            .unwrap();

        assert_equals_simple_frame(&frame);
    }

    async fn test_error(input: &[u8]) -> RequestError {
        let mut io = PhysLayer::new_mock(Builder::new().read(input).build());
        let mut reader = FramedReader::tcp();
        reader
            .next_frame(&mut io, DecodeLevel::nothing())
            .await
            .err()
            .unwrap()
    }

    #[test]
    fn correctly_formats_frame() {
        let mut writer = FrameWriter::tcp();
        let msg = MockMessage { a: 0x04 };
        let bytes = writer
            .format_request(
                simple_frame_header(),
                FunctionCode::ReadHoldingRegisters,
                &msg,
                DecodeLevel::nothing(),
            )
            .unwrap();

        assert_eq!(bytes, SIMPLE_FRAME)
    }

    #[tokio::test]
    async fn can_parse_frame_from_stream() {
        let mut io = PhysLayer::new_mock(Builder::new().read(SIMPLE_FRAME).build());
        let mut reader = FramedReader::tcp();
        let frame = reader
            .next_frame(&mut io, DecodeLevel::nothing())
            .await
            .unwrap();

        assert_equals_simple_frame(&frame);
    }

    #[tokio::test]
    async fn can_parse_maximum_size_frame() {
        // maximum ADU length is 253, so the max MBAP length value is 254 which is 0xFE
        let header = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFE, 0x2A];
        let payload = &[0xCC; 253];

        let mut io = PhysLayer::new_mock(Builder::new().read(header).read(payload).build());
        let mut reader = FramedReader::tcp();
        let frame = reader
            .next_frame(&mut io, DecodeLevel::nothing())
            .await
            .unwrap();

        assert_eq!(frame.payload(), payload.as_ref());
    }

    #[tokio::test]
    async fn can_parse_frame_if_segmented_in_header() {
        test_segmented_parse(4).await;
    }

    #[tokio::test]
    async fn can_parse_frame_if_segmented_in_payload() {
        test_segmented_parse(8).await;
    }

    #[tokio::test]
    async fn errors_on_bad_protocol_id() {
        let frame = &[0x00, 0x07, 0xCA, 0xFE, 0x00, 0x01, 0x2A];
        assert_eq!(
            test_error(frame).await,
            RequestError::BadFrame(FrameParseError::UnknownProtocolId(0xCAFE))
        );
    }

    #[tokio::test]
    async fn errors_on_length_of_zero() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x2A];
        assert_eq!(
            test_error(frame).await,
            RequestError::BadFrame(FrameParseError::MbapLengthZero)
        );
    }

    #[tokio::test]
    async fn errors_when_mbap_length_too_big() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFF, 0x2A];
        assert_eq!(
            test_error(frame).await,
            RequestError::BadFrame(FrameParseError::MbapLengthTooBig(
                0xFF,
                constants::MAX_LENGTH_FIELD
            ))
        );
    }
}
