use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::FunctionCode;
use crate::common::traits::Serialize;
use crate::decode::AppDecodeLevel;
use crate::error::RequestError;
use crate::types::{AddressRange, BitIterator, BitIteratorDisplay, Indexed, ReadBitsRange};

pub(crate) struct ReadBits {
    pub(crate) request: ReadBitsRange,
    promise: Promise<Vec<Indexed<bool>>>,
}

impl ReadBits {
    pub(crate) fn new(request: ReadBitsRange, promise: Promise<Vec<Indexed<bool>>>) -> Self {
        Self { request, promise }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.request.get().serialize(cursor)
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.promise.failure(err)
    }

    pub(crate) fn handle_response(
        self,
        mut cursor: ReadCursor,
        function: FunctionCode,
        decode: AppDecodeLevel,
    ) -> Result<(), RequestError> {
        let result = Self::parse_bits_response(self.request.get(), &mut cursor);

        match result {
            Ok(response) => {
                if decode.enabled() {
                    tracing::info!(
                        "PDU RX - {} {}",
                        function,
                        BitIteratorDisplay::new(decode, response)
                    );
                }
                self.promise.complete(Ok(response.collect()));
                Ok(())
            }
            Err(err) => {
                self.promise.failure(err);
                Err(err)
            }
        }
    }

    fn parse_bits_response<'a>(
        range: AddressRange,
        cursor: &mut ReadCursor<'a>,
    ) -> Result<BitIterator<'a>, RequestError> {
        // there's a byte-count here that we don't actually need
        cursor.read_u8()?;
        // the rest is a sequence of bits
        BitIterator::parse_all(range, cursor)
    }
}
