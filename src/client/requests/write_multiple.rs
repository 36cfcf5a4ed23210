use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::FunctionCode;
use crate::common::traits::{Parse, Serialize};
use crate::decode::AppDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::types::{AddressRange, WriteMultiple};

pub(crate) struct MultipleWrite<T>
where
    WriteMultiple<T>: Serialize,
{
    pub(crate) request: WriteMultiple<T>,
    promise: Promise<AddressRange>,
}

impl<T> MultipleWrite<T>
where
    WriteMultiple<T>: Serialize,
{
    pub(crate) fn new(request: WriteMultiple<T>, promise: Promise<AddressRange>) -> Self {
        Self { request, promise }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.request.serialize(cursor)
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
        let result = Self::parse_all(self.request.range, &mut cursor);

        match result {
            Ok(range) => {
                if decode.enabled() {
                    tracing::info!("PDU RX - {} {}", function, range);
                }
                self.promise.complete(Ok(range));
                Ok(())
            }
            Err(err) => {
                self.promise.failure(err);
                Err(err)
            }
        }
    }

    // the reply echoes the range of the request
    fn parse_all(request: AddressRange, cursor: &mut ReadCursor) -> Result<AddressRange, RequestError> {
        let range = AddressRange::parse(cursor)?;
        cursor.expect_empty()?;
        if range != request {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }
        Ok(range)
    }
}
