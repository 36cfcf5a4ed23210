use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::FunctionCode;
use crate::common::traits::{Parse, Serialize};
use crate::decode::AppDecodeLevel;
use crate::error::{AduParseError, RequestError};

pub(crate) struct SingleWrite<T>
where
    T: Serialize + Parse + PartialEq + Copy + std::fmt::Display,
{
    pub(crate) request: T,
    promise: Promise<T>,
}

impl<T> SingleWrite<T>
where
    T: Serialize + Parse + PartialEq + Copy + std::fmt::Display,
{
    pub(crate) fn new(request: T, promise: Promise<T>) -> Self {
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
        let result = Self::parse_all(self.request, &mut cursor);

        match result {
            Ok(response) => {
                if decode.enabled() {
                    tracing::info!("PDU RX - {} {}", function, response);
                }
                self.promise.complete(Ok(response));
                Ok(())
            }
            Err(err) => {
                self.promise.failure(err);
                Err(err)
            }
        }
    }

    fn parse_all(request: T, cursor: &mut ReadCursor) -> Result<T, RequestError> {
        let response = T::parse(cursor)?;
        cursor.expect_empty()?;
        if request != response {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }
        Ok(response)
    }
}
