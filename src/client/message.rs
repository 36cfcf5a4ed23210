use std::time::Duration;

use tokio::sync::oneshot;

use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::MultipleWrite;
use crate::client::requests::write_single::SingleWrite;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::FunctionCode;
use crate::common::traits::{Loggable, Serialize};
use crate::decode::AppDecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::exception::ExceptionCode;
use crate::types::{Indexed, UnitId};

/// All the information the connection task needs to process a request
pub(crate) struct Request {
    pub(crate) id: UnitId,
    pub(crate) timeout: Duration,
    pub(crate) details: RequestDetails,
}

impl Request {
    pub(crate) fn new(id: UnitId, timeout: Duration, details: RequestDetails) -> Self {
        Self {
            id,
            timeout,
            details,
        }
    }
}

/// Wrapper around a typed request that can serialize itself and
/// parse/complete the matching response
pub(crate) enum RequestDetails {
    ReadCoils(ReadBits),
    ReadDiscreteInputs(ReadBits),
    ReadHoldingRegisters(ReadRegisters),
    ReadInputRegisters(ReadRegisters),
    WriteSingleCoil(SingleWrite<Indexed<bool>>),
    WriteSingleRegister(SingleWrite<Indexed<u16>>),
    WriteMultipleCoils(MultipleWrite<bool>),
    WriteMultipleRegisters(MultipleWrite<u16>),
}

impl RequestDetails {
    pub(crate) fn function(&self) -> FunctionCode {
        match self {
            RequestDetails::ReadCoils(_) => FunctionCode::ReadCoils,
            RequestDetails::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            RequestDetails::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            RequestDetails::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            RequestDetails::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            RequestDetails::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            RequestDetails::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            RequestDetails::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
        }
    }

    pub(crate) fn fail(self, err: RequestError) {
        match self {
            RequestDetails::ReadCoils(x) => x.failure(err),
            RequestDetails::ReadDiscreteInputs(x) => x.failure(err),
            RequestDetails::ReadHoldingRegisters(x) => x.failure(err),
            RequestDetails::ReadInputRegisters(x) => x.failure(err),
            RequestDetails::WriteSingleCoil(x) => x.failure(err),
            RequestDetails::WriteSingleRegister(x) => x.failure(err),
            RequestDetails::WriteMultipleCoils(x) => x.failure(err),
            RequestDetails::WriteMultipleRegisters(x) => x.failure(err),
        }
    }

    /// Parse the response PDU and complete the caller's promise, returning
    /// any error for session-level bookkeeping
    pub(crate) fn handle_response(
        self,
        payload: &[u8],
        decode: AppDecodeLevel,
    ) -> Result<(), RequestError> {
        let expected = self.function();
        let mut cursor = ReadCursor::new(payload);

        match Self::check_function(expected, &mut cursor) {
            Ok(()) => {}
            Err(err) => {
                self.fail(err);
                return Err(err);
            }
        }

        let function = expected;
        match self {
            RequestDetails::ReadCoils(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadDiscreteInputs(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadHoldingRegisters(x) => x.handle_response(cursor, function, decode),
            RequestDetails::ReadInputRegisters(x) => x.handle_response(cursor, function, decode),
            RequestDetails::WriteSingleCoil(x) => x.handle_response(cursor, function, decode),
            RequestDetails::WriteSingleRegister(x) => x.handle_response(cursor, function, decode),
            RequestDetails::WriteMultipleCoils(x) => x.handle_response(cursor, function, decode),
            RequestDetails::WriteMultipleRegisters(x) => x.handle_response(cursor, function, decode),
        }
    }

    // a response either echoes the request function code, or sets its high
    // bit and carries a single-byte exception code
    fn check_function(
        expected: FunctionCode,
        cursor: &mut ReadCursor,
    ) -> Result<(), RequestError> {
        let received = cursor.read_u8()?;
        if received == expected.get_value() {
            return Ok(());
        }
        if received == expected.as_error() {
            let ex = ExceptionCode::from(cursor.read_u8()?);
            return Err(RequestError::Exception(ex));
        }
        Err(
            AduParseError::UnknownResponseFunction(
                received,
                expected.get_value(),
                expected.as_error(),
            )
            .into(),
        )
    }
}

impl Serialize for RequestDetails {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        match self {
            RequestDetails::ReadCoils(x) => x.serialize(cursor),
            RequestDetails::ReadDiscreteInputs(x) => x.serialize(cursor),
            RequestDetails::ReadHoldingRegisters(x) => x.serialize(cursor),
            RequestDetails::ReadInputRegisters(x) => x.serialize(cursor),
            RequestDetails::WriteSingleCoil(x) => x.serialize(cursor),
            RequestDetails::WriteSingleRegister(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleCoils(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleRegisters(x) => x.serialize(cursor),
        }
    }
}

impl Loggable for RequestDetails {
    fn log(
        &self,
        payload: &[u8],
        level: AppDecodeLevel,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        match self {
            RequestDetails::ReadCoils(x) => x.request.get().log(payload, level, f),
            RequestDetails::ReadDiscreteInputs(x) => x.request.get().log(payload, level, f),
            RequestDetails::ReadHoldingRegisters(x) => x.request.get().log(payload, level, f),
            RequestDetails::ReadInputRegisters(x) => x.request.get().log(payload, level, f),
            RequestDetails::WriteSingleCoil(x) => x.request.log(payload, level, f),
            RequestDetails::WriteSingleRegister(x) => x.request.log(payload, level, f),
            RequestDetails::WriteMultipleCoils(x) => x.request.log(payload, level, f),
            RequestDetails::WriteMultipleRegisters(x) => x.request.log(payload, level, f),
        }
    }
}

/// Completion slot resolved by the connection task when the matching
/// response arrives, the request times out, or the connection dies
pub(crate) struct Promise<T> {
    sender: oneshot::Sender<Result<T, RequestError>>,
}

impl<T> Promise<T> {
    pub(crate) fn new(sender: oneshot::Sender<Result<T, RequestError>>) -> Self {
        Self { sender }
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.complete(Err(err))
    }

    pub(crate) fn complete(self, result: Result<T, RequestError>) {
        self.sender.send(result).ok();
    }
}
