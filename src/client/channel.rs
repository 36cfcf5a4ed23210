use tokio::sync::{mpsc, oneshot};

use crate::client::message::{Promise, Request, RequestDetails};
use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::MultipleWrite;
use crate::client::requests::write_single::SingleWrite;
use crate::client::RequestParam;
use crate::error::RequestError;
use crate::types::{AddressRange, Indexed, WriteMultiple};

/// Handle used to make requests on an underlying connection task
///
/// The handle is cheap to `Clone`, and all clones share the same connection.
/// Any number of requests may be started concurrently; the connection task
/// matches responses to callers by transaction id, so pipelined requests
/// complete correctly even when the server answers out of order.
#[derive(Clone)]
pub struct Channel {
    pub(crate) tx: mpsc::Sender<Request>,
}

impl Channel {
    pub(crate) fn new(tx: mpsc::Sender<Request>) -> Self {
        Self { tx }
    }

    /// Read coils from the server
    pub async fn read_coils(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details = RequestDetails::ReadCoils(ReadBits::new(
            range.of_read_bits()?,
            Promise::new(promise),
        ));
        self.request(param, details, reply).await
    }

    /// Read discrete inputs from the server
    pub async fn read_discrete_inputs(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details = RequestDetails::ReadDiscreteInputs(ReadBits::new(
            range.of_read_bits()?,
            Promise::new(promise),
        ));
        self.request(param, details, reply).await
    }

    /// Read holding registers from the server
    pub async fn read_holding_registers(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details = RequestDetails::ReadHoldingRegisters(ReadRegisters::new(
            range.of_read_registers()?,
            Promise::new(promise),
        ));
        self.request(param, details, reply).await
    }

    /// Read input registers from the server
    pub async fn read_input_registers(
        &mut self,
        param: RequestParam,
        range: AddressRange,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details = RequestDetails::ReadInputRegisters(ReadRegisters::new(
            range.of_read_registers()?,
            Promise::new(promise),
        ));
        self.request(param, details, reply).await
    }

    /// Write a single coil, returning the echoed value on success
    pub async fn write_single_coil(
        &mut self,
        param: RequestParam,
        value: Indexed<bool>,
    ) -> Result<Indexed<bool>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details =
            RequestDetails::WriteSingleCoil(SingleWrite::new(value, Promise::new(promise)));
        self.request(param, details, reply).await
    }

    /// Write a single holding register, returning the echoed value on success
    pub async fn write_single_register(
        &mut self,
        param: RequestParam,
        value: Indexed<u16>,
    ) -> Result<Indexed<u16>, RequestError> {
        let (promise, reply) = oneshot::channel();
        let details =
            RequestDetails::WriteSingleRegister(SingleWrite::new(value, Promise::new(promise)));
        self.request(param, details, reply).await
    }

    /// Write multiple coils as one atomic request, returning the echoed range
    pub async fn write_multiple_coils(
        &mut self,
        param: RequestParam,
        request: WriteMultiple<bool>,
    ) -> Result<AddressRange, RequestError> {
        request
            .range
            .limited_count(crate::constants::limits::MAX_WRITE_COILS_COUNT)?;
        let (promise, reply) = oneshot::channel();
        let details =
            RequestDetails::WriteMultipleCoils(MultipleWrite::new(request, Promise::new(promise)));
        self.request(param, details, reply).await
    }

    /// Write multiple holding registers as one atomic request, returning the
    /// echoed range
    pub async fn write_multiple_registers(
        &mut self,
        param: RequestParam,
        request: WriteMultiple<u16>,
    ) -> Result<AddressRange, RequestError> {
        request
            .range
            .limited_count(crate::constants::limits::MAX_WRITE_REGISTERS_COUNT)?;
        let (promise, reply) = oneshot::channel();
        let details = RequestDetails::WriteMultipleRegisters(MultipleWrite::new(
            request,
            Promise::new(promise),
        ));
        self.request(param, details, reply).await
    }

    /// Read a 32-bit value stored in two adjacent holding registers, where
    /// the register at `start` holds the high word and `start + 1` the low word
    pub async fn read_u32(&mut self, param: RequestParam, start: u16) -> Result<u32, RequestError> {
        let range = AddressRange::try_from(start, 2)?;
        let registers = self.read_holding_registers(param, range).await?;
        match registers.as_slice() {
            [high, low] => Ok(((high.value as u32) << 16) | low.value as u32),
            _ => Err(crate::error::AduParseError::InsufficientBytes.into()),
        }
    }

    /// Write a 32-bit value into two adjacent holding registers as a single
    /// atomic request, high word first
    pub async fn write_u32(
        &mut self,
        param: RequestParam,
        start: u16,
        value: u32,
    ) -> Result<AddressRange, RequestError> {
        let values = vec![(value >> 16) as u16, value as u16];
        self.write_multiple_registers(param, WriteMultiple::from(start, values)?)
            .await
    }

    async fn request<T>(
        &mut self,
        param: RequestParam,
        details: RequestDetails,
        reply: oneshot::Receiver<Result<T, RequestError>>,
    ) -> Result<T, RequestError> {
        let request = Request::new(param.id, param.response_timeout, details);
        self.tx
            .send(request)
            .await
            .map_err(|_| RequestError::NoConnection)?;
        reply.await.map_err(|_| RequestError::Shutdown)?
    }
}
