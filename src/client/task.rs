use std::collections::BTreeMap;

use tokio::time::Instant;

use crate::client::message::{Request, RequestDetails};
use crate::common::frame::{FrameHeader, FramedReader, FrameWriter, TxId};
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::RequestError;

/// We process requests on a connection until one of the following occurs
#[derive(Debug, PartialEq)]
pub(crate) enum SessionError {
    /// the stream errors
    IoError(std::io::ErrorKind),
    /// unrecoverable framing issue
    BadFrame,
    /// the mpsc is closed (dropped) on the sender side
    Shutdown,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionError::IoError(err) => {
                write!(f, "I/O error: {err}")
            }
            SessionError::BadFrame => {
                write!(f, "parser encountered a bad frame")
            }
            SessionError::Shutdown => {
                write!(f, "shutdown was requested")
            }
        }
    }
}

impl SessionError {
    fn from_request_err(err: RequestError) -> Option<Self> {
        match err {
            RequestError::Io(x) => Some(SessionError::IoError(x)),
            RequestError::BadFrame(_) => Some(SessionError::BadFrame),
            // all other errors don't kill the loop
            _ => None,
        }
    }

    fn terminal_request_err(&self) -> RequestError {
        match self {
            SessionError::IoError(_) => RequestError::NoConnection,
            SessionError::BadFrame => RequestError::NoConnection,
            SessionError::Shutdown => RequestError::Shutdown,
        }
    }
}

struct Transaction {
    details: RequestDetails,
    deadline: Instant,
}

/// Table of requests that have been written to the socket and are awaiting
/// a response. Entries are removed when the matching transaction id arrives,
/// when the deadline expires, or when the connection dies.
pub(crate) struct TransactionTable {
    pending: BTreeMap<u16, Transaction>,
}

impl TransactionTable {
    fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }

    fn is_pending(&self, tx_id: TxId) -> bool {
        self.pending.contains_key(&tx_id.to_u16())
    }

    fn insert(&mut self, tx_id: TxId, deadline: Instant, details: RequestDetails) {
        // callers allocate ids from next_tx_id, so a collision cannot occur
        self.pending.insert(
            tx_id.to_u16(),
            Transaction { details, deadline },
        );
    }

    fn remove(&mut self, tx_id: TxId) -> Option<RequestDetails> {
        self.pending.remove(&tx_id.to_u16()).map(|x| x.details)
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|x| x.deadline).min()
    }

    fn fail_expired(&mut self, now: Instant) {
        let expired: Vec<u16> = self
            .pending
            .iter()
            .filter(|(_, x)| x.deadline <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(tx) = self.pending.remove(&id) {
                tracing::warn!("request with tx id {:#06X} timed out", id);
                tx.details.fail(RequestError::ResponseTimeout);
            }
        }
    }

    fn fail_all(&mut self, err: RequestError) {
        let pending = std::mem::take(&mut self.pending);
        for (_, tx) in pending {
            tx.details.fail(err);
        }
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}

pub(crate) struct ClientLoop {
    rx: tokio::sync::mpsc::Receiver<Request>,
    writer: FrameWriter,
    reader: FramedReader,
    tx_id: TxId,
    pending: TransactionTable,
    decode: DecodeLevel,
}

impl ClientLoop {
    pub(crate) fn new(rx: tokio::sync::mpsc::Receiver<Request>, decode: DecodeLevel) -> Self {
        Self {
            rx,
            writer: FrameWriter::tcp(),
            reader: FramedReader::tcp(),
            tx_id: TxId::default(),
            pending: TransactionTable::new(),
            decode,
        }
    }

    pub(crate) async fn run(&mut self, io: &mut PhysLayer) -> SessionError {
        let err = loop {
            if let Err(err) = self.poll(io).await {
                tracing::warn!("ending session: {}", err);
                break err;
            }
        };

        // cancel every request that is still awaiting a response
        self.pending.fail_all(err.terminal_request_err());
        err
    }

    async fn poll(&mut self, io: &mut PhysLayer) -> Result<(), SessionError> {
        let deadline = self.pending.next_deadline();

        tokio::select! {
            res = self.rx.recv() => {
                match res {
                    Some(request) => self.start_request(io, request).await,
                    None => Err(SessionError::Shutdown),
                }
            }
            frame = self.reader.next_frame(io, self.decode) => {
                match frame {
                    Ok(frame) => {
                        self.handle_response(frame.header, frame.payload());
                        Ok(())
                    }
                    Err(err) => match SessionError::from_request_err(err) {
                        Some(err) => Err(err),
                        None => Ok(()),
                    }
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.pending.fail_expired(Instant::now());
                Ok(())
            }
        }
    }

    /// Assign a transaction id, write the request to the socket, and park it
    /// in the transaction table. The caller is not blocked while awaiting the
    /// response, so any number of requests may be in flight concurrently.
    async fn start_request(
        &mut self,
        io: &mut PhysLayer,
        request: Request,
    ) -> Result<(), SessionError> {
        let tx_id = match self.next_tx_id() {
            Some(tx_id) => tx_id,
            None => {
                request.details.fail(RequestError::NoFreeTransactionIds);
                return Ok(());
            }
        };

        let bytes = match self.writer.format_request(
            FrameHeader::new(request.id, tx_id),
            request.details.function(),
            &request.details,
            self.decode,
        ) {
            Ok(bytes) => bytes,
            Err(err) => {
                // serialization failures only fail this request
                request.details.fail(err);
                return Ok(());
            }
        };

        if let Err(err) = io.write(bytes, self.decode.physical).await {
            request.details.fail(RequestError::Io(err.kind()));
            return Err(SessionError::IoError(err.kind()));
        }

        let deadline = Instant::now() + request.timeout;
        self.pending.insert(tx_id, deadline, request.details);
        Ok(())
    }

    /// Advance the counter until an id that is not in flight is found, so a
    /// long-lived request can never be aliased by a newer one
    fn next_tx_id(&mut self) -> Option<TxId> {
        for _ in 0..=u16::MAX as u32 {
            let candidate = self.tx_id.next();
            if !self.pending.is_pending(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Responses are matched strictly by transaction id, not arrival order.
    /// A frame with no matching entry, including a late answer for an id
    /// that already timed out, is dropped with a warning.
    fn handle_response(&mut self, header: FrameHeader, payload: &[u8]) {
        match self.pending.remove(header.tx_id) {
            None => {
                tracing::warn!(
                    "received response with unmatched transaction id: {}",
                    header.tx_id
                );
            }
            Some(details) => {
                if let Err(err) = details.handle_response(payload, self.decode.app) {
                    tracing::warn!("response error: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};
    use tokio_test::io::Builder;

    use super::*;
    use crate::client::message::Promise;
    use crate::client::requests::read_registers::ReadRegisters;
    use crate::common::function::FunctionCode;
    use crate::exception::ExceptionCode;
    use crate::server::response::RegisterWriter;
    use crate::types::{AddressRange, Indexed, UnitId};

    fn spawn_client_loop_with_io(
        mock: tokio_test::io::Mock,
    ) -> (
        mpsc::Sender<Request>,
        tokio::task::JoinHandle<SessionError>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let mut client_loop = ClientLoop::new(rx, DecodeLevel::nothing());
        let join_handle = tokio::spawn(async move {
            let mut phys = PhysLayer::new_mock(mock);
            client_loop.run(&mut phys).await
        });
        (tx, join_handle)
    }

    fn read_registers_request(
        range: AddressRange,
    ) -> (Request, oneshot::Receiver<Result<Vec<Indexed<u16>>, RequestError>>) {
        let (tx, rx) = oneshot::channel();
        let request = Request::new(
            UnitId::new(1),
            Duration::from_secs(1),
            RequestDetails::ReadHoldingRegisters(ReadRegisters::new(
                range.of_read_registers().unwrap(),
                Promise::new(tx),
            )),
        );
        (request, rx)
    }

    fn framed_read_registers_request(tx_id: u16, range: AddressRange) -> Vec<u8> {
        let mut writer = FrameWriter::tcp();
        let bytes = writer
            .format_request(
                FrameHeader::new(UnitId::new(1), TxId::new(tx_id)),
                FunctionCode::ReadHoldingRegisters,
                &range,
                DecodeLevel::nothing(),
            )
            .unwrap();
        bytes.to_vec()
    }

    fn framed_read_registers_response(tx_id: u16, range: AddressRange, values: &[u16]) -> Vec<u8> {
        let mut writer = FrameWriter::tcp();
        let registers = RegisterWriter::new(range.of_read_registers().unwrap(), |address| {
            values
                .get((address - range.start) as usize)
                .copied()
                .ok_or(ExceptionCode::IllegalDataAddress)
        });
        let bytes = writer
            .format_reply(
                FrameHeader::new(UnitId::new(1), TxId::new(tx_id)),
                FunctionCode::ReadHoldingRegisters,
                &registers,
                DecodeLevel::nothing(),
            )
            .unwrap();
        bytes.to_vec()
    }

    #[tokio::test]
    async fn task_completes_with_shutdown_error_when_all_senders_dropped() {
        // the long wait keeps the mock from reporting EOF while idle
        let mock = Builder::new().wait(Duration::from_secs(600)).build();
        let (tx, task) = spawn_client_loop_with_io(mock);
        drop(tx);
        assert_eq!(task.await.unwrap(), SessionError::Shutdown);
    }

    #[tokio::test]
    async fn returns_io_error_when_write_fails() {
        let error_kind = ErrorKind::ConnectionReset;
        let mock = Builder::new()
            .write_error(std::io::Error::from(error_kind))
            .build();
        let (tx, task) = spawn_client_loop_with_io(mock);

        let (request, rx) = read_registers_request(AddressRange::try_from(0, 2).unwrap());
        tx.send(request).await.unwrap();

        assert_eq!(rx.await.unwrap(), Err(RequestError::Io(error_kind)));
        assert_eq!(task.await.unwrap(), SessionError::IoError(error_kind));
    }

    #[tokio::test]
    async fn framing_errors_kill_the_session_while_idle() {
        let mock = Builder::new()
            .read(&[0x00, 0x00, 0xCA, 0xFE, 0x00, 0x01, 0x01]) // non-Modbus protocol id
            .build();
        let (_tx, task) = spawn_client_loop_with_io(mock);

        assert_eq!(task.await.unwrap(), SessionError::BadFrame);
    }

    #[tokio::test]
    async fn out_of_order_responses_are_matched_by_transaction_id() {
        let range_a = AddressRange::try_from(0, 2).unwrap();
        let range_b = AddressRange::try_from(7, 1).unwrap();

        // responses arrive in the reverse order of the requests
        let mock = Builder::new()
            .write(&framed_read_registers_request(0, range_a))
            .write(&framed_read_registers_request(1, range_b))
            .read(&framed_read_registers_response(1, range_b, &[0x0B0B]))
            .read(&framed_read_registers_response(0, range_a, &[0x0A0A, 0x0A0B]))
            .build();
        let (tx, _task) = spawn_client_loop_with_io(mock);

        let (request_a, rx_a) = read_registers_request(range_a);
        let (request_b, rx_b) = read_registers_request(range_b);
        tx.send(request_a).await.unwrap();
        tx.send(request_b).await.unwrap();

        assert_eq!(rx_b.await.unwrap().unwrap(), vec![Indexed::new(7, 0x0B0B)]);
        assert_eq!(
            rx_a.await.unwrap().unwrap(),
            vec![Indexed::new(0, 0x0A0A), Indexed::new(1, 0x0A0B)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_timeout_is_dropped_and_session_survives() {
        let range = AddressRange::try_from(0, 1).unwrap();

        let mock = Builder::new()
            .write(&framed_read_registers_request(0, range))
            // the answer for tx id 0 arrives long after the 1s request timeout
            .wait(Duration::from_secs(5))
            .read(&framed_read_registers_response(0, range, &[0xAAAA]))
            .write(&framed_read_registers_request(1, range))
            .read(&framed_read_registers_response(1, range, &[0xBBBB]))
            .build();
        let (tx, _task) = spawn_client_loop_with_io(mock);

        let (request, rx) = read_registers_request(range);
        tx.send(request).await.unwrap();
        assert_eq!(rx.await.unwrap(), Err(RequestError::ResponseTimeout));

        // allow the late frame for tx id 0 to arrive and be discarded
        tokio::time::sleep(Duration::from_secs(10)).await;

        // the connection still processes new requests afterwards
        let (request, rx) = read_registers_request(range);
        tx.send(request).await.unwrap();
        assert_eq!(rx.await.unwrap().unwrap(), vec![Indexed::new(0, 0xBBBB)]);
    }

    #[tokio::test]
    async fn exception_response_completes_request_with_protocol_fault() {
        let range = AddressRange::try_from(0, 1).unwrap();

        let mut writer = FrameWriter::tcp();
        let exception = writer
            .format_ex(
                FrameHeader::new(UnitId::new(1), TxId::new(0)),
                crate::common::frame::FunctionField::Exception(
                    FunctionCode::ReadHoldingRegisters,
                ),
                ExceptionCode::IllegalDataAddress,
                DecodeLevel::nothing(),
            )
            .unwrap()
            .to_vec();

        let mock = Builder::new()
            .write(&framed_read_registers_request(0, range))
            .read(&exception)
            .build();
        let (tx, _task) = spawn_client_loop_with_io(mock);

        let (request, rx) = read_registers_request(range);
        tx.send(request).await.unwrap();

        assert_eq!(
            rx.await.unwrap(),
            Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
        );
    }

    #[test]
    fn transaction_table_reports_earliest_deadline() {
        let mut table = TransactionTable::new();
        assert_eq!(table.next_deadline(), None);

        let now = Instant::now();
        let (tx, _rx) = oneshot::channel();
        table.insert(
            TxId::new(0),
            now + Duration::from_secs(3),
            RequestDetails::ReadHoldingRegisters(ReadRegisters::new(
                AddressRange::try_from(0, 1).unwrap().of_read_registers().unwrap(),
                Promise::new(tx),
            )),
        );
        let (tx, _rx) = oneshot::channel();
        table.insert(
            TxId::new(1),
            now + Duration::from_secs(1),
            RequestDetails::ReadHoldingRegisters(ReadRegisters::new(
                AddressRange::try_from(0, 1).unwrap().of_read_registers().unwrap(),
                Promise::new(tx),
            )),
        );

        assert_eq!(table.next_deadline(), Some(now + Duration::from_secs(1)));
        assert_eq!(table.len(), 2);

        table.fail_expired(now + Duration::from_secs(2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.next_deadline(), Some(now + Duration::from_secs(3)));
    }
}
