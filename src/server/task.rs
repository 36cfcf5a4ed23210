use crate::common::cursor::ReadCursor;
use crate::common::frame::{Frame, FramedReader, FrameWriter, FunctionField};
use crate::common::function::FunctionCode;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::exception::ExceptionCode;
use crate::server::handler::{RequestHandler, ServerHandlerMap};
use crate::server::request::{parse_error_exception, Request, RequestDisplay};

/// Handles a single server connection: decodes requests, dispatches them to
/// the unit's handler, and writes replies that echo the client's transaction id
pub(crate) struct SessionTask<T: RequestHandler> {
    io: PhysLayer,
    handlers: ServerHandlerMap<T>,
    shutdown: tokio::sync::mpsc::Receiver<()>,
    reader: FramedReader,
    writer: FrameWriter,
    decode: DecodeLevel,
}

impl<T: RequestHandler> SessionTask<T> {
    pub(crate) fn new(
        io: PhysLayer,
        handlers: ServerHandlerMap<T>,
        shutdown: tokio::sync::mpsc::Receiver<()>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            io,
            handlers,
            shutdown,
            reader: FramedReader::tcp(),
            writer: FrameWriter::tcp(),
            decode,
        }
    }

    pub(crate) async fn run(&mut self) -> Result<(), RequestError> {
        loop {
            self.run_one().await?;
        }
    }

    async fn run_one(&mut self) -> Result<(), RequestError> {
        tokio::select! {
            // either from the tracker dropping the sender or an explicit message
            _ = self.shutdown.recv() => {
                Err(RequestError::Shutdown)
            }
            frame = self.reader.next_frame(&mut self.io, self.decode) => {
                let frame = frame?;
                self.handle_frame(frame).await
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), RequestError> {
        let mut cursor = ReadCursor::new(frame.payload());

        let function = match cursor.read_u8() {
            Err(_) => {
                tracing::warn!("received request without a function code");
                return Ok(());
            }
            Ok(value) => match FunctionCode::get(value) {
                Some(x) => x,
                None => {
                    tracing::warn!("received unknown function code: {:#04X}", value);
                    let reply = self.writer.format_ex(
                        frame.header,
                        FunctionField::UnknownFunction(value),
                        ExceptionCode::IllegalFunction,
                        self.decode,
                    )?;
                    return self.io.write(reply, self.decode.physical).await.map_err(Into::into);
                }
            },
        };

        // requests for unmapped unit ids are dropped without a reply
        let handler = match self.handlers.get(frame.header.unit_id) {
            None => {
                tracing::warn!(
                    "received frame for unmapped unit id: {}",
                    frame.header.unit_id
                );
                return Ok(());
            }
            Some(handler) => handler.clone(),
        };

        match Request::parse(function, &mut cursor) {
            Ok(request) => {
                if self.decode.app.enabled() {
                    tracing::info!(
                        "PDU RX - {}",
                        RequestDisplay::new(self.decode.app, &request)
                    );
                }

                // the handler lock is held for the full duration of the
                // operation, including serialization of read replies, so
                // that every request is atomic w.r.t. other connections
                let reply = {
                    let mut guard = handler.lock().unwrap();
                    request.get_reply(frame.header, &mut **guard, &mut self.writer, self.decode)?
                };
                self.io.write(reply, self.decode.physical).await?;
                Ok(())
            }
            Err(err) => {
                tracing::warn!("error parsing {}: {}", function, err);
                match parse_error_exception(err) {
                    Some(ex) => {
                        let reply = self.writer.format_ex(
                            frame.header,
                            FunctionField::Exception(function),
                            ex,
                            self.decode,
                        )?;
                        self.io.write(reply, self.decode.physical).await?;
                        Ok(())
                    }
                    // framing can no longer be trusted, close the connection
                    None => Err(err),
                }
            }
        }
    }
}
