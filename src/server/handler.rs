use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::exception::ExceptionCode;
use crate::server::types::{WriteCoils, WriteRegisters};
use crate::types::{Indexed, UnitId};

/// Trait implemented by the application to process requests received from the client
///
/// Implementations report failures using the Modbus [`ExceptionCode`] that the
/// server should answer with. The default implementation of every method
/// returns [`ExceptionCode::IllegalFunction`].
pub trait RequestHandler: Send + 'static {
    /// Read a single coil
    fn read_coil(&self, _address: u16) -> Result<bool, ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Read a single discrete input
    fn read_discrete_input(&self, _address: u16) -> Result<bool, ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Read a single holding register
    fn read_holding_register(&self, _address: u16) -> Result<u16, ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Read a single input register
    fn read_input_register(&self, _address: u16) -> Result<u16, ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Write a single coil
    fn write_single_coil(&mut self, _value: Indexed<bool>) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Write a single register
    fn write_single_register(&mut self, _value: Indexed<u16>) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Write multiple coils
    fn write_multiple_coils(&mut self, _values: WriteCoils) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Write multiple registers
    fn write_multiple_registers(&mut self, _values: WriteRegisters) -> Result<(), ExceptionCode> {
        Err(ExceptionCode::IllegalFunction)
    }

    /// Wrap the handler in the shared type the server requires
    fn wrap(self) -> ServerHandlerType<Self>
    where
        Self: Sized,
    {
        Arc::new(Mutex::new(Box::new(self)))
    }
}

/// Shared handler type used by the server
pub type ServerHandlerType<T> = Arc<Mutex<Box<T>>>;

/// Maps unit ids to handlers so that a single server can expose multiple devices
pub struct ServerHandlerMap<T: RequestHandler> {
    handlers: BTreeMap<UnitId, ServerHandlerType<T>>,
}

// manual implementation b/c T does not need to be Clone
impl<T: RequestHandler> Clone for ServerHandlerMap<T> {
    fn clone(&self) -> Self {
        ServerHandlerMap {
            handlers: self.handlers.clone(),
        }
    }
}

impl<T: RequestHandler> Default for ServerHandlerMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RequestHandler> ServerHandlerMap<T> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Create a map with a single handler
    pub fn single(id: UnitId, handler: ServerHandlerType<T>) -> Self {
        let mut handlers: BTreeMap<UnitId, ServerHandlerType<T>> = BTreeMap::new();
        handlers.insert(id, handler);
        Self { handlers }
    }

    /// Retrieve the handler for a unit id, if one is mapped
    pub fn get(&self, id: UnitId) -> Option<&ServerHandlerType<T>> {
        self.handlers.get(&id)
    }

    /// Add a handler to the map, replacing any previous one for the same unit id
    pub fn add(&mut self, id: UnitId, handler: ServerHandlerType<T>) {
        self.handlers.insert(id, handler);
    }
}
