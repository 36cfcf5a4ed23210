//! In-memory register store that can be dropped directly into a
//! [`ServerHandlerMap`](crate::server::ServerHandlerMap).
//!
//! The store owns four independent address spaces (coils, discrete inputs,
//! holding registers, input registers), sized at construction. Multi-cell
//! writes are all-or-nothing: the entire range is validated before any cell
//! is mutated, so a concurrent reader sees either all old or all new values.

use crate::exception::ExceptionCode;
use crate::server::{RequestHandler, WriteCoils, WriteRegisters};
use crate::types::{AddressRange, Indexed};

/// The two single-bit cell kinds of the Modbus data model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitKind {
    /// read-write over the wire
    Coil,
    /// read-only over the wire
    DiscreteInput,
}

/// The two 16-bit cell kinds of the Modbus data model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterKind {
    /// read-write over the wire
    Holding,
    /// read-only over the wire
    Input,
}

/// Number of addressable cells in each address space of a [`RegisterStore`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterMap {
    /// number of coils, addressed from zero
    pub coils: u16,
    /// number of discrete inputs, addressed from zero
    pub discrete_inputs: u16,
    /// number of holding registers, addressed from zero
    pub holding_registers: u16,
    /// number of input registers, addressed from zero
    pub input_registers: u16,
}

impl RegisterMap {
    /// a map with the same number of cells in every address space
    pub fn uniform(count: u16) -> Self {
        Self {
            coils: count,
            discrete_inputs: count,
            holding_registers: count,
            input_registers: count,
        }
    }
}

/// A copy of the entire contents of a [`RegisterStore`]
///
/// This is the seam for persistence and for seeding initial contents,
/// including the kinds that are read-only over the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSnapshot {
    /// coil values
    pub coils: Vec<bool>,
    /// discrete input values
    pub discrete_inputs: Vec<bool>,
    /// holding register values
    pub holding_registers: Vec<u16>,
    /// input register values
    pub input_registers: Vec<u16>,
}

/// In-memory implementation of the Modbus data model
pub struct RegisterStore {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<u16>,
    input_registers: Vec<u16>,
}

impl RegisterStore {
    /// Create a store with every cell initialized to zero/off
    pub fn new(map: RegisterMap) -> Self {
        Self {
            coils: vec![false; map.coils as usize],
            discrete_inputs: vec![false; map.discrete_inputs as usize],
            holding_registers: vec![0; map.holding_registers as usize],
            input_registers: vec![0; map.input_registers as usize],
        }
    }

    /// Read a contiguous range of single-bit cells
    pub fn read_bits(
        &self,
        kind: BitKind,
        range: AddressRange,
    ) -> Result<Vec<bool>, ExceptionCode> {
        let cells = match kind {
            BitKind::Coil => &self.coils,
            BitKind::DiscreteInput => &self.discrete_inputs,
        };
        match cells.get(range.to_std_range()) {
            Some(values) => Ok(values.to_vec()),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    /// Read a contiguous range of 16-bit cells
    pub fn read_registers(
        &self,
        kind: RegisterKind,
        range: AddressRange,
    ) -> Result<Vec<u16>, ExceptionCode> {
        let cells = match kind {
            RegisterKind::Holding => &self.holding_registers,
            RegisterKind::Input => &self.input_registers,
        };
        match cells.get(range.to_std_range()) {
            Some(values) => Ok(values.to_vec()),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    /// Write a contiguous range of single-bit cells, all-or-nothing
    ///
    /// Discrete inputs are read-only and reject every write.
    pub fn write_bits(
        &mut self,
        kind: BitKind,
        start: u16,
        values: &[bool],
    ) -> Result<(), ExceptionCode> {
        let cells = match kind {
            BitKind::Coil => &mut self.coils,
            BitKind::DiscreteInput => return Err(ExceptionCode::IllegalFunction),
        };
        let range = Self::validate(
            start,
            values.len(),
            crate::constants::limits::MAX_WRITE_COILS_COUNT,
        )?;
        match cells.get_mut(range) {
            Some(cells) => {
                cells.copy_from_slice(values);
                Ok(())
            }
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    /// Write a contiguous range of 16-bit cells, all-or-nothing
    ///
    /// Input registers are read-only and reject every write.
    pub fn write_registers(
        &mut self,
        kind: RegisterKind,
        start: u16,
        values: &[u16],
    ) -> Result<(), ExceptionCode> {
        let cells = match kind {
            RegisterKind::Holding => &mut self.holding_registers,
            RegisterKind::Input => return Err(ExceptionCode::IllegalFunction),
        };
        let range = Self::validate(
            start,
            values.len(),
            crate::constants::limits::MAX_WRITE_REGISTERS_COUNT,
        )?;
        match cells.get_mut(range) {
            Some(cells) => {
                cells.copy_from_slice(values);
                Ok(())
            }
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    /// Copy the entire contents of the store
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            coils: self.coils.clone(),
            discrete_inputs: self.discrete_inputs.clone(),
            holding_registers: self.holding_registers.clone(),
            input_registers: self.input_registers.clone(),
        }
    }

    /// Replace the entire contents of the store, adopting the snapshot's sizes
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.coils = snapshot.coils;
        self.discrete_inputs = snapshot.discrete_inputs;
        self.holding_registers = snapshot.holding_registers;
        self.input_registers = snapshot.input_registers;
    }

    // bounds and count checks shared by the write paths. Single writes pass
    // through here as well with a count of one.
    fn validate(
        start: u16,
        count: usize,
        max: u16,
    ) -> Result<std::ops::Range<usize>, ExceptionCode> {
        if count == 0 || count > max as usize {
            return Err(ExceptionCode::IllegalDataValue);
        }
        let end = match (start as usize).checked_add(count) {
            Some(end) if end <= u16::MAX as usize + 1 => end,
            _ => return Err(ExceptionCode::IllegalDataAddress),
        };
        Ok(start as usize..end)
    }
}

impl RequestHandler for RegisterStore {
    fn read_coil(&self, address: u16) -> Result<bool, ExceptionCode> {
        match self.coils.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn read_discrete_input(&self, address: u16) -> Result<bool, ExceptionCode> {
        match self.discrete_inputs.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn read_holding_register(&self, address: u16) -> Result<u16, ExceptionCode> {
        match self.holding_registers.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn read_input_register(&self, address: u16) -> Result<u16, ExceptionCode> {
        match self.input_registers.get(address as usize) {
            Some(x) => Ok(*x),
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    fn write_single_coil(&mut self, value: Indexed<bool>) -> Result<(), ExceptionCode> {
        self.write_bits(BitKind::Coil, value.index, &[value.value])
    }

    fn write_single_register(&mut self, value: Indexed<u16>) -> Result<(), ExceptionCode> {
        self.write_registers(RegisterKind::Holding, value.index, &[value.value])
    }

    fn write_multiple_coils(&mut self, values: WriteCoils) -> Result<(), ExceptionCode> {
        let bits: Vec<bool> = values.iterator.map(|x| x.value).collect();
        self.write_bits(BitKind::Coil, values.range.start, &bits)
    }

    fn write_multiple_registers(&mut self, values: WriteRegisters) -> Result<(), ExceptionCode> {
        let registers: Vec<u16> = values.iterator.map(|x| x.value).collect();
        self.write_registers(RegisterKind::Holding, values.range.start, &registers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u16, count: u16) -> AddressRange {
        AddressRange::try_from(start, count).unwrap()
    }

    #[test]
    fn written_values_are_read_back() {
        let mut store = RegisterStore::new(RegisterMap::uniform(16));

        store
            .write_registers(RegisterKind::Holding, 3, &[0x0102, 0x0304])
            .unwrap();
        assert_eq!(
            store.read_registers(RegisterKind::Holding, range(3, 2)).unwrap(),
            vec![0x0102, 0x0304]
        );

        store
            .write_bits(BitKind::Coil, 0, &[true, false, true])
            .unwrap();
        assert_eq!(
            store.read_bits(BitKind::Coil, range(0, 3)).unwrap(),
            vec![true, false, true]
        );
    }

    #[test]
    fn out_of_bounds_access_yields_illegal_data_address() {
        let mut store = RegisterStore::new(RegisterMap::uniform(8));

        assert_eq!(
            store.read_registers(RegisterKind::Holding, range(7, 2)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            store.write_registers(RegisterKind::Holding, 8, &[0xFFFF]),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            store.read_bits(BitKind::DiscreteInput, range(0, 9)),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn write_to_read_only_kind_yields_illegal_function() {
        let mut store = RegisterStore::new(RegisterMap::uniform(8));

        assert_eq!(
            store.write_registers(RegisterKind::Input, 0, &[0x0001]),
            Err(ExceptionCode::IllegalFunction)
        );
        assert_eq!(
            store.write_bits(BitKind::DiscreteInput, 0, &[true]),
            Err(ExceptionCode::IllegalFunction)
        );
    }

    #[test]
    fn invalid_count_yields_illegal_data_value() {
        let mut store = RegisterStore::new(RegisterMap::uniform(8));

        assert_eq!(
            store.write_registers(RegisterKind::Holding, 0, &[]),
            Err(ExceptionCode::IllegalDataValue)
        );
        let too_many = vec![0u16; 0x007C];
        assert_eq!(
            store.write_registers(RegisterKind::Holding, 0, &too_many),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn rejected_multi_write_leaves_every_cell_unchanged() {
        let mut store = RegisterStore::new(RegisterMap::uniform(4));
        store
            .write_registers(RegisterKind::Holding, 0, &[0x0001, 0x0002, 0x0003, 0x0004])
            .unwrap();

        // the last address of the write is out of bounds
        assert_eq!(
            store.write_registers(RegisterKind::Holding, 2, &[0xAAAA, 0xBBBB, 0xCCCC]),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            store.read_registers(RegisterKind::Holding, range(0, 4)).unwrap(),
            vec![0x0001, 0x0002, 0x0003, 0x0004]
        );
    }

    #[test]
    fn snapshot_then_restore_round_trips() {
        let mut store = RegisterStore::new(RegisterMap::uniform(4));
        store
            .write_registers(RegisterKind::Holding, 0, &[0xCAFE])
            .unwrap();

        let mut snapshot = store.snapshot();
        snapshot.input_registers[1] = 0xBEEF;
        snapshot.discrete_inputs[2] = true;

        let mut restored = RegisterStore::new(RegisterMap::uniform(4));
        restored.restore(snapshot);

        assert_eq!(
            restored.read_registers(RegisterKind::Holding, range(0, 1)).unwrap(),
            vec![0xCAFE]
        );
        assert_eq!(
            restored.read_registers(RegisterKind::Input, range(1, 1)).unwrap(),
            vec![0xBEEF]
        );
        assert_eq!(
            restored.read_bits(BitKind::DiscreteInput, range(2, 1)).unwrap(),
            vec![true]
        );
    }

    #[test]
    fn handler_multi_register_write_is_all_or_nothing() {
        use crate::common::cursor::ReadCursor;
        use crate::types::RegisterIterator;

        let mut store = RegisterStore::new(RegisterMap::uniform(4));

        // registers 3 and 4, but the store only has addresses 0..4
        let bytes = [0xAA, 0xAA, 0xBB, 0xBB];
        let mut cursor = ReadCursor::new(&bytes);
        let write_range = AddressRange::try_from(3, 2).unwrap();
        let iterator = RegisterIterator::parse_all(write_range, &mut cursor).unwrap();

        assert_eq!(
            store.write_multiple_registers(WriteRegisters::new(write_range, iterator)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            store.read_registers(RegisterKind::Holding, range(3, 1)).unwrap(),
            vec![0x0000]
        );
    }
}
