//! Classic CAN frame objects

use emcanopen_core::{PackedId, StdId};

/// Classic CAN data length (0 to 8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataLength(u8);

impl DataLength {
    pub const MAX: usize = 8;
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(Self::MAX as u8);

    pub const fn new(value: usize) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    /// Creates a length from a data length code. Classic DLC values 9..=15 mean 8 bytes.
    pub const fn from_dlc(dlc: u8) -> Self {
        if dlc as usize > Self::MAX {
            Self::FULL
        } else {
            Self(dlc)
        }
    }

    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }

    pub const fn dlc(&self) -> u8 {
        self.0
    }
}

impl From<DataLength> for usize {
    fn from(value: DataLength) -> Self {
        value.as_usize()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidLength;

/// Classic CAN data vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    length: DataLength,
    bytes: [u8; DataLength::MAX],
}

impl Data {
    pub const EMPTY: Self = Self {
        length: DataLength::ZERO,
        bytes: [0; DataLength::MAX],
    };

    /// Creates a new vector from a slice of at most 8 bytes.
    pub fn new(data: &[u8]) -> Result<Self, InvalidLength> {
        let length = DataLength::new(data.len()).ok_or(InvalidLength)?;
        let mut bytes = [0; DataLength::MAX];
        bytes[..data.len()].copy_from_slice(data);

        Ok(Self { length, bytes })
    }

    pub fn new_zeros(length: DataLength) -> Self {
        Self {
            length,
            bytes: [0; DataLength::MAX],
        }
    }

    /// Creates a vector from the raw 8-byte hardware buffer.
    pub fn from_raw(length: DataLength, bytes: [u8; DataLength::MAX]) -> Self {
        Self { length, bytes }
    }

    pub fn length(&self) -> DataLength {
        self.length
    }

    /// Full 8-byte buffer, including bytes past the length.
    pub fn raw(&self) -> &[u8; DataLength::MAX] {
        &self.bytes
    }
}

impl core::ops::Deref for Data {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..usize::from(self.length)]
    }
}

impl core::ops::DerefMut for Data {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes[..usize::from(self.length)]
    }
}

/// Received standard-identifier frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub id: StdId,
    pub rtr: bool,
    pub data: Data,
}

impl Frame {
    pub fn new(id: StdId, data: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            id,
            rtr: false,
            data: Data::new(data)?,
        })
    }

    pub fn new_remote(id: StdId, length: DataLength) -> Self {
        Self {
            id,
            rtr: true,
            data: Data::new_zeros(length),
        }
    }

    pub fn id(&self) -> StdId {
        self.id
    }

    pub fn packed_id(&self) -> PackedId {
        PackedId::new(self.id, self.rtr)
    }
}

/// Header of a transmit request handed to a hardware mailbox
///
/// Built per hand-off from the transmit slot and never kept past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxHeader {
    pub id: StdId,
    pub rtr: bool,
    pub length: DataLength,
}

impl TxHeader {
    pub fn new(packed: PackedId, length: DataLength) -> Self {
        Self {
            id: packed.id(),
            rtr: packed.rtr(),
            length,
        }
    }
}
