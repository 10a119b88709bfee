//! Controller configuration

use core::num::{NonZeroU8, NonZeroU16};

/// Unsupported bit rate or kernel clock combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBaudrate;

/// Supported CAN bus bit rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Bitrate {
    /// 10 kbit/s
    _10k,
    /// 20 kbit/s
    _20k,
    /// 50 kbit/s
    _50k,
    /// 100 kbit/s
    _100k,
    /// 125 kbit/s
    _125k,
    /// 250 kbit/s
    _250k,
    /// 500 kbit/s
    _500k,
    /// 1 Mbit/s
    _1000k,
}

impl Bitrate {
    pub const fn kbps(self) -> u16 {
        match self {
            Bitrate::_10k => 10,
            Bitrate::_20k => 20,
            Bitrate::_50k => 50,
            Bitrate::_100k => 100,
            Bitrate::_125k => 125,
            Bitrate::_250k => 250,
            Bitrate::_500k => 500,
            Bitrate::_1000k => 1000,
        }
    }

    pub const fn from_kbps(kbps: u16) -> Option<Self> {
        match kbps {
            10 => Some(Bitrate::_10k),
            20 => Some(Bitrate::_20k),
            50 => Some(Bitrate::_50k),
            100 => Some(Bitrate::_100k),
            125 => Some(Bitrate::_125k),
            250 => Some(Bitrate::_250k),
            500 => Some(Bitrate::_500k),
            1000 => Some(Bitrate::_1000k),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Bitrate {
    type Error = InvalidBaudrate;

    fn try_from(kbps: u16) -> Result<Self, Self::Error> {
        Self::from_kbps(kbps).ok_or(InvalidBaudrate)
    }
}

const SEG1: u8 = 13;
const SEG2: u8 = 2;
const SYNC_JUMP_WIDTH: u8 = 1;
// Sync segment takes one quantum
const QUANTA_PER_BIT: u32 = 1 + SEG1 as u32 + SEG2 as u32;
const PRESCALER_MAX: u32 = 1024;

/// Nominal bit timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Prescaler for the kernel clock. The bit time is built from multiples of this quantum.
    /// Valid range: 1 to 1024.
    pub prescaler: NonZeroU16,
    /// Time segment 1 (includes propagation and phase segments).
    /// Valid range: 1 to 16.
    pub seg1: NonZeroU8,
    /// Time segment 2 (phase segment 2).
    /// Valid range: 1 to 8.
    pub seg2: NonZeroU8,
    /// Synchronization jump width for clock tolerance.
    /// Valid range: 1 to 4.
    pub sync_jump_width: NonZeroU8,
}

impl BitTiming {
    /// Derives timing for a 16-quantum bit with the sample point at 87.5 %.
    ///
    /// Fails if the kernel clock is not an exact multiple of the quantum frequency.
    pub fn new(bitrate: Bitrate, kernel_clock_hz: u32) -> Result<Self, InvalidBaudrate> {
        let quantum_hz = u32::from(bitrate.kbps()) * 1000 * QUANTA_PER_BIT;
        if kernel_clock_hz % quantum_hz != 0 {
            debug!(
                "Kernel clock {} Hz is not a multiple of the {} kbit/s quantum",
                kernel_clock_hz,
                bitrate.kbps()
            );
            return Err(InvalidBaudrate);
        }
        let prescaler = kernel_clock_hz / quantum_hz;
        if prescaler > PRESCALER_MAX {
            debug!("Prescaler {} exceeds the controller range", prescaler);
            return Err(InvalidBaudrate);
        }
        let prescaler = u16::try_from(prescaler).map_err(|_| InvalidBaudrate)?;

        Ok(Self {
            prescaler: NonZeroU16::new(prescaler).ok_or(InvalidBaudrate)?,
            seg1: unwrap!(NonZeroU8::new(SEG1)),
            seg2: unwrap!(NonZeroU8::new(SEG2)),
            sync_jump_width: unwrap!(NonZeroU8::new(SYNC_JUMP_WIDTH)),
        })
    }

    pub fn quanta_per_bit(&self) -> u32 {
        1 + u32::from(self.seg1.get()) + u32::from(self.seg2.get())
    }
}

/// Controller config struct
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Bus bit rate in kbit/s. Must be one of the `Bitrate` values.
    pub bitrate_kbps: u16,
    /// Controller kernel clock frequency.
    pub kernel_clock_hz: u32,
    /// Retransmit frames that lost arbitration or were disturbed by errors.
    pub auto_retransmission: bool,
    /// Leave bus-off automatically. Recovery is normally left to the link layer.
    pub auto_bus_off: bool,
    /// Wake up on bus activity.
    pub auto_wake_up: bool,
    /// Discard new frames instead of overwriting the last one when a receive FIFO is full.
    pub receive_fifo_locked: bool,
    /// Transmit mailboxes in request order rather than by identifier.
    pub transmit_fifo_priority: bool,
    /// Time-triggered communication mode.
    pub time_triggered: bool,
}

impl Config {
    pub fn bitrate(&self) -> Result<Bitrate, InvalidBaudrate> {
        Bitrate::try_from(self.bitrate_kbps)
    }

    pub fn bit_timing(&self) -> Result<BitTiming, InvalidBaudrate> {
        BitTiming::new(self.bitrate()?, self.kernel_clock_hz)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bitrate_kbps: 500,
            kernel_clock_hz: 80_000_000,
            auto_retransmission: true,
            auto_bus_off: false,
            auto_wake_up: false,
            receive_fifo_locked: false,
            transmit_fifo_priority: false,
            time_triggered: false,
        }
    }
}
