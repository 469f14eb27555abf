//! Fixed chirp/TX-antenna assignment for the 4-chip TDM-MIMO scheme.
//!
//! The cascade fires one transmit antenna per chirp slot, walking backwards
//! through the array: chirp 0 is driven by device 3's TX2, chirp 11 by
//! device 0's TX0. The wiring is a property of the EVM board, not of any
//! runtime configuration, so the table is compiled in.

/// Chirp slots per frame across the whole cascade.
pub const NUM_CHIRPS: usize = 12;
/// Chips in a fully populated cascade.
pub const NUM_DEVICES: usize = 4;

/// Chirp indices driven by each device, ordered TX0, TX1, TX2.
///
/// Descending order within a row means bit 0 of the TX-enable mask always
/// maps to the device's highest driven chirp index.
pub const CHIRP_TX_TABLE: [[u8; 3]; NUM_DEVICES] = [
    [11, 10, 9], // device 0 (primary)
    [8, 7, 6],   // device 1
    [5, 4, 3],   // device 2
    [2, 1, 0],   // device 3
];

/// TX-enable bitmask for one chirp slot on one device.
///
/// Exactly one bit set when the device drives this chirp's antenna (bit
/// position = rank of the chirp within the device's row), zero otherwise.
pub fn tx_enable(device_id: usize, chirp_idx: u8) -> u8 {
    CHIRP_TX_TABLE[device_id]
        .iter()
        .position(|&c| c == chirp_idx)
        .map_or(0, |tx| 1 << tx)
}
