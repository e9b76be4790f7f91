//! Vendor driver contract
//!
//! The vendor library is a process-wide resource that addresses chips by
//! instance number. Delays are expressed in cycles and limited to 16 bits per
//! call.

/// First driver version with `reset2` and `lock`/`unlock`
pub const HSID_VERSION_204: u16 = 0x0204;

/// Byte-oriented access to physical SID chips
pub trait HardwareDriver: Send {
    /// Number of installed chips
    fn devices(&self) -> usize;

    /// Driver version
    ///
    /// # Returns
    ///
    /// BCD-style version, e.g. `0x0204` for 2.04
    fn version(&self) -> u16;

    /// Write a register
    ///
    /// # Arguments
    ///
    /// * `instance` - Chip number
    /// * `cycles` - Cycles to wait before the write
    /// * `addr` - Register address (0x00-0x1F)
    /// * `data` - Byte to write
    fn write(&mut self, instance: usize, cycles: u16, addr: u8, data: u8);

    /// Read a register
    ///
    /// # Arguments
    ///
    /// * `instance` - Chip number
    /// * `cycles` - Cycles to wait before the read
    /// * `addr` - Register address (0x00-0x1F)
    ///
    /// # Returns
    ///
    /// Value read from the chip
    fn read(&mut self, instance: usize, cycles: u16, addr: u8) -> u8;

    /// Let cycles pass without an access
    ///
    /// # Arguments
    ///
    /// * `instance` - Chip number
    /// * `cycles` - Cycles to wait
    fn delay(&mut self, instance: usize, cycles: u16);

    /// Reset the chip
    fn reset(&mut self, instance: usize);

    /// Reset the chip and set the master volume
    ///
    /// Version 0x0204 and later.
    ///
    /// # Arguments
    ///
    /// * `instance` - Chip number
    /// * `volume` - Mode/volume register value after reset
    fn reset2(&mut self, instance: usize, volume: u8);

    /// Claim the chip for this process
    ///
    /// Version 0x0204 and later.
    ///
    /// # Returns
    ///
    /// `false` if another process holds the chip
    fn lock(&mut self, instance: usize) -> bool;

    /// Release the chip (version 0x0204 and later)
    fn unlock(&mut self, instance: usize);

    /// Drop buffered accesses
    fn flush(&mut self, instance: usize);

    /// Wait until buffered accesses have reached the chip
    fn sync(&mut self, instance: usize);

    /// Enable or bypass the chip's filter
    ///
    /// # Arguments
    ///
    /// * `instance` - Chip number
    /// * `enable` - false bypasses the filter on the device
    fn filter(&mut self, instance: usize, enable: bool);

    /// Whether the versioned reset/lock calls are available
    fn supports_v204(&self) -> bool {
        self.version() >= HSID_VERSION_204
    }
}
