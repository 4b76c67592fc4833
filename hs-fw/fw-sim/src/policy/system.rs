use hs_fw_core::ErrorCode;
use hs_fw_core::serial_number::SerialNumber;
use hs_fw_core::tasks::SystemPolicy;

pub const HARDWARE_VERSION: &str = "sim";

/// Serial number store with a staged commit.
///
/// A write is staged first and only becomes readable once the commit
/// succeeds, so a failed write leaves the previous value in place.
pub struct SimSystem {
    committed: Option<SerialNumber>,
    staged: Option<SerialNumber>,
    fail_writes: bool,
}

impl SimSystem {
    pub fn new(initial: Option<SerialNumber>, fail_writes: bool) -> Self {
        Self {
            committed: initial,
            staged: None,
            fail_writes,
        }
    }
}

impl SystemPolicy for SimSystem {
    fn set_serial_number(&mut self, serial_number: SerialNumber) -> Result<(), ErrorCode> {
        self.staged = Some(serial_number);
        if self.fail_writes {
            self.staged = None;
            return Err(ErrorCode::SerialNumberHalError);
        }
        self.committed = self.staged.take();
        Ok(())
    }

    fn serial_number(&self) -> Option<SerialNumber> {
        self.committed
    }

    fn hardware_version(&self) -> &'static str {
        HARDWARE_VERSION
    }
}
