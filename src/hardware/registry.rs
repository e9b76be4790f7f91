//! Hardware instance allocation
//!
//! Each hardware-backed chip occupies one driver instance number. Slots are
//! handed out lowest-free-first and returned when the [`InstanceSlot`] is
//! dropped, so numbering stays deterministic however instances come and go.

use std::fmt;
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

/// Shared table of used instance numbers
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    slots: Arc<Mutex<Vec<bool>>>,
}

impl InstanceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest free instance number
    pub fn acquire(&self) -> InstanceSlot {
        let mut slots = self.slots.lock();
        let index = match slots.iter().position(|used| !used) {
            Some(index) => {
                slots[index] = true;
                index
            }
            None => {
                slots.push(true);
                slots.len() - 1
            }
        };
        info!("hardware SID instance {index} acquired");
        InstanceSlot {
            index,
            slots: Arc::clone(&self.slots),
        }
    }

    /// Number of claimed slots
    pub fn in_use(&self) -> usize {
        self.slots.lock().iter().filter(|&&used| used).count()
    }
}

/// Claimed instance number, released on drop
pub struct InstanceSlot {
    index: usize,
    slots: Arc<Mutex<Vec<bool>>>,
}

impl InstanceSlot {
    /// Driver instance number
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for InstanceSlot {
    fn drop(&mut self) {
        if let Some(used) = self.slots.lock().get_mut(self.index) {
            *used = false;
        }
        info!("hardware SID instance {} released", self.index);
    }
}

impl fmt::Debug for InstanceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceSlot")
            .field("index", &self.index)
            .finish()
    }
}
