//! Uptime clock and soft timer table.
//!
//! Time advances in 10 ms ticks driven by the 100 Hz scheduler. Soft
//! timers are host-programmed through `system_set_timer` and fire a
//! `system_timer_tick` event when due.

use heapless::Vec;

use crate::config::{SOFT_TIMER_COUNT, TICKS_PER_SECOND};
use crate::error::Error;

/// Uptime as whole seconds plus a sub-second tick (0-99).
///
/// Field order makes the derived ordering chronological.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clock {
    pub seconds: u32,
    pub ticks: u8,
}

impl Clock {
    pub const fn new() -> Self {
        Self {
            seconds: 0,
            ticks: 0,
        }
    }

    /// Advance by one 10 ms tick.
    pub fn advance(&mut self) {
        self.ticks += 1;
        if self.ticks >= TICKS_PER_SECOND {
            self.ticks = 0;
            self.seconds = self.seconds.wrapping_add(1);
        }
    }

    /// Point in time `interval` ticks after `self`.
    pub fn after(self, interval: u16) -> Self {
        let per_second = TICKS_PER_SECOND as u16;
        let mut seconds = self.seconds.wrapping_add((interval / per_second) as u32);
        let mut ticks = self.ticks + (interval % per_second) as u8;
        if ticks >= TICKS_PER_SECOND {
            ticks -= TICKS_PER_SECOND;
            seconds = seconds.wrapping_add(1);
        }
        Self { seconds, ticks }
    }
}

/// One soft timer slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SoftTimer {
    pub active: bool,
    pub repeat: bool,
    /// Interval in 10 ms units.
    pub interval: u16,
    pub due: Clock,
}

/// Fixed table of [`SOFT_TIMER_COUNT`] timers addressed by handle.
#[derive(Clone, Debug, Default)]
pub struct SoftTimers {
    slots: [SoftTimer; SOFT_TIMER_COUNT],
}

impl SoftTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program timer `handle`.
    ///
    /// An `interval` of 0 stops the timer. A non-zero `oneshot` fires once
    /// and then deactivates; otherwise the timer repeats.
    pub fn set(&mut self, handle: u8, interval: u16, oneshot: u8, now: Clock) -> Result<(), Error> {
        let slot = self
            .slots
            .get_mut(handle as usize)
            .ok_or(Error::ParameterRange)?;

        if interval == 0 {
            slot.active = false;
            debug!("timer {}: stopped", handle);
            return Ok(());
        }

        *slot = SoftTimer {
            active: true,
            repeat: oneshot == 0,
            interval,
            due: now.after(interval),
        };
        debug!("timer {}: every {} ticks, repeat={}", handle, interval, slot.repeat);
        Ok(())
    }

    pub fn get(&self, handle: u8) -> Option<&SoftTimer> {
        self.slots.get(handle as usize)
    }

    /// Handles of timers due at `now`, in handle order.
    ///
    /// Repeating timers are rescheduled from `now`; one-shot timers are
    /// deactivated.
    pub fn take_due(&mut self, now: Clock) -> Vec<u8, SOFT_TIMER_COUNT> {
        let mut fired = Vec::new();
        for (handle, slot) in self.slots.iter_mut().enumerate() {
            if !slot.active || slot.due > now {
                continue;
            }
            if slot.repeat {
                slot.due = now.after(slot.interval);
            } else {
                slot.active = false;
            }
            let _ = fired.push(handle as u8);
        }
        fired
    }

    pub fn clear(&mut self) {
        self.slots = [SoftTimer::default(); SOFT_TIMER_COUNT];
    }
}
