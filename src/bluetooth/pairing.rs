//! Pairing table.
//!
//! Remembered remote devices live in a dense, index-ordered table: the
//! occupied indices are always `0..len()`. Removal compacts the table in
//! one step, so nothing outside this module ever shifts entries by hand.

use super::{MacAddress, Profile};
use crate::config::MAX_PAIRINGS;
use crate::error::Error;
use heapless::Vec;

/// One remembered remote device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PairingEntry {
    pub address: MacAddress,
    pub priority: u8,
    pub profiles_supported: u8,
    pub profiles_active: u8,
    /// Link id per profile, indexed by [`Profile::bit`].
    links: [Option<u8>; 6],
}

impl PairingEntry {
    pub const fn new(address: MacAddress) -> Self {
        Self {
            address,
            priority: 0,
            profiles_supported: 0,
            profiles_active: 0,
            links: [None; 6],
        }
    }

    pub fn link(&self, profile: Profile) -> Option<u8> {
        self.links[profile.bit() as usize]
    }

    /// Record an open link for `profile`.
    pub fn attach(&mut self, profile: Profile, link: u8) {
        self.links[profile.bit() as usize] = Some(link);
        self.profiles_supported |= profile.mask();
        self.profiles_active |= profile.mask();
    }

    /// Forget `link` wherever it is recorded.
    /// Returns `true` if this entry referenced it.
    pub fn detach(&mut self, link: u8) -> bool {
        let mut found = false;
        for profile in Profile::ALL {
            if self.link(profile) == Some(link) {
                self.links[profile.bit() as usize] = None;
                self.profiles_active &= !profile.mask();
                found = true;
            }
        }
        found
    }

    /// Drop every recorded link (the radio went away).
    pub fn detach_all(&mut self) {
        self.links = [None; 6];
        self.profiles_active = 0;
    }

    /// Profile through which `link` belongs to this entry, if any.
    pub fn profile_for_link(&self, link: u8) -> Option<Profile> {
        Profile::ATTRIBUTION_ORDER
            .into_iter()
            .find(|&p| self.link(p) == Some(link))
    }

    /// Link ids of active profiles, in profile bit order.
    pub fn active_links(&self) -> Vec<u8, 6> {
        let mut out = Vec::new();
        for profile in Profile::ALL {
            if self.profiles_active & profile.mask() != 0 {
                // An active bit without a recorded link reports 0xFF.
                let _ = out.push(self.link(profile).unwrap_or(0xFF));
            }
        }
        out
    }
}

/// Dense, index-ordered pairing table.
#[derive(Clone, Debug, Default)]
pub struct PairingTable {
    entries: Vec<PairingEntry, MAX_PAIRINGS>,
}

impl PairingTable {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Entry at `index`.
    ///
    /// A miss for an index the caller already range-checked means the
    /// table is corrupt, hence [`Error::NullPointer`].
    pub fn get(&self, index: u8) -> Result<&PairingEntry, Error> {
        self.entries.get(index as usize).ok_or(Error::NullPointer)
    }

    pub fn get_mut(&mut self, index: u8) -> Result<&mut PairingEntry, Error> {
        self.entries.get_mut(index as usize).ok_or(Error::NullPointer)
    }

    /// Range check used by every index-taking command.
    pub fn check_index(&self, index: u8) -> Result<(), Error> {
        if (index as usize) < self.entries.len() {
            Ok(())
        } else {
            Err(Error::ParameterRange)
        }
    }

    pub fn position(&self, address: &MacAddress) -> Option<u8> {
        self.entries
            .iter()
            .position(|e| e.address == *address)
            .map(|i| i as u8)
    }

    /// Append an entry, returning its index, or give it back when full.
    pub fn push(&mut self, entry: PairingEntry) -> Result<u8, PairingEntry> {
        self.entries.push(entry)?;
        Ok((self.entries.len() - 1) as u8)
    }

    /// Remove the entry at `index` and shift every later entry down by one.
    pub fn remove(&mut self, index: u8) -> Option<PairingEntry> {
        let index = index as usize;
        if index >= self.entries.len() {
            return None;
        }
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairingEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PairingEntry> {
        self.entries.iter_mut()
    }

    /// Pairing index and profile that account for `link`.
    pub fn owner_of_link(&self, link: u8) -> Option<(u8, Profile)> {
        self.entries
            .iter()
            .enumerate()
            .find_map(|(i, e)| e.profile_for_link(link).map(|p| (i as u8, p)))
    }
}

/// Most recently used pairing index per role.
///
/// Follows the table through deletions: every index at or above a
/// removed one is decremented, and an index that would drop below zero
/// is forgotten.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIndexes {
    pub spp: Option<u8>,
    pub iap: Option<u8>,
    pub hid: Option<u8>,
    pub raw_hid: Option<u8>,
    pub hfp: Option<u8>,
    pub avrcp: Option<u8>,
}

impl DeviceIndexes {
    fn slots_mut(&mut self) -> [&mut Option<u8>; 6] {
        [
            &mut self.spp,
            &mut self.iap,
            &mut self.hid,
            &mut self.raw_hid,
            &mut self.hfp,
            &mut self.avrcp,
        ]
    }

    /// Renumber after the entry at `removed` was deleted.
    pub fn shift_after_removal(&mut self, removed: u8) {
        for slot in self.slots_mut() {
            if let Some(index) = *slot {
                if index >= removed {
                    *slot = index.checked_sub(1);
                }
            }
        }
    }

    /// Remember `pairing` as the last device used for `profile`.
    pub fn record(&mut self, profile: Profile, pairing: u8) {
        let slot = match profile {
            Profile::HidControl | Profile::HidInterrupt => &mut self.hid,
            Profile::Spp => &mut self.spp,
            Profile::Iap => &mut self.iap,
            Profile::Hfp => &mut self.hfp,
            Profile::Avrcp => &mut self.avrcp,
        };
        *slot = Some(pairing);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
