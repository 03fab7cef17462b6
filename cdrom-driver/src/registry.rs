//! Drive registry, unit-table expansion, and mount lifecycle.
//!
//! Grounded directly on `cdrom_drive_info`, `CDROMInit`/`CDROMOpen`,
//! `InsertNewDriverUnit`, `find_hfs_partition`, and
//! `mount_mountable_volumes` in the original driver. The guest's unit
//! table (a Mac OS Device Manager structure normally living in guest RAM)
//! is modeled here as a plain Rust vector since this crate has no real
//! guest memory to scan; `Dispatcher` is the one place that would thread
//! an actual guest-memory accessor through if this were wired into a full
//! emulator.

use cdrom::backend::DiscBackend;

/// First unit table slot the driver is allowed to claim.
pub const MIN_UNIT_ENTRY: usize = 48;
/// One past the last unit table slot the driver is allowed to claim.
pub const MAX_UNIT_ENTRIES: usize = 127;
/// How many slots the table grows by when full.
const UNIT_TABLE_GROWTH: usize = 10;

/// Simulates the guest Device Manager unit table slots 48..127 that
/// CD-ROM drives beyond the first register themselves into.
#[derive(Debug, Default)]
pub struct UnitTable {
    entries: Vec<Option<u32>>,
}

impl UnitTable {
    pub fn new() -> UnitTable {
        UnitTable { entries: Vec::new() }
    }

    /// Registers `handle` in a free slot, growing the table if needed.
    /// Returns the driver reference number (`!unit_index`, matching the
    /// original's bitwise-NOT convention) or `None` if the table is full
    /// at its hard cap.
    ///
    /// The scan for a free slot runs from the *highest* occupied index
    /// down to [`MIN_UNIT_ENTRY`], matching `InsertNewDriverUnit` in the
    /// original exactly (not a low-to-high scan).
    pub fn insert(&mut self, handle: u32) -> Option<i16> {
        if self.entries.len() > MIN_UNIT_ENTRY {
            for idx in (MIN_UNIT_ENTRY..self.entries.len()).rev() {
                if self.entries[idx].is_none() {
                    self.entries[idx] = Some(handle);
                    return Some(!(idx as i16));
                }
            }
        }

        if self.entries.len() >= MAX_UNIT_ENTRIES {
            return None;
        }

        let new_len = (self.entries.len() + UNIT_TABLE_GROWTH)
            .min(MAX_UNIT_ENTRIES)
            .max(MIN_UNIT_ENTRY + 1);
        self.entries.resize(new_len, None);
        let idx = new_len - 1;
        self.entries[idx] = Some(handle);
        Some(!(idx as i16))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mirrors `cdrom_drive_info` in the original driver.
pub struct DriveInfo<B> {
    pub num: u8,
    pub backend: Option<B>,
    pub block_size: u32,
    pub twok_offset: Option<u32>,
    pub start_byte: u64,
    pub to_be_mounted: bool,
    pub mount_non_hfs: bool,
    pub disk_in_place: bool,
    pub toc: [u8; 804],
    pub lead_out: [u8; 3],
    pub stop_at: [u8; 3],
    pub start_at: [u8; 3],
    pub play_mode: u8,
    pub play_order: u8,
    pub repeat: u8,
    pub power_mode: u8,
    pub drop: bool,
    pub init_null: bool,
    pub driver_reference_number: i16,
}

impl<B> DriveInfo<B> {
    fn new(num: u8, driver_reference_number: i16) -> DriveInfo<B> {
        DriveInfo {
            num,
            backend: None,
            block_size: 512,
            twok_offset: None,
            start_byte: 0,
            to_be_mounted: false,
            mount_non_hfs: true,
            disk_in_place: false,
            toc: [0; 804],
            lead_out: [0; 3],
            stop_at: [0; 3],
            start_at: [0; 3],
            play_mode: 0x09,
            play_order: 0,
            repeat: 0,
            power_mode: 0,
            drop: false,
            init_null: false,
            driver_reference_number,
        }
    }
}

/// The set of drives the driver currently knows about, plus the unit
/// table they register themselves into when there's more than one.
pub struct DriveRegistry<B> {
    pub drives: Vec<DriveInfo<B>>,
    pub unit_table: UnitTable,
    pub acc_run_called: bool,
}

impl<B: DiscBackend> Default for DriveRegistry<B> {
    fn default() -> Self {
        DriveRegistry {
            drives: Vec::new(),
            unit_table: UnitTable::new(),
            acc_run_called: false,
        }
    }
}

impl<B: DiscBackend> DriveRegistry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new drive, either from an opened disc image (`backend
    /// = Some(..)`) or as a placeholder with no media (`backend = None`,
    /// matching the original's `init_null` drive created when no `cdrom`
    /// preference entries are configured). The first drive reuses the
    /// driver's primary reference number; subsequent drives get a new
    /// unit table slot.
    pub fn add_drive(
        &mut self,
        backend: Option<B>,
        primary_ref_num: i16,
        unit_table_handle: u32,
    ) -> Option<u8> {
        let num = self.find_free_drive_number()?;
        let driver_reference_number = if self.drives.is_empty() {
            primary_ref_num
        } else {
            self.unit_table.insert(unit_table_handle)?
        };

        let mut drive = DriveInfo::new(num, driver_reference_number);
        drive.init_null = backend.is_none();
        if let Some(mut backend) = backend {
            drive.disk_in_place = true;
            drive.to_be_mounted = true;
            if let Some(start_byte) = find_hfs_partition(&mut backend) {
                drive.start_byte = start_byte;
            }
            drive.backend = Some(backend);
        }
        self.drives.push(drive);
        Some(num)
    }

    fn find_free_drive_number(&self) -> Option<u8> {
        (1..=250u8).find(|candidate| !self.drives.iter().any(|d| d.num == *candidate))
    }

    /// Resolves a drive first by drive number, then (if that fails) by
    /// driver reference number, matching `get_drive_info`'s two-pass
    /// lookup order exactly.
    pub fn resolve(&self, drive_num: u8, driver_ref_num: i16) -> Option<&DriveInfo<B>> {
        self.drives
            .iter()
            .find(|d| d.num == drive_num)
            .or_else(|| self.drives.iter().find(|d| d.driver_reference_number == driver_ref_num))
    }

    pub fn resolve_mut(&mut self, drive_num: u8, driver_ref_num: i16) -> Option<&mut DriveInfo<B>> {
        if let Some(idx) = self.drives.iter().position(|d| d.num == drive_num) {
            return self.drives.get_mut(idx);
        }
        let idx = self
            .drives
            .iter()
            .position(|d| d.driver_reference_number == driver_ref_num)?;
        self.drives.get_mut(idx)
    }

    /// Mounts any drive that has media but isn't registered as mounted
    /// yet, and returns the list of drive numbers that need a `diskEvent`
    /// posted to the guest event queue, clearing their pending flag.
    pub fn mount_mountable_volumes(&mut self) -> Vec<u8> {
        let mut pending = Vec::new();
        for drive in &mut self.drives {
            if !drive.disk_in_place {
                if let Some(backend) = drive.backend.as_mut() {
                    drive.disk_in_place = true;
                    if let Some(start_byte) = find_hfs_partition(backend) {
                        drive.start_byte = start_byte;
                    }
                    drive.to_be_mounted = drive.start_byte != 0 || drive.mount_non_hfs;
                }
            }
            if drive.to_be_mounted {
                pending.push(drive.num);
                drive.to_be_mounted = false;
            }
        }
        pending
    }
}

/// Scans the first 64 blocks of `backend` for an Apple Partition Map
/// entry whose signature is `Apple_HFS`, returning the byte offset of
/// that partition's start if found. Matches `find_hfs_partition` in the
/// original driver.
pub fn find_hfs_partition<B: DiscBackend>(backend: &mut B) -> Option<u64> {
    const BLOCK_SIZE: u64 = 512;
    let mut block = [0u8; BLOCK_SIZE as usize];
    for block_index in 0..64u64 {
        let n = backend
            .read_cooked(block_index * BLOCK_SIZE, &mut block)
            .ok()?;
        if n < BLOCK_SIZE as usize {
            break;
        }
        if block[0] != b'P' || block[1] != b'M' {
            continue;
        }
        let name_field = &block[48..48 + 32.min(block.len() - 48)];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(name_field.len());
        if &name_field[..name_len] == b"Apple_HFS" {
            let start_block = u32::from_be_bytes(block[8..12].try_into().unwrap());
            return Some((start_block as u64) << 9);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unit_table_grows_by_ten_capped_at_127() {
        let mut table = UnitTable::new();
        // First insertion grows the table from empty.
        let first = table.insert(1).unwrap();
        assert_eq!(table.len(), MIN_UNIT_ENTRY + 1);
        assert_eq!(first, !((MIN_UNIT_ENTRY) as i16));

        // Fill every slot until the table hits the hard cap.
        let mut handle = 2u32;
        loop {
            match table.insert(handle) {
                Some(_) => handle += 1,
                None => break,
            }
            if table.len() >= MAX_UNIT_ENTRIES && table.entries.iter().all(|e| e.is_some()) {
                break;
            }
        }
        assert!(table.len() <= MAX_UNIT_ENTRIES);
    }

    /// Literal scenario: the table already has slots 0..47 occupied (by
    /// other drivers sharing the Device Manager unit table) and a second
    /// CD-ROM drive is installed. The table should grow to 58 entries,
    /// keep every prior slot's contents, and hand back `!(57)`.
    #[test]
    fn installing_a_second_drive_grows_table_to_58_preserving_prior_slots() {
        let mut table = UnitTable::new();
        table.entries = vec![Some(0xdead); MIN_UNIT_ENTRY];
        assert_eq!(table.len(), 48);

        let refnum = table.insert(0xbeef).unwrap();

        assert_eq!(table.len(), 58);
        assert!(table.entries[..MIN_UNIT_ENTRY].iter().all(|e| *e == Some(0xdead)));
        assert_eq!(table.entries[57], Some(0xbeef));
        assert_eq!(refnum, !57i16);
    }

    #[test]
    fn unit_table_reuses_freed_high_slots_first() {
        let mut table = UnitTable::new();
        table.insert(1).unwrap(); // grows to MIN_UNIT_ENTRY+1, fills last slot
        let last_idx = table.len() - 1;
        table.entries[last_idx] = None;
        let refnum = table.insert(2).unwrap();
        assert_eq!(refnum, !(last_idx as i16));
    }
}
