//! Locate and decode the scan directory of a CLASSIC file.
//!
//! The directory lives in one or more index extensions whose locations are
//! declared in the first record of the file. Each entry slot addresses one
//! observation record. Slots that are empty, deleted, or point outside the
//! file are skipped and reported; only an unreadable file header or an
//! index extension running past end of file is fatal.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::cursor::{ByteCursor, WORD};
use crate::types::{ByteOrder, FileKind, ObsKind};
use crate::{ClassError, Result};

/// All stored fields are little-endian in files written by CLASS.
pub(crate) const FILE_ORDER: ByteOrder = ByteOrder::Little;

/// Fixed block size of v1 containers, in bytes.
pub(crate) const V1_BLOCK: usize = 512;

/// Maximum number of index extensions.
const MAX_EXTENSIONS: usize = 10;

/// Decoded top-level file header.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub kind: FileKind,
    /// Words per record (fixed 128 for v1).
    pub reclen: usize,
    /// Directory slot length in words (fixed 32 for v1).
    pub entry_words: usize,
    /// Declared number of directory slots (`xnext - 1`).
    pub slots: usize,
    /// Slots held by the first index extension.
    pub lex1: usize,
    /// Extension growth code: 10 fixed-size, 20 doubling.
    pub gex: i32,
    /// 1-based block (v1) or record (v2) numbers of the index extensions.
    pub extensions: Vec<i64>,
}

/// Validity flags of a directory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags(u32);

impl EntryFlags {
    pub const VALID: Self = Self(1);
    pub const DELETED: Self = Self(2);
    /// The addressed record carries an unrecognized ident tag.
    pub const UNKNOWN_TAG: Self = Self(4);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// One valid directory entry.
///
/// Carries the index-level metadata stored alongside the record address,
/// which is what CLASS itself lists when browsing a file.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    /// 1-based slot index; stable, never compacted over skipped slots.
    pub index: usize,
    /// Entry number (`xnum`).
    pub num: i64,
    /// Observation record address: 1-based block, 1-based word within it.
    pub block: i64,
    pub word: i32,
    pub source: String,
    pub line: String,
    pub telescope: String,
    /// Observation and reduction day codes.
    pub date_obs: i32,
    pub date_red: i32,
    pub off_lam: f32,
    pub off_bet: f32,
    pub proj_code: String,
    pub kind: ObsKind,
    pub quality: i32,
    pub scan: i64,
    pub pos_angle: i32,
    pub subscan: i32,
    /// Byte offset of the observation record within the file.
    pub offset: usize,
    /// Byte length of the observation record.
    pub length: usize,
    pub flags: EntryFlags,
}

/// A slot excluded from the directory, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub index: usize,
    pub flags: EntryFlags,
    pub reason: String,
}

/// The scan directory: slot index to entry, valid slots only.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: BTreeMap<usize, DirectoryEntry>,
    skipped: Vec<SkippedEntry>,
    slots: usize,
}

/// Decode the top-level file header.
pub fn read_file_descriptor(data: &[u8]) -> Result<FileDescriptor> {
    let mut cur = ByteCursor::new(data);
    let code = cur.read_bytes(4).map_err(|_| header_truncated())?;
    let kind = FileKind::from_code([code[0], code[1], code[2], code[3]])?;

    match kind {
        FileKind::V1 => read_v1_descriptor(&mut cur),
        FileKind::V2 => read_v2_descriptor(&mut cur),
    }
}

fn header_truncated() -> ClassError {
    ClassError::MalformedDirectory("truncated file header".into())
}

fn read_v1_descriptor(cur: &mut ByteCursor<'_>) -> Result<FileDescriptor> {
    let _next = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let _lex = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let nex = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let xnext = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;

    if nex < 1 {
        return Err(ClassError::MalformedDirectory(format!(
            "file declares {nex} index extensions"
        )));
    }
    if xnext < 1 {
        return Err(ClassError::MalformedDirectory(format!(
            "bad next free entry number {xnext}"
        )));
    }
    let nex = nex as usize;
    if nex > MAX_EXTENSIONS {
        warn!("file declares {nex} index extensions, reading the first {MAX_EXTENSIONS}");
    }
    let mut extensions = Vec::with_capacity(nex.min(MAX_EXTENSIONS));
    for _ in 0..nex.min(MAX_EXTENSIONS) {
        extensions.push(cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())? as i64);
    }

    let slots = (xnext - 1) as usize;
    Ok(FileDescriptor {
        kind: FileKind::V1,
        reclen: V1_BLOCK / WORD,
        entry_words: 32,
        slots,
        // v1 keeps the whole directory contiguous in the first extension
        lex1: slots,
        gex: 10,
        extensions,
    })
}

fn read_v2_descriptor(cur: &mut ByteCursor<'_>) -> Result<FileDescriptor> {
    let reclen = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let kind = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let _vind = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let lind = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let _flags = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let xnext = cur.read_i64(FILE_ORDER).map_err(|_| header_truncated())?;
    let _nextrec = cur.read_i64(FILE_ORDER).map_err(|_| header_truncated())?;
    let _nextword = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let lex1 = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let nex = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;
    let gex = cur.read_i32(FILE_ORDER).map_err(|_| header_truncated())?;

    if kind != 1 {
        return Err(ClassError::MalformedDirectory(format!(
            "not a file written by CLASS (kind {kind})"
        )));
    }
    if !(16..=1 << 20).contains(&reclen) {
        return Err(ClassError::MalformedDirectory(format!(
            "implausible record length {reclen} words"
        )));
    }
    if !(26..=reclen).contains(&lind) {
        return Err(ClassError::MalformedDirectory(format!(
            "implausible entry length {lind} words"
        )));
    }
    if gex != 10 && gex != 20 {
        return Err(ClassError::MalformedDirectory(format!(
            "unsupported extension growth code {gex}"
        )));
    }
    if xnext < 1 || lex1 < 1 || nex < 1 {
        return Err(ClassError::MalformedDirectory(format!(
            "bad index shape: xnext={xnext} lex1={lex1} nex={nex}"
        )));
    }
    let nex = nex as usize;
    if nex > MAX_EXTENSIONS {
        warn!("file declares {nex} index extensions, reading the first {MAX_EXTENSIONS}");
    }
    let mut extensions = Vec::with_capacity(nex.min(MAX_EXTENSIONS));
    for _ in 0..nex.min(MAX_EXTENSIONS) {
        extensions.push(cur.read_i64(FILE_ORDER).map_err(|_| header_truncated())?);
    }

    Ok(FileDescriptor {
        kind: FileKind::V2,
        reclen: reclen as usize,
        entry_words: lind as usize,
        slots: (xnext - 1) as usize,
        lex1: lex1 as usize,
        gex,
        extensions,
    })
}

/// Raw entry fields shared by both layouts.
struct RawEntry {
    block: i64,
    word: i32,
    num: i64,
    ver: i32,
    source: String,
    line: String,
    telescope: String,
    date_obs: i32,
    date_red: i32,
    off_lam: f32,
    off_bet: f32,
    proj_code: String,
    xkind: i32,
    quality: i32,
    scan: i64,
    pos_angle: i32,
    subscan: i32,
}

fn read_entry(cur: &mut ByteCursor<'_>, kind: FileKind) -> Result<RawEntry> {
    match kind {
        FileKind::V1 => {
            let block = cur.read_i32(FILE_ORDER)? as i64;
            let num = cur.read_i32(FILE_ORDER)? as i64;
            let ver = cur.read_i32(FILE_ORDER)?;
            let source = cur.read_string(12)?;
            let line = cur.read_string(12)?;
            let telescope = cur.read_string(12)?;
            let date_obs = cur.read_i32(FILE_ORDER)?;
            let date_red = cur.read_i32(FILE_ORDER)?;
            let off_lam = cur.read_f32(FILE_ORDER)?;
            let off_bet = cur.read_f32(FILE_ORDER)?;
            let proj_code = cur.read_string(4)?;
            let xkind = cur.read_i32(FILE_ORDER)?;
            let quality = cur.read_i32(FILE_ORDER)?;
            let scan = cur.read_i32(FILE_ORDER)? as i64;
            let pos_angle = cur.read_i32(FILE_ORDER)?;
            Ok(RawEntry {
                block,
                word: 1,
                num,
                ver,
                source,
                line,
                telescope,
                date_obs,
                date_red,
                off_lam,
                off_bet,
                proj_code,
                xkind,
                quality,
                scan,
                pos_angle,
                subscan: 0,
            })
        }
        FileKind::V2 => {
            let block = cur.read_i64(FILE_ORDER)?;
            let word = cur.read_i32(FILE_ORDER)?;
            let num = cur.read_i64(FILE_ORDER)?;
            let ver = cur.read_i32(FILE_ORDER)?;
            let source = cur.read_string(12)?;
            let line = cur.read_string(12)?;
            let telescope = cur.read_string(12)?;
            let date_obs = cur.read_i32(FILE_ORDER)?;
            let date_red = cur.read_i32(FILE_ORDER)?;
            let off_lam = cur.read_f32(FILE_ORDER)?;
            let off_bet = cur.read_f32(FILE_ORDER)?;
            let proj_code = cur.read_string(4)?;
            let xkind = cur.read_i32(FILE_ORDER)?;
            let quality = cur.read_i32(FILE_ORDER)?;
            let pos_angle = cur.read_i32(FILE_ORDER)?;
            let scan = cur.read_i64(FILE_ORDER)?;
            let subscan = cur.read_i32(FILE_ORDER)?;
            Ok(RawEntry {
                block,
                word,
                num,
                ver,
                source,
                line,
                telescope,
                date_obs,
                date_red,
                off_lam,
                off_bet,
                proj_code,
                xkind,
                quality,
                scan,
                pos_angle,
                subscan,
            })
        }
    }
}

/// Resolve an entry's record address and probe the record prologue for its
/// total span. Returns `(offset, length, known_ident)`; an `Err` carries
/// the skip reason.
fn probe_record(
    data: &[u8],
    desc: &FileDescriptor,
    block: i64,
    word: i32,
) -> std::result::Result<(usize, usize, bool), String> {
    if block < 1 || word < 1 {
        return Err(format!("bad record address: block {block}, word {word}"));
    }
    let record_bytes = desc.reclen * WORD;
    let offset = match desc.kind {
        FileKind::V1 => (block as usize - 1).checked_mul(V1_BLOCK),
        FileKind::V2 => (block as usize - 1)
            .checked_mul(record_bytes)
            .and_then(|o| o.checked_add((word as usize - 1) * WORD)),
    }
    .ok_or_else(|| format!("record address overflow: block {block}"))?;

    if offset.checked_add(4).map_or(true, |end| end > data.len()) {
        return Err(format!("record at byte {offset} is past end of file"));
    }

    let mut cur = ByteCursor::new(data);
    cur.seek(offset).map_err(|e| e.to_string())?;
    let ident = cur.read_bytes(4).map_err(|e| e.to_string())?;

    if ident[0] != b'2' {
        // Unrecognized record tag: keep the entry so the header decoder can
        // produce an Unknown variant, but only claim the bytes we can see.
        let length = record_bytes.min(data.len() - offset);
        return Ok((offset, length, false));
    }

    let length = match desc.kind {
        FileKind::V1 => {
            let nbl = cur.read_i32(FILE_ORDER).map_err(|e| e.to_string())?;
            if nbl < 1 {
                return Err(format!("record declares {nbl} blocks"));
            }
            (nbl as usize) * V1_BLOCK
        }
        FileKind::V2 => {
            let version = cur.read_i32(FILE_ORDER).map_err(|e| e.to_string())?;
            if version < 1 {
                // The header decoder demotes these to Unknown; keep the flag
                // in agreement and only claim the bytes we can see.
                let length = record_bytes.min(data.len() - offset);
                return Ok((offset, length, false));
            }
            let _nsec = cur.read_i32(FILE_ORDER).map_err(|e| e.to_string())?;
            let nword = cur.read_i64(FILE_ORDER).map_err(|e| e.to_string())?;
            if nword < 7 {
                return Err(format!("record declares {nword} words"));
            }
            (nword as usize) * WORD
        }
    };

    if offset + length > data.len() {
        return Err(format!(
            "record spans bytes {offset}..{} past end of file ({})",
            offset + length,
            data.len()
        ));
    }
    Ok((offset, length, true))
}

impl Directory {
    /// Build the directory in one pass over the index extensions.
    pub fn build(data: &[u8], desc: &FileDescriptor) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut skipped = Vec::new();
        let mut seen_nums: BTreeSet<i64> = BTreeSet::new();

        let entry_bytes = desc.entry_words * WORD;
        let mut growth: usize = 1;
        let mut index: usize = 0;

        'outer: for (iext, &ext) in desc.extensions.iter().enumerate() {
            if index >= desc.slots {
                break;
            }
            if ext < 1 {
                return Err(ClassError::MalformedDirectory(format!(
                    "index extension {iext} at bad record {ext}"
                )));
            }
            let base = match desc.kind {
                FileKind::V1 => (ext as usize - 1).checked_mul(V1_BLOCK),
                FileKind::V2 => (ext as usize - 1).checked_mul(desc.reclen * WORD),
            }
            .ok_or_else(|| {
                ClassError::MalformedDirectory(format!("index extension {iext} address overflow"))
            })?;
            debug!("index extension {iext} at byte {base}, {growth}x capacity");

            let capacity = desc.lex1 * growth;
            for k in 0..capacity {
                if index >= desc.slots {
                    break 'outer;
                }
                index += 1;

                let mut cur = ByteCursor::new(data);
                let slot_off = base + k * entry_bytes;
                let raw = cur
                    .seek(slot_off)
                    .and_then(|_| read_entry(&mut cur, desc.kind))
                    .map_err(|_| {
                        ClassError::MalformedDirectory(format!(
                            "directory slot {index} at byte {slot_off} is past end of file"
                        ))
                    })?;
                Self::classify(
                    data,
                    desc,
                    raw,
                    index,
                    &mut seen_nums,
                    &mut entries,
                    &mut skipped,
                );
            }
            if desc.gex == 20 {
                growth *= 2;
            }
        }

        debug!(
            "directory built: {} valid, {} skipped of {} slots",
            entries.len(),
            skipped.len(),
            desc.slots
        );
        Ok(Self {
            entries,
            skipped,
            slots: desc.slots,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn classify(
        data: &[u8],
        desc: &FileDescriptor,
        raw: RawEntry,
        index: usize,
        seen_nums: &mut BTreeSet<i64>,
        entries: &mut BTreeMap<usize, DirectoryEntry>,
        skipped: &mut Vec<SkippedEntry>,
    ) {
        if raw.num < 1 {
            skipped.push(SkippedEntry {
                index,
                flags: EntryFlags::DELETED,
                reason: "empty or deleted slot".into(),
            });
            return;
        }
        if desc.kind == FileKind::V1 && raw.ver != 1 {
            warn!("slot {index}: unsupported entry version {}", raw.ver);
            skipped.push(SkippedEntry {
                index,
                flags: EntryFlags::default(),
                reason: format!("unsupported entry version {}", raw.ver),
            });
            return;
        }
        if !seen_nums.insert(raw.num) {
            warn!("slot {index}: duplicate entry number {}", raw.num);
            skipped.push(SkippedEntry {
                index,
                flags: EntryFlags::default(),
                reason: format!("duplicate entry number {}", raw.num),
            });
            return;
        }
        match probe_record(data, desc, raw.block, raw.word) {
            Ok((offset, length, known_ident)) => {
                let mut flags = EntryFlags::VALID;
                if !known_ident {
                    flags.insert(EntryFlags::UNKNOWN_TAG);
                }
                entries.insert(
                    index,
                    DirectoryEntry {
                        index,
                        num: raw.num,
                        block: raw.block,
                        word: raw.word,
                        source: raw.source,
                        line: raw.line,
                        telescope: raw.telescope,
                        date_obs: raw.date_obs,
                        date_red: raw.date_red,
                        off_lam: raw.off_lam,
                        off_bet: raw.off_bet,
                        proj_code: raw.proj_code,
                        kind: ObsKind::from_xkind(raw.xkind),
                        quality: raw.quality,
                        scan: raw.scan,
                        pos_angle: raw.pos_angle,
                        subscan: raw.subscan,
                        offset,
                        length,
                        flags,
                    },
                );
            }
            Err(reason) => {
                warn!("slot {index}: {reason}");
                skipped.push(SkippedEntry {
                    index,
                    flags: EntryFlags::default(),
                    reason,
                });
            }
        }
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared number of slots, valid or not.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Look up the valid entry at a 1-based slot index.
    pub fn get(&self, index: usize) -> Option<&DirectoryEntry> {
        self.entries.get(&index)
    }

    /// Valid entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    /// Slots excluded from the directory.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}
