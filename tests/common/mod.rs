//! Synthetic CLASSIC file builders shared by the integration tests.
//!
//! These emit byte-exact container images: file header, index extension,
//! and one observation record per scan carrying general, position,
//! spectroscopy-or-drift and calibration sections. Little-endian
//! throughout, matching files written by CLASS.

#![allow(dead_code)]

pub const V1_BLOCK: usize = 512;
pub const V2_RECLEN: usize = 1024; // words per record
pub const V2_LIND: usize = 32; // entry length, words

/// One synthetic scan, with knobs for corruption scenarios.
#[derive(Clone)]
pub struct SynthScan {
    pub scan: i64,
    pub source: String,
    pub line: String,
    pub telescope: String,
    /// 0 = spectrum, 1 = continuum drift.
    pub xkind: i32,
    /// Stored day code; -3002 is MJD 57547 = 2016-06-08.
    pub date_obs: i32,
    /// UT of day, radians.
    pub ut: f64,
    pub lam: f64,
    pub bet: f64,
    pub tsys: f32,
    pub int_time: f32,
    pub restf: f64,
    pub image: f64,
    pub nchan: i32,
    pub rchan: f32,
    pub fres: f32,
    pub voff: f32,
    pub geolat: f64,
    pub data: Vec<f32>,
    /// Emit the slot with entry number 0 (deleted).
    pub deleted: bool,
    /// Corrupt the observation record ident tag.
    pub bad_ident: bool,
    /// Version tag written into the v2 record prologue.
    pub record_version: i32,
    /// Replace the position section code with an unassigned one.
    pub weird_section: bool,
    /// Override the stored entry number.
    pub force_num: Option<i64>,
}

impl Default for SynthScan {
    fn default() -> Self {
        Self {
            scan: 100,
            source: "ORION-KL".into(),
            line: "CO(3-2)".into(),
            telescope: "AP-LASMA".into(),
            xkind: 0,
            date_obs: -3002,
            ut: 1.0,
            lam: 1.46,
            bet: -0.095,
            tsys: 210.0,
            int_time: 30.0,
            restf: 345795.9899,
            image: 333795.99,
            nchan: 256,
            rchan: 128.0,
            fres: 0.0763,
            voff: -5.0,
            geolat: -0.402,
            data: ramp(256),
            deleted: false,
            bad_ident: false,
            record_version: 2,
            weird_section: false,
            force_num: None,
        }
    }
}

pub fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|k| (k as f32 * 0.1).sin()).collect()
}

fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut Vec<u8>, v: f32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_chars(buf: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len);
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (len - n), b' ');
}

/// Pad so the next write lands at the given 1-based word address.
fn pad_to_word(buf: &mut Vec<u8>, word: usize) {
    assert!(buf.len() <= (word - 1) * 4, "section layout overlap");
    buf.resize((word - 1) * 4, 0);
}

fn write_general(buf: &mut Vec<u8>, s: &SynthScan) {
    put_f64(buf, s.ut);
    put_f64(buf, 2.0); // st
    put_f32(buf, 2.1); // az
    put_f32(buf, 0.9); // el
    put_f32(buf, 0.05); // tau
    put_f32(buf, s.tsys);
    put_f32(buf, s.int_time);
    put_i32(buf, 1); // xunit
}

fn write_position(buf: &mut Vec<u8>, s: &SynthScan) {
    put_chars(buf, &s.source, 12);
    put_i32(buf, 3); // system
    put_f32(buf, 2000.0); // epoch
    put_i32(buf, 1); // proj
    put_f64(buf, s.lam);
    put_f64(buf, s.bet);
    put_f64(buf, 0.0); // projang
    put_f32(buf, 0.0); // lamof
    put_f32(buf, 0.0); // betof
}

fn write_spectro(buf: &mut Vec<u8>, s: &SynthScan) {
    put_chars(buf, &s.line, 12);
    put_f64(buf, s.restf);
    put_i32(buf, s.nchan);
    put_f32(buf, s.rchan);
    put_f32(buf, s.fres);
    put_f32(buf, 0.0); // foff
    put_f32(buf, -0.066); // vres
    put_f32(buf, s.voff);
    put_f32(buf, -1000.0); // badl
    put_f64(buf, s.image);
    put_i32(buf, 1); // vtype
    put_f64(buf, 0.0); // doppler
}

fn write_drift(buf: &mut Vec<u8>, s: &SynthScan) {
    put_f64(buf, s.restf); // freq
    put_f32(buf, 1.0); // width
    put_i32(buf, s.nchan); // npoin
    put_f32(buf, s.rchan); // rpoin
    put_f32(buf, s.restf as f32); // tref
    put_f32(buf, 0.0); // aref
    put_f32(buf, 0.0); // apos
    put_f32(buf, s.fres); // tres
    put_f32(buf, 0.0); // ares
    put_f32(buf, -1000.0); // badc
    put_i32(buf, 1); // ctype
    put_f64(buf, s.image); // cimag
    put_f32(buf, 0.0); // colla
    put_f32(buf, 0.0); // colle
}

fn write_calibration(buf: &mut Vec<u8>, s: &SynthScan) {
    for v in [
        0.9f32, 0.95, 1.0, 1.2, 560.0, 270.0, 240.0, 290.0, 80.0, 0.1, 0.12, 235.0, 75.0,
    ] {
        put_f32(buf, v); // beeff..trec
    }
    put_i32(buf, 1); // cmode
    put_f32(buf, 1.0); // atfac
    put_f32(buf, 5105.0); // alti
    for _ in 0..3 {
        put_f32(buf, 0.0); // count
    }
    put_f32(buf, 0.0); // lcalof
    put_f32(buf, 0.0); // bcalof
    put_f64(buf, -1.189); // geolong
    put_f64(buf, s.geolat);
}

fn section_codes(s: &SynthScan) -> [i32; 4] {
    let pos = if s.weird_section { -99 } else { -3 };
    let spec = if s.xkind == 0 { -4 } else { -10 };
    [-2, pos, spec, -14]
}

fn section_lens(s: &SynthScan) -> [i64; 4] {
    let spec = if s.xkind == 0 { 17 } else { 16 };
    [10, 14, spec, 25]
}

fn write_sections(buf: &mut Vec<u8>, s: &SynthScan, addrs: [usize; 4]) {
    pad_to_word(buf, addrs[0]);
    write_general(buf, s);
    pad_to_word(buf, addrs[1]);
    write_position(buf, s);
    pad_to_word(buf, addrs[2]);
    if s.xkind == 0 {
        write_spectro(buf, s);
    } else {
        write_drift(buf, s);
    }
    pad_to_word(buf, addrs[3]);
    write_calibration(buf, s);
}

// ---------------------------------------------------------------- v1 ----

/// Section word addresses in a v1 record; data starts at word 88.
const V1_ADDRS: [usize; 4] = [22, 32, 46, 63];
const V1_DATA_WORD: usize = 88;

fn v1_obs_record(s: &SynthScan, slot: usize) -> Vec<u8> {
    let total_words = (V1_DATA_WORD - 1) + s.data.len();
    let nbl = total_words.div_ceil(V1_BLOCK / 4);

    let mut buf = Vec::new();
    put_chars(&mut buf, if s.bad_ident { "XZ" } else { "2" }, 4);
    put_i32(&mut buf, nbl as i32);
    put_i32(&mut buf, (total_words * 4) as i32); // bytes
    put_i32(&mut buf, 1); // adr
    put_i32(&mut buf, V1_DATA_WORD as i32); // nhead
    put_i32(&mut buf, s.data.len() as i32); // len
    put_i32(&mut buf, slot as i32); // ientry
    put_i32(&mut buf, 4); // nsec
    put_i32(&mut buf, s.scan as i32); // obsnum
    for c in section_codes(s) {
        put_i32(&mut buf, c);
    }
    for l in section_lens(s) {
        put_i32(&mut buf, l as i32);
    }
    for a in V1_ADDRS {
        put_i32(&mut buf, a as i32);
    }
    write_sections(&mut buf, s, V1_ADDRS);
    pad_to_word(&mut buf, V1_DATA_WORD);
    for &v in &s.data {
        put_f32(&mut buf, v);
    }
    buf.resize(nbl * V1_BLOCK, 0);
    buf
}

fn v1_entry(s: &SynthScan, slot: usize, block: usize) -> Vec<u8> {
    let num = if s.deleted {
        0
    } else {
        s.force_num.unwrap_or(slot as i64)
    };
    let mut buf = Vec::new();
    put_i32(&mut buf, block as i32);
    put_i32(&mut buf, num as i32);
    put_i32(&mut buf, 1); // xver
    put_chars(&mut buf, &s.source, 12);
    put_chars(&mut buf, &s.line, 12);
    put_chars(&mut buf, &s.telescope, 12);
    put_i32(&mut buf, s.date_obs);
    put_i32(&mut buf, s.date_obs + 1); // date_red
    put_f32(&mut buf, 0.0);
    put_f32(&mut buf, 0.0);
    put_chars(&mut buf, "GEN", 4);
    put_i32(&mut buf, s.xkind);
    put_i32(&mut buf, 0); // quality
    put_i32(&mut buf, s.scan as i32);
    put_i32(&mut buf, 0); // pos_angle
    buf.resize(128, 0);
    buf
}

/// Build a complete v1 container image.
pub fn build_v1(scans: &[SynthScan]) -> Vec<u8> {
    let n = scans.len();
    let dir_blocks = n.div_ceil(4).max(1);

    let mut records = Vec::new();
    let mut blocks = Vec::new();
    let mut next_block = 2 + dir_blocks;
    for (i, s) in scans.iter().enumerate() {
        let rec = v1_obs_record(s, i + 1);
        blocks.push(next_block);
        next_block += rec.len() / V1_BLOCK;
        records.push(rec);
    }

    let mut file = Vec::new();
    put_chars(&mut file, "1A", 4);
    put_i32(&mut file, next_block as i32); // next free block
    put_i32(&mut file, 0); // lex
    put_i32(&mut file, 1); // nex
    put_i32(&mut file, (n + 1) as i32); // xnext
    put_i32(&mut file, 2); // ext[0]
    file.resize(V1_BLOCK, 0);

    for (i, s) in scans.iter().enumerate() {
        file.extend_from_slice(&v1_entry(s, i + 1, blocks[i]));
    }
    file.resize((1 + dir_blocks) * V1_BLOCK, 0);

    for rec in records {
        file.extend_from_slice(&rec);
    }
    file
}

// ---------------------------------------------------------------- v2 ----

/// Section word addresses in a v2 record; data starts at word 99.
const V2_ADDRS: [usize; 4] = [33, 43, 57, 74];
const V2_DATA_WORD: usize = 99;

fn v2_obs_record(s: &SynthScan, num: i64) -> Vec<u8> {
    let nword = (V2_DATA_WORD - 1) + s.data.len();
    let nrec = nword.div_ceil(V2_RECLEN);

    let mut buf = Vec::new();
    put_chars(&mut buf, if s.bad_ident { "XZ" } else { "2" }, 4);
    put_i32(&mut buf, s.record_version);
    put_i32(&mut buf, 4); // nsec
    put_i64(&mut buf, nword as i64);
    put_i64(&mut buf, V2_DATA_WORD as i64); // adata
    put_i64(&mut buf, s.data.len() as i64); // ldata
    put_i64(&mut buf, num);
    for c in section_codes(s) {
        put_i32(&mut buf, c);
    }
    for l in section_lens(s) {
        put_i64(&mut buf, l);
    }
    for a in V2_ADDRS {
        put_i64(&mut buf, a as i64);
    }
    write_sections(&mut buf, s, V2_ADDRS);
    pad_to_word(&mut buf, V2_DATA_WORD);
    for &v in &s.data {
        put_f32(&mut buf, v);
    }
    buf.resize(nrec * V2_RECLEN * 4, 0);
    buf
}

fn v2_entry(s: &SynthScan, slot: usize, record: usize) -> Vec<u8> {
    let num = if s.deleted {
        0
    } else {
        s.force_num.unwrap_or(slot as i64)
    };
    let mut buf = Vec::new();
    put_i64(&mut buf, record as i64); // xblock
    put_i32(&mut buf, 1); // xword
    put_i64(&mut buf, num);
    put_i32(&mut buf, 2); // xver
    put_chars(&mut buf, &s.source, 12);
    put_chars(&mut buf, &s.line, 12);
    put_chars(&mut buf, &s.telescope, 12);
    put_i32(&mut buf, s.date_obs);
    put_i32(&mut buf, s.date_obs + 1);
    put_f32(&mut buf, 0.0);
    put_f32(&mut buf, 0.0);
    put_chars(&mut buf, "GEN", 4);
    put_i32(&mut buf, s.xkind);
    put_i32(&mut buf, 0); // quality
    put_i32(&mut buf, 0); // pos_angle
    put_i64(&mut buf, s.scan);
    put_i32(&mut buf, 1); // subscan
    buf.resize(V2_LIND * 4, 0);
    buf
}

/// Build a complete v2 container image.
pub fn build_v2(scans: &[SynthScan]) -> Vec<u8> {
    let n = scans.len();
    let entries_per_record = V2_RECLEN / V2_LIND;
    let dir_records = n.div_ceil(entries_per_record).max(1);

    let mut records = Vec::new();
    let mut starts = Vec::new();
    let mut next_record = 2 + dir_records;
    for (i, s) in scans.iter().enumerate() {
        let num = if s.deleted {
            0
        } else {
            s.force_num.unwrap_or((i + 1) as i64)
        };
        let rec = v2_obs_record(s, num);
        starts.push(next_record);
        next_record += rec.len() / (V2_RECLEN * 4);
        records.push(rec);
    }

    let mut file = Vec::new();
    put_chars(&mut file, "2A", 4);
    put_i32(&mut file, V2_RECLEN as i32);
    put_i32(&mut file, 1); // kind
    put_i32(&mut file, 1); // vind
    put_i32(&mut file, V2_LIND as i32);
    put_i32(&mut file, 0); // flags
    put_i64(&mut file, (n + 1) as i64); // xnext
    put_i64(&mut file, next_record as i64); // nextrec
    put_i32(&mut file, 1); // nextword
    put_i32(&mut file, (dir_records * entries_per_record) as i32); // lex1
    put_i32(&mut file, 1); // nex
    put_i32(&mut file, 10); // gex
    put_i64(&mut file, 2); // ext[0]
    file.resize(V2_RECLEN * 4, 0);

    for (i, s) in scans.iter().enumerate() {
        file.extend_from_slice(&v2_entry(s, i + 1, starts[i]));
    }
    file.resize((1 + dir_records) * V2_RECLEN * 4, 0);

    for rec in records {
        file.extend_from_slice(&rec);
    }
    file
}

/// Build a v2 container whose directory spans several index extensions with
/// doubling capacity (`gex == 20`): the first extension holds `lex1` slots,
/// each further one twice as many as its predecessor.
pub fn build_v2_doubling(scans: &[SynthScan], lex1: usize) -> Vec<u8> {
    let n = scans.len();
    let entries_per_record = V2_RECLEN / V2_LIND;

    let mut caps = Vec::new();
    let mut covered = 0;
    let mut cap = lex1;
    while covered < n {
        caps.push(cap);
        covered += cap;
        cap *= 2;
    }

    let mut ext_records = Vec::new();
    let mut next_record = 2;
    for &cap in &caps {
        ext_records.push(next_record as i64);
        next_record += cap.div_ceil(entries_per_record);
    }

    let mut records = Vec::new();
    let mut starts = Vec::new();
    for (i, s) in scans.iter().enumerate() {
        let num = if s.deleted {
            0
        } else {
            s.force_num.unwrap_or((i + 1) as i64)
        };
        let rec = v2_obs_record(s, num);
        starts.push(next_record);
        next_record += rec.len() / (V2_RECLEN * 4);
        records.push(rec);
    }

    let mut file = Vec::new();
    put_chars(&mut file, "2A", 4);
    put_i32(&mut file, V2_RECLEN as i32);
    put_i32(&mut file, 1); // kind
    put_i32(&mut file, 1); // vind
    put_i32(&mut file, V2_LIND as i32);
    put_i32(&mut file, 0); // flags
    put_i64(&mut file, (n + 1) as i64); // xnext
    put_i64(&mut file, next_record as i64); // nextrec
    put_i32(&mut file, 1); // nextword
    put_i32(&mut file, lex1 as i32);
    put_i32(&mut file, caps.len() as i32); // nex
    put_i32(&mut file, 20); // gex
    for &rec in &ext_records {
        put_i64(&mut file, rec);
    }
    file.resize(V2_RECLEN * 4, 0);

    let mut slot = 0;
    for &cap in &caps {
        let base = file.len();
        for _ in 0..cap {
            if slot >= n {
                break;
            }
            file.extend_from_slice(&v2_entry(&scans[slot], slot + 1, starts[slot]));
            slot += 1;
        }
        let region = cap.div_ceil(entries_per_record) * V2_RECLEN * 4;
        file.resize(base + region, 0);
    }

    for rec in records {
        file.extend_from_slice(&rec);
    }
    file
}
