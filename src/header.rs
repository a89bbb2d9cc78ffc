//! Decode one scan's header from its observation record.
//!
//! An observation record starts with a version-tagged prologue followed by
//! a table of typed header sections (general, position, spectroscopy,
//! drift, calibration) at declared word addresses. The two container
//! layouts share section payloads but differ in prologue shape and field
//! widths, so decoding dispatches on the ident tag and container kind.
//! Records with an unrecognized tag decode into a minimal
//! [`FormatVersion::Unknown`] header instead of failing the query.

use chrono::{DateTime, Utc};
use log::warn;

use crate::cursor::{word_to_offset, ByteCursor, WORD};
use crate::directory::{DirectoryEntry, FILE_ORDER, V1_BLOCK};
use crate::time::obs_datetime;
use crate::types::{section, FileKind, FormatVersion, ObsKind};
use crate::{ClassError, Result};

const RAD_TO_DEG: f64 = 180.0 / std::f64::consts::PI;

/// General section (-2): time, pointing and system temperature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeneralSection {
    /// UT and sidereal time of day, radians.
    pub ut: f64,
    pub st: f64,
    pub az: f32,
    pub el: f32,
    pub tau: f32,
    pub tsys: f32,
    /// Integration time, seconds.
    pub time: f32,
    pub xunit: i32,
}

/// Position section (-3): source name and sky coordinates, radians.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionSection {
    pub source: String,
    pub system: i32,
    pub epoch: f32,
    pub proj: i32,
    pub lam: f64,
    pub bet: f64,
    pub projang: f64,
    pub lamof: f32,
    pub betof: f32,
    pub sl0p: f64,
    pub sb0p: f64,
    pub sk0p: f64,
}

/// Spectroscopy section (-4): the frequency-axis parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectroSection {
    pub line: String,
    /// Rest frequency, MHz.
    pub restf: f64,
    pub nchan: i32,
    /// Reference channel, 1-based, possibly fractional.
    pub rchan: f32,
    /// Frequency resolution, MHz per channel.
    pub fres: f32,
    pub foff: f32,
    pub vres: f32,
    pub voff: f32,
    pub badl: f32,
    /// Image sideband frequency, MHz.
    pub image: f64,
    pub vtype: i32,
    pub doppler: f64,
}

/// Continuum drift section (-10): axis parameters for drift scans.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DriftSection {
    pub freq: f64,
    pub width: f32,
    pub npoin: i32,
    pub rpoin: f32,
    pub tref: f32,
    pub aref: f32,
    pub apos: f32,
    pub tres: f32,
    pub ares: f32,
    pub badc: f32,
    pub ctype: i32,
    pub cimag: f64,
    pub colla: f32,
    pub colle: f32,
}

/// Calibration section (-14): atmosphere, receiver and site parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationSection {
    pub beeff: f32,
    pub foeff: f32,
    pub gaini: f32,
    pub h2omm: f32,
    pub pamb: f32,
    pub tamb: f32,
    pub tatms: f32,
    pub tchop: f32,
    pub tcold: f32,
    pub taus: f32,
    pub taui: f32,
    pub tatmi: f32,
    pub trec: f32,
    pub cmode: i32,
    pub atfac: f32,
    pub alti: f32,
    pub count: [f32; 3],
    pub lcalof: f32,
    pub bcalof: f32,
    pub geolong: f64,
    pub geolat: f64,
}

/// The decoded header sections of one record; absent sections stay `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObsSections {
    pub general: Option<GeneralSection>,
    pub position: Option<PositionSection>,
    pub spectro: Option<SpectroSection>,
    pub drift: Option<DriftSection>,
    pub calibration: Option<CalibrationSection>,
}

/// Decoded per-scan header.
///
/// A flat summary of the fields most callers want, plus the raw decoded
/// sections. Values are independent copies with no back-reference to the
/// reader that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHeader {
    pub version: FormatVersion,
    /// 1-based directory slot index.
    pub index: usize,
    pub scan: i64,
    pub subscan: i32,
    pub source: String,
    pub line: String,
    pub telescope: String,
    pub kind: ObsKind,
    /// Sky coordinates with pointing offsets applied, degrees.
    pub ra: f64,
    pub dec: f64,
    /// First LO frequency, MHz.
    pub f_lo: f64,
    /// Reference (rest) frequency, MHz.
    pub f_rest: f64,
    /// Frequency resolution, MHz per channel.
    pub f_res: f64,
    pub nchan: i32,
    /// Reference channel, 1-based, possibly fractional.
    pub rchan: f64,
    /// Velocity offset, km/s.
    pub v_offset: f64,
    /// Integration time, seconds.
    pub int_time: f64,
    pub tsys: f64,
    pub utc: DateTime<Utc>,
    /// Raw byte range of the observation record within the file.
    pub record_offset: usize,
    pub record_length: usize,
    pub sections: ObsSections,
}

impl ScanHeader {
    /// Minimal header for a record with an unrecognized ident tag: the
    /// directory-level identity plus the raw byte range, nothing decoded.
    fn minimal(entry: &DirectoryEntry) -> Self {
        Self {
            version: FormatVersion::Unknown,
            index: entry.index,
            scan: entry.scan,
            subscan: entry.subscan,
            source: entry.source.clone(),
            line: entry.line.clone(),
            telescope: entry.telescope.clone(),
            kind: entry.kind,
            ra: 0.0,
            dec: 0.0,
            f_lo: 0.0,
            f_rest: 0.0,
            f_res: 0.0,
            nchan: 0,
            rchan: 0.0,
            v_offset: 0.0,
            int_time: 0.0,
            tsys: 0.0,
            utc: obs_datetime(entry.date_obs, 0.0),
            record_offset: entry.offset,
            record_length: entry.length,
            sections: ObsSections::default(),
        }
    }

    /// Flat (name, value) pairs for tabular rendering.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("index", self.index.to_string()),
            ("scan", self.scan.to_string()),
            ("source", self.source.clone()),
            ("line", self.line.clone()),
            ("telescope", self.telescope.clone()),
            ("ra", format!("{:.4}", self.ra)),
            ("dec", format!("{:.4}", self.dec)),
            ("f_lo", format!("{:.3}", self.f_lo)),
            ("f_rest", format!("{:.3}", self.f_rest)),
            ("f_res", format!("{:.3}", self.f_res)),
            ("nchan", self.nchan.to_string()),
            ("v_offset", format!("{:+.1}", self.v_offset)),
            ("int_time", format!("{:.1}", self.int_time)),
            ("tsys", format!("{:.1}", self.tsys)),
            ("utc", self.utc.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]
    }
}

/// Reference to one header section in a record's section table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionRef {
    pub code: i32,
    /// Declared length, words.
    pub len: i64,
    /// 1-based word address, relative to the record start.
    pub addr: i64,
}

/// Decoded record prologue.
#[derive(Debug, Clone)]
pub(crate) struct Prologue {
    pub version: FormatVersion,
    /// 1-based word address of the data array, relative to the record.
    pub data_word: i64,
    /// Declared data length in words (for v1, the remainder of the record).
    pub data_len: i64,
    pub sections: Vec<SectionRef>,
}

/// Slice out one observation record.
pub(crate) fn record_slice<'a>(data: &'a [u8], entry: &DirectoryEntry) -> Result<&'a [u8]> {
    let end = entry.offset.checked_add(entry.length);
    end.and_then(|end| data.get(entry.offset..end))
        .ok_or(ClassError::Truncated {
            offset: entry.offset,
            needed: entry.length,
            available: data.len().saturating_sub(entry.offset),
        })
}

/// Read the record prologue; `None` means the ident tag is unrecognized.
pub(crate) fn read_prologue(rec: &[u8], kind: FileKind) -> Result<Option<Prologue>> {
    let mut cur = ByteCursor::new(rec);
    let ident = cur.read_bytes(4)?;
    if ident[0] != b'2' {
        return Ok(None);
    }

    match kind {
        FileKind::V1 => {
            let nbl = cur.read_i32(FILE_ORDER)?;
            let _bytes = cur.read_i32(FILE_ORDER)?;
            let _adr = cur.read_i32(FILE_ORDER)?;
            let nhead = cur.read_i32(FILE_ORDER)?;
            let _len = cur.read_i32(FILE_ORDER)?;
            let _ientry = cur.read_i32(FILE_ORDER)?;
            let nsec = cur.read_i32(FILE_ORDER)?;
            let _obsnum = cur.read_i32(FILE_ORDER)?;

            if nhead < 1 || nbl < 1 {
                return Err(ClassError::InvalidHeader(format!(
                    "bad v1 record shape: nbl={nbl} nhead={nhead}"
                )));
            }
            let nsec = clamp_nsec(nsec, 4);
            let mut codes = Vec::with_capacity(nsec);
            let mut lens = Vec::with_capacity(nsec);
            let mut addrs = Vec::with_capacity(nsec);
            for _ in 0..nsec {
                codes.push(cur.read_i32(FILE_ORDER)?);
            }
            for _ in 0..nsec {
                lens.push(cur.read_i32(FILE_ORDER)? as i64);
            }
            for _ in 0..nsec {
                addrs.push(cur.read_i32(FILE_ORDER)? as i64);
            }

            let total_words = (nbl as i64) * (V1_BLOCK / WORD) as i64;
            Ok(Some(Prologue {
                version: FormatVersion::V1,
                data_word: nhead as i64,
                data_len: total_words - (nhead as i64 - 1),
                sections: section_refs(&codes, &lens, &addrs),
            }))
        }
        FileKind::V2 => {
            let version = cur.read_i32(FILE_ORDER)?;
            if version < 1 {
                return Ok(None);
            }
            let nsec = cur.read_i32(FILE_ORDER)?;
            let _nword = cur.read_i64(FILE_ORDER)?;
            let adata = cur.read_i64(FILE_ORDER)?;
            let ldata = cur.read_i64(FILE_ORDER)?;
            let _xnum = cur.read_i64(FILE_ORDER)?;

            if adata < 1 || ldata < 0 {
                return Err(ClassError::InvalidHeader(format!(
                    "bad v2 record shape: adata={adata} ldata={ldata}"
                )));
            }
            let nsec = clamp_nsec(nsec, 10);
            let mut codes = Vec::with_capacity(nsec);
            let mut lens = Vec::with_capacity(nsec);
            let mut addrs = Vec::with_capacity(nsec);
            for _ in 0..nsec {
                codes.push(cur.read_i32(FILE_ORDER)?);
            }
            for _ in 0..nsec {
                lens.push(cur.read_i64(FILE_ORDER)?);
            }
            for _ in 0..nsec {
                addrs.push(cur.read_i64(FILE_ORDER)?);
            }

            Ok(Some(Prologue {
                version: FormatVersion::V2,
                data_word: adata,
                data_len: ldata,
                sections: section_refs(&codes, &lens, &addrs),
            }))
        }
    }
}

fn clamp_nsec(nsec: i32, max: usize) -> usize {
    if nsec < 0 {
        return 0;
    }
    let n = nsec as usize;
    if n > max {
        warn!("record declares {n} header sections, reading the first {max}");
        return max;
    }
    n
}

fn section_refs(codes: &[i32], lens: &[i64], addrs: &[i64]) -> Vec<SectionRef> {
    codes
        .iter()
        .zip(lens.iter())
        .zip(addrs.iter())
        .map(|((&code, &len), &addr)| SectionRef { code, len, addr })
        .collect()
}

/// Decode every recognized section listed in the prologue.
pub(crate) fn decode_sections(rec: &[u8], prologue: &Prologue) -> Result<ObsSections> {
    let mut sections = ObsSections::default();
    for sec in &prologue.sections {
        let offset = word_to_offset(sec.addr).ok_or_else(|| {
            ClassError::InvalidHeader(format!(
                "section {} at bad word address {}",
                sec.code, sec.addr
            ))
        })?;
        if sec.len < 0 {
            return Err(ClassError::InvalidHeader(format!(
                "section {} with negative length {}",
                sec.code, sec.len
            )));
        }
        let mut cur = ByteCursor::new(rec);
        cur.seek(offset)?;

        match sec.code {
            section::GENERAL => sections.general = Some(decode_general(&mut cur, sec.len)?),
            section::POSITION => sections.position = Some(decode_position(&mut cur, sec.len)?),
            section::SPECTRO => sections.spectro = Some(decode_spectro(&mut cur)?),
            section::DRIFT => sections.drift = Some(decode_drift(&mut cur)?),
            section::CALIBRATION => sections.calibration = Some(decode_calibration(&mut cur)?),
            section::BASELINE | section::HISTORY | section::PLOT | section::SWITCH
            | section::GAUSS => {} // recognized but not decoded
            code => warn!("skipping unhandled section code {code}"),
        }
    }
    Ok(sections)
}

fn decode_general(cur: &mut ByteCursor<'_>, len: i64) -> Result<GeneralSection> {
    let mut s = GeneralSection {
        ut: cur.read_f64(FILE_ORDER)?,
        st: cur.read_f64(FILE_ORDER)?,
        az: cur.read_f32(FILE_ORDER)?,
        el: cur.read_f32(FILE_ORDER)?,
        tau: cur.read_f32(FILE_ORDER)?,
        tsys: cur.read_f32(FILE_ORDER)?,
        time: cur.read_f32(FILE_ORDER)?,
        xunit: 0,
    };
    if len > 9 {
        s.xunit = cur.read_i32(FILE_ORDER)?;
    }
    Ok(s)
}

fn decode_position(cur: &mut ByteCursor<'_>, len: i64) -> Result<PositionSection> {
    let mut s = PositionSection {
        source: cur.read_string(12)?,
        ..Default::default()
    };
    if len == 17 {
        // old layout
        s.epoch = cur.read_f32(FILE_ORDER)?;
        s.lam = cur.read_f64(FILE_ORDER)?;
        s.bet = cur.read_f64(FILE_ORDER)?;
        s.lamof = cur.read_f32(FILE_ORDER)?;
        s.betof = cur.read_f32(FILE_ORDER)?;
        s.proj = cur.read_i32(FILE_ORDER)?;
        s.sl0p = cur.read_f64(FILE_ORDER)?;
        s.sb0p = cur.read_f64(FILE_ORDER)?;
        s.sk0p = cur.read_f64(FILE_ORDER)?;
    } else {
        s.system = cur.read_i32(FILE_ORDER)?;
        s.epoch = cur.read_f32(FILE_ORDER)?;
        s.proj = cur.read_i32(FILE_ORDER)?;
        s.lam = cur.read_f64(FILE_ORDER)?;
        s.bet = cur.read_f64(FILE_ORDER)?;
        s.projang = cur.read_f64(FILE_ORDER)?;
        s.lamof = cur.read_f32(FILE_ORDER)?;
        s.betof = cur.read_f32(FILE_ORDER)?;
    }
    Ok(s)
}

fn decode_spectro(cur: &mut ByteCursor<'_>) -> Result<SpectroSection> {
    Ok(SpectroSection {
        line: cur.read_string(12)?,
        restf: cur.read_f64(FILE_ORDER)?,
        nchan: cur.read_i32(FILE_ORDER)?,
        rchan: cur.read_f32(FILE_ORDER)?,
        fres: cur.read_f32(FILE_ORDER)?,
        foff: cur.read_f32(FILE_ORDER)?,
        vres: cur.read_f32(FILE_ORDER)?,
        voff: cur.read_f32(FILE_ORDER)?,
        badl: cur.read_f32(FILE_ORDER)?,
        image: cur.read_f64(FILE_ORDER)?,
        vtype: cur.read_i32(FILE_ORDER)?,
        doppler: cur.read_f64(FILE_ORDER)?,
    })
}

fn decode_drift(cur: &mut ByteCursor<'_>) -> Result<DriftSection> {
    Ok(DriftSection {
        freq: cur.read_f64(FILE_ORDER)?,
        width: cur.read_f32(FILE_ORDER)?,
        npoin: cur.read_i32(FILE_ORDER)?,
        rpoin: cur.read_f32(FILE_ORDER)?,
        tref: cur.read_f32(FILE_ORDER)?,
        aref: cur.read_f32(FILE_ORDER)?,
        apos: cur.read_f32(FILE_ORDER)?,
        tres: cur.read_f32(FILE_ORDER)?,
        ares: cur.read_f32(FILE_ORDER)?,
        badc: cur.read_f32(FILE_ORDER)?,
        ctype: cur.read_i32(FILE_ORDER)?,
        cimag: cur.read_f64(FILE_ORDER)?,
        colla: cur.read_f32(FILE_ORDER)?,
        colle: cur.read_f32(FILE_ORDER)?,
    })
}

fn decode_calibration(cur: &mut ByteCursor<'_>) -> Result<CalibrationSection> {
    Ok(CalibrationSection {
        beeff: cur.read_f32(FILE_ORDER)?,
        foeff: cur.read_f32(FILE_ORDER)?,
        gaini: cur.read_f32(FILE_ORDER)?,
        h2omm: cur.read_f32(FILE_ORDER)?,
        pamb: cur.read_f32(FILE_ORDER)?,
        tamb: cur.read_f32(FILE_ORDER)?,
        tatms: cur.read_f32(FILE_ORDER)?,
        tchop: cur.read_f32(FILE_ORDER)?,
        tcold: cur.read_f32(FILE_ORDER)?,
        taus: cur.read_f32(FILE_ORDER)?,
        taui: cur.read_f32(FILE_ORDER)?,
        tatmi: cur.read_f32(FILE_ORDER)?,
        trec: cur.read_f32(FILE_ORDER)?,
        cmode: cur.read_i32(FILE_ORDER)?,
        atfac: cur.read_f32(FILE_ORDER)?,
        alti: cur.read_f32(FILE_ORDER)?,
        count: [
            cur.read_f32(FILE_ORDER)?,
            cur.read_f32(FILE_ORDER)?,
            cur.read_f32(FILE_ORDER)?,
        ],
        lcalof: cur.read_f32(FILE_ORDER)?,
        bcalof: cur.read_f32(FILE_ORDER)?,
        geolong: cur.read_f64(FILE_ORDER)?,
        geolat: cur.read_f64(FILE_ORDER)?,
    })
}

/// Decode the header of the scan addressed by a directory entry.
pub fn decode_header(data: &[u8], entry: &DirectoryEntry, kind: FileKind) -> Result<ScanHeader> {
    let rec = record_slice(data, entry)?;
    let prologue = match read_prologue(rec, kind)? {
        Some(p) => p,
        None => return Ok(ScanHeader::minimal(entry)),
    };
    let sections = decode_sections(rec, &prologue)?;
    Ok(assemble(entry, prologue.version, sections))
}

pub(crate) fn assemble(
    entry: &DirectoryEntry,
    version: FormatVersion,
    sections: ObsSections,
) -> ScanHeader {
    let general = sections.general.clone().unwrap_or_default();
    let position = sections.position.clone().unwrap_or_default();

    // Axis parameters come from the spectroscopy section for spectra and
    // from the drift section for everything else.
    let (f_rest, image, f_res, nchan, rchan, v_offset) = match entry.kind {
        ObsKind::Spectrum => {
            let s = sections.spectro.clone().unwrap_or_default();
            (
                s.restf,
                s.image,
                s.fres as f64,
                s.nchan,
                s.rchan as f64,
                s.voff as f64,
            )
        }
        _ => {
            let d = sections.drift.clone().unwrap_or_default();
            (
                d.tref as f64,
                d.cimag,
                d.tres as f64,
                d.npoin,
                d.rpoin as f64,
                0.0,
            )
        }
    };
    let f_lo = match entry.kind {
        ObsKind::Spectrum => (f_rest + image) / 2.0,
        _ => {
            let d = sections.drift.clone().unwrap_or_default();
            (d.freq + d.cimag) / 2.0
        }
    };

    let ra = (position.lam + position.lamof as f64 / position.bet.cos()) * RAD_TO_DEG;
    let dec = (position.bet + position.betof as f64) * RAD_TO_DEG;

    ScanHeader {
        version,
        index: entry.index,
        scan: entry.scan,
        subscan: entry.subscan,
        source: entry.source.clone(),
        line: entry.line.clone(),
        telescope: entry.telescope.clone(),
        kind: entry.kind,
        ra,
        dec,
        f_lo,
        f_rest,
        f_res,
        nchan,
        rchan,
        v_offset,
        int_time: general.time as f64,
        tsys: general.tsys as f64,
        utc: obs_datetime(entry.date_obs, general.ut),
        record_offset: entry.offset,
        record_length: entry.length,
        sections,
    }
}
