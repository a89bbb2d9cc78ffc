//! Pure Rust reader for GILDAS CLASS / APEX "CLASSIC" observation files.
//!
//! A CLASSIC container holds many independent spectral observations
//! ("scans"), each with pointing, time, receiver and spectral-axis
//! metadata plus one stored intensity array. The file carries an internal
//! directory mapping scan slots to byte locations; per-scan headers are
//! version-tagged and the frequency axis is reconstructed arithmetically
//! from header parameters, never read from the file.
//!
//! Zero `unsafe`, zero C dependencies. Read-only: there is no write or
//! encode path. Both container layouts (`"1A"` fixed 512-byte blocks and
//! `"2A"` declared record length) decode through the same API, and a file
//! with a partially corrupt directory still serves its good scans.
//!
//! # Reading a file
//!
//! ```no_run
//! use classic_rs::ClassReader;
//!
//! # fn main() -> classic_rs::Result<()> {
//! let reader = ClassReader::open("survey-2016-06-08.apex")?;
//! println!("{} scans", reader.scan_count());
//!
//! let header = reader.header(1)?;
//! println!("{} {} @ {:.3} MHz", header.source, header.line, header.f_rest);
//!
//! let spectrum = reader.spectrum(1)?;
//! assert_eq!(spectrum.frequency.len(), spectrum.data.len());
//! # Ok(())
//! # }
//! ```
//!
//! Headers and spectra are plain owned values; they stay valid after the
//! reader is dropped. Queries on a shared reader are safe from multiple
//! threads because the reader addresses an immutable in-memory buffer.

pub mod cursor;
pub mod directory;
pub mod error;
pub mod header;
pub mod reader;
pub mod spectrum;
pub mod time;
pub mod types;

pub use cursor::ByteCursor;
pub use directory::{Directory, DirectoryEntry, EntryFlags, FileDescriptor, SkippedEntry};
pub use error::{ClassError, Result};
pub use header::{
    CalibrationSection, DriftSection, GeneralSection, ObsSections, PositionSection, ScanHeader,
    SpectroSection,
};
pub use reader::{version_label, ClassReader};
pub use spectrum::{frequency_axis, Spectrum, MAX_CHANNELS};
pub use types::{ByteOrder, FileKind, FormatVersion, ObsKind};
