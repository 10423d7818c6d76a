//! This crate implements retracing of obfuscated Java stack traces with
//! proguard mapping files.
//!
//! The main use case is to re-map whole crash logs, but the building blocks
//! can also be used on their own: [`MappingReader`] parses a mapping line by
//! line, [`FrameRemapper`] re-maps single frames and [`FramePattern`] parses
//! and formats frames in arbitrary line formats.
//!
//! # Examples
//!
//! ```
//! use proguard_retrace::{FrameInfo, FrameRemapper, Retrace, RetraceOptions};
//!
//! let mapping = "\
//! android.arch.core.internal.SafeIterableMap -> a.a.a.b.c:
//!     13:13:java.util.Map$Entry eldest():168:168 -> a
//! ";
//!
//! // re-map a single frame
//! let remapper = FrameRemapper::from(mapping);
//! assert_eq!(
//!     remapper.transform(&FrameInfo::with_method("a.a.a.b.c", "a", 13)),
//!     vec![FrameInfo::with_method("android.arch.core.internal.SafeIterableMap", "eldest", 168)
//!         .with_source_file("SafeIterableMap.java")
//!         .with_type("java.util.Map$Entry")],
//! );
//!
//! // re-map a stack trace
//! let retrace = Retrace::new(remapper, &RetraceOptions::default()).unwrap();
//! assert_eq!(
//!     retrace.retrace_str("    at a.a.a.b.c.a(SourceFile:13)\n"),
//!     "    at android.arch.core.internal.SafeIterableMap.eldest(SafeIterableMap.java:168)\n",
//! );
//! ```

#![warn(missing_docs)]

mod error;
mod frame;
mod mapper;
mod mapping;
mod pattern;
mod retrace;
mod utils;

pub use error::{Error, Result};
pub use frame::FrameInfo;
pub use mapper::FrameRemapper;
pub use mapping::{
    FieldMapping, LineMapping, MappingProcessor, MappingReader, MappingRecord, MethodMapping,
    ParseError, ParseErrorKind,
};
pub use pattern::{FramePattern, MAX_PLACEHOLDERS};
pub use retrace::{Retrace, RetraceOptions, DEFAULT_TEMPLATE, SECONDARY_TEMPLATE};
pub use utils::{external_class_name, internal_class_name};
