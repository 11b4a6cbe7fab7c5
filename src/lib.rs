//! # SPR File
//!
//! Reader, writer and validator for fixed-width Standard Payment Request
//! files: 850-character records describing ACH and check payments grouped
//! into schedules.
//!
//! ## Design Principles
//!
//! - **Declarative layouts**: every record kind is a table of field
//!   definitions in [`registry`]; codecs never hard-code offsets
//! - **Streaming reads**: payments can be visited one group at a time
//! - **All-or-nothing writes**: every formatting problem is reported before
//!   a single byte is written
//! - **Explicit policies**: extraction, numeric, truncation and error
//!   handling are configured, never guessed
//!
//! ## Example
//!
//! ```no_run
//! use spr_file::{Reader, Validator};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let input = BufReader::new(File::open("payments.spr").unwrap());
//! let file = Reader::new(input).read().unwrap();
//! for err in Validator::default().collect(&file) {
//!     eprintln!("{}", err);
//! }
//! ```

pub mod builder;
pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod model;
pub mod money;
pub mod reader;
pub mod reconcilement;
pub mod registry;
pub mod summary;
pub mod validate;
pub mod writer;

pub use builder::{AchScheduleBuilder, CheckScheduleBuilder, FileBuilder};
pub use config::{
    ErrorPolicy, ExtractPolicy, NumericPolicy, ReaderConfig, TruncationPolicy, ValidatorConfig,
    WriterConfig,
};
pub use decode::{Decoder, Record};
pub use encode::Encoder;
pub use error::{
    BalancingError, ExtractionError, FieldProblem, FormatErrors, ProblemKind, Result, SprError,
    ValidationError,
};
pub use model::{
    AchPayment, AchSchedule, AchScheduleHeader, Addendum, AddendumKind, CarsTasBetc, CheckPayment,
    CheckSchedule, CheckScheduleHeader, CheckStub, Dnp, File, FileHeader, FileTrailer, Payment,
    PaymentRef, Schedule, ScheduleHeader, ScheduleTrailer, Totals,
};
pub use money::Dollars;
pub use reader::{ReadStats, Reader, StructureSummary, Visitor};
pub use reconcilement::Agency;
pub use registry::{FieldDef, FieldKind, RecordTag, RECORD_LENGTH};
pub use summary::{FileSummary, PaymentListing};
pub use validate::Validator;
pub use writer::Writer;
