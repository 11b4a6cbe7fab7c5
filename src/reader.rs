//! Streaming reader for fixed-width payment files.
//!
//! The reader walks the file as a small state machine:
//!
//! ```text
//! H  (01 | 11) payment-group* T  ...  E
//! payment-group := 02 (03 | 04 | G | DD)*  or  12 (13 | G | DD)*
//! ```
//!
//! A one-line pushback slot lets a payment group end as soon as the next
//! record is not one of its associated records. The same machine backs
//! every mode: a full [`File`] tree, a payment-at-a-time callback, a
//! [`Visitor`] with early termination and a structure-only pass.
//!
//! Header and trailer ordering errors always end the read. Malformed
//! records (bad length, unknown tag, undecodable payment or associated
//! record, orphaned or mismatched associated record) obey the configured
//! [`ErrorPolicy`].

use crate::config::{ErrorPolicy, ReaderConfig};
use crate::decode::{check_length, Decoder, Record};
use crate::error::{Result, SprError};
use crate::model::{
    AchSchedule, CheckSchedule, File, FileHeader, FileTrailer, Payment, Schedule, ScheduleHeader,
    ScheduleTrailer,
};
use crate::registry::RecordTag;
use crate::validate::validate_file_header;
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, Read};
use std::ops::ControlFlow;

/// Counters kept while reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadStats {
    pub lines_processed: u64,
    pub bytes_processed: u64,
    pub payments_processed: u64,
    pub schedules_processed: u64,
    pub errors_encountered: u64,
}

/// Result of a structure-only pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureSummary {
    /// Well-framed records seen, headers and trailers included.
    pub records: u64,
    pub schedules: u64,
    pub payments: u64,
}

/// Callbacks for [`Reader::stream`]. Returning `Break` stops the read.
pub trait Visitor {
    fn on_schedule(&mut self, _header: ScheduleHeader<'_>, _index: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn on_payment(&mut self, _payment: &Payment, _schedule: usize, _index: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Every well-framed physical record, before it is decoded. `stats`
    /// already counts this line.
    fn on_record(
        &mut self,
        _tag: RecordTag,
        _line: usize,
        _raw: &str,
        _stats: &ReadStats,
    ) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

/// Receives decoded pieces from the state machine.
trait Sink {
    /// Whether associated records are decoded and attached to payments.
    fn wants_associated(&self) -> bool {
        true
    }

    fn file_header(&mut self, _header: FileHeader) {}

    fn schedule(&mut self, _schedule: Schedule, _index: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn payment(&mut self, _payment: Payment, _schedule: usize, _index: usize) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn schedule_trailer(&mut self, _trailer: ScheduleTrailer) {}

    fn file_trailer(&mut self, _trailer: FileTrailer) {}

    fn record(&mut self, _tag: RecordTag, _line: usize, _raw: &str, _stats: &ReadStats) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

#[derive(Default)]
struct TreeSink {
    file: File,
}

impl Sink for TreeSink {
    fn file_header(&mut self, header: FileHeader) {
        self.file.header = Some(header);
    }

    fn schedule(&mut self, schedule: Schedule, _index: usize) -> ControlFlow<()> {
        self.file.schedules.push(schedule);
        ControlFlow::Continue(())
    }

    fn payment(&mut self, payment: Payment, _schedule: usize, _index: usize) -> ControlFlow<()> {
        match (self.file.schedules.last_mut(), payment) {
            (Some(Schedule::Ach(s)), Payment::Ach(p)) => s.payments.push(p),
            (Some(Schedule::Check(s)), Payment::Check(p)) => s.payments.push(p),
            // The state machine only opens groups of the schedule's own kind.
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn schedule_trailer(&mut self, trailer: ScheduleTrailer) {
        if let Some(schedule) = self.file.schedules.last_mut() {
            *schedule.trailer_mut() = Some(trailer);
        }
    }

    fn file_trailer(&mut self, trailer: FileTrailer) {
        self.file.trailer = Some(trailer);
    }
}

struct PaymentSink<F>(F);

impl<F: FnMut(&Payment, usize, usize)> Sink for PaymentSink<F> {
    fn wants_associated(&self) -> bool {
        false
    }

    fn payment(&mut self, payment: Payment, schedule: usize, index: usize) -> ControlFlow<()> {
        (self.0)(&payment, schedule, index);
        ControlFlow::Continue(())
    }
}

struct VisitorSink<'v, V>(&'v mut V);

impl<V: Visitor> Sink for VisitorSink<'_, V> {
    fn schedule(&mut self, schedule: Schedule, index: usize) -> ControlFlow<()> {
        self.0.on_schedule(schedule.header(), index)
    }

    fn payment(&mut self, payment: Payment, schedule: usize, index: usize) -> ControlFlow<()> {
        self.0.on_payment(&payment, schedule, index)
    }

    fn record(&mut self, tag: RecordTag, line: usize, raw: &str, stats: &ReadStats) -> ControlFlow<()> {
        self.0.on_record(tag, line, raw, stats)
    }
}

struct RawLine {
    number: usize,
    text: String,
}

struct OpenSchedule {
    index: usize,
    number: String,
    payment_tag: RecordTag,
    sec_code: String,
    payments: usize,
}

enum State {
    ExpectFileHeader,
    ExpectSchedule,
    InSchedule(OpenSchedule),
    Done,
}

fn unexpected(tag: RecordTag, message: impl Into<String>) -> SprError {
    SprError::UnexpectedRecord {
        tag: tag.code().to_string(),
        message: message.into(),
    }
}

/// Adds an associated record to its payment after checking the payment ID.
fn attach(payment: &mut Payment, record: Record) -> Result<()> {
    let (tag, id) = match &record {
        Record::Addendum(a) => (a.kind.record_tag(), a.payment_id.as_str()),
        Record::CheckStub(s) => (RecordTag::CheckStub, s.payment_id.as_str()),
        Record::CarsTasBetc(c) => (RecordTag::CarsTasBetc, c.payment_id.as_str()),
        Record::Dnp(d) => (RecordTag::Dnp, d.payment_id.as_str()),
        _ => return Err(unexpected(payment.record_tag(), "record is not part of a payment group")),
    };
    if id.trim() != payment.payment_id().trim() {
        return Err(unexpected(
            tag,
            format!(
                "payment ID {:?} does not match payment {:?}",
                id.trim(),
                payment.payment_id().trim()
            ),
        ));
    }

    match (payment, record) {
        (Payment::Ach(p), Record::Addendum(a)) => p.addenda.push(a),
        (Payment::Ach(p), Record::CarsTasBetc(c)) => p.cars_tas_betc.push(c),
        (Payment::Check(p), Record::CarsTasBetc(c)) => p.cars_tas_betc.push(c),
        (Payment::Ach(p), Record::Dnp(d)) => set_once(&mut p.dnp, d, RecordTag::Dnp)?,
        (Payment::Check(p), Record::Dnp(d)) => set_once(&mut p.dnp, d, RecordTag::Dnp)?,
        (Payment::Check(p), Record::CheckStub(s)) => set_once(&mut p.stub, s, RecordTag::CheckStub)?,
        _ => return Err(unexpected(tag, "record does not belong to this kind of payment")),
    }
    Ok(())
}

fn set_once<T>(slot: &mut Option<T>, value: T, tag: RecordTag) -> Result<()> {
    if slot.is_some() {
        return Err(unexpected(tag, "payment already has one"));
    }
    *slot = Some(value);
    Ok(())
}

/// Fixed-width file reader over any buffered byte source.
pub struct Reader<R> {
    source: R,
    config: ReaderConfig,
    decoder: Decoder,
    pending: Option<RawLine>,
    line_number: usize,
    stats: ReadStats,
    errors: Vec<SprError>,
}

impl<R: BufRead> Reader<R> {
    pub fn new(source: R) -> Self {
        Reader::with_config(source, ReaderConfig::default())
    }

    pub fn with_config(source: R, config: ReaderConfig) -> Self {
        Reader {
            source,
            decoder: Decoder::from_config(&config),
            config,
            pending: None,
            line_number: 0,
            stats: ReadStats::default(),
            errors: Vec::new(),
        }
    }

    /// Reads the whole file into a tree.
    pub fn read(&mut self) -> Result<File> {
        let mut sink = TreeSink::default();
        self.drive(&mut sink)?;
        info!(
            "read {} lines: {} schedule(s), {} payment(s), {} error(s)",
            self.stats.lines_processed,
            self.stats.schedules_processed,
            self.stats.payments_processed,
            self.stats.errors_encountered
        );
        Ok(sink.file)
    }

    /// Calls `f` with each payment, its schedule index and its index within
    /// the schedule. Associated records are framed and skipped without being
    /// decoded, so payments arrive without addenda, stubs or DNP records.
    pub fn for_each_payment<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&Payment, usize, usize),
    {
        self.drive(&mut PaymentSink(f))
    }

    /// Drives `visitor` until the file ends or it returns `Break`.
    pub fn stream<V: Visitor>(&mut self, visitor: &mut V) -> Result<()> {
        self.drive(&mut VisitorSink(visitor))
    }

    /// Checks framing and header/trailer placement without decoding fields.
    pub fn verify_structure(&mut self) -> Result<StructureSummary> {
        let mut summary = StructureSummary::default();
        let mut saw_header = false;
        let mut saw_trailer = false;

        while let Some(raw) = self.next_line()? {
            if saw_trailer {
                let err = SprError::UnexpectedRecord {
                    tag: raw.text.chars().take(2).collect(),
                    message: "record after the file trailer".into(),
                };
                return Err(self.fatal(err, raw.number));
            }
            let tag = match self.frame(&raw) {
                Ok(tag) => tag,
                Err(e) => {
                    self.record_error(e.at_line(raw.number))?;
                    continue;
                }
            };
            summary.records += 1;

            match tag {
                RecordTag::FileHeader if saw_header => {
                    return Err(self.fatal(unexpected(tag, "duplicate file header"), raw.number));
                }
                RecordTag::FileHeader => saw_header = true,
                _ if !saw_header => {
                    return Err(self.fatal(
                        unexpected(tag, "file must begin with a file header"),
                        raw.number,
                    ));
                }
                RecordTag::FileTrailer => saw_trailer = true,
                RecordTag::AchScheduleHeader | RecordTag::CheckScheduleHeader => {
                    summary.schedules += 1;
                    self.stats.schedules_processed += 1;
                }
                RecordTag::AchPayment | RecordTag::CheckPayment => {
                    summary.payments += 1;
                    self.stats.payments_processed += 1;
                }
                _ => {}
            }
        }

        let missing = if !saw_header {
            Some("file header")
        } else if !saw_trailer {
            Some("file trailer")
        } else if summary.schedules == 0 {
            Some("schedule")
        } else {
            None
        };
        if let Some(what) = missing {
            self.stats.errors_encountered += 1;
            return Err(SprError::MissingRecord(what));
        }
        debug!("structure ok: {:?}", summary);
        Ok(summary)
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Errors buffered under [`ErrorPolicy::SkipAndCollect`].
    pub fn errors(&self) -> &[SprError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<SprError> {
        std::mem::take(&mut self.errors)
    }

    fn next_line(&mut self) -> Result<Option<RawLine>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut buf = Vec::with_capacity(crate::registry::RECORD_LENGTH + 2);
        let read = self.source.read_until(b'\n', &mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        self.stats.lines_processed += 1;
        self.stats.bytes_processed += read as u64;

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        let text = match String::from_utf8(buf) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Ok(Some(RawLine {
            number: self.line_number,
            text,
        }))
    }

    fn unread(&mut self, line: RawLine) {
        self.pending = Some(line);
    }

    fn frame(&self, raw: &RawLine) -> Result<RecordTag> {
        check_length(&raw.text)?;
        RecordTag::of_line(&raw.text)
    }

    /// Applies the error policy to a malformed record.
    fn record_error(&mut self, err: SprError) -> Result<()> {
        self.stats.errors_encountered += 1;
        match self.config.error_policy {
            ErrorPolicy::FailFast => Err(err),
            ErrorPolicy::SkipAndCollect => {
                warn!("skipping record: {}", err);
                if self.errors.len() < self.config.max_collected_errors {
                    self.errors.push(err);
                }
                Ok(())
            }
        }
    }

    fn fatal(&mut self, err: SprError, line: usize) -> SprError {
        self.stats.errors_encountered += 1;
        err.at_line(line)
    }

    fn drive<S: Sink>(&mut self, sink: &mut S) -> Result<()> {
        let mut state = State::ExpectFileHeader;
        while let Some(raw) = self.next_line()? {
            let tag = match self.frame(&raw) {
                Ok(tag) => tag,
                Err(e) => {
                    self.record_error(e.at_line(raw.number))?;
                    continue;
                }
            };
            if sink.record(tag, raw.number, &raw.text, &self.stats).is_break() {
                debug!("stopped by caller at line {}", raw.number);
                return Ok(());
            }
            state = match self.step(sink, state, tag, raw)? {
                Some(next) => next,
                None => {
                    debug!("stopped by caller");
                    return Ok(());
                }
            };
        }

        let missing = match state {
            State::Done => return Ok(()),
            State::ExpectFileHeader => "file header",
            State::ExpectSchedule => "file trailer",
            State::InSchedule(_) => "schedule trailer",
        };
        self.stats.errors_encountered += 1;
        Err(SprError::MissingRecord(missing))
    }

    /// Advances the state machine by one record; `None` means the sink
    /// asked to stop.
    fn step<S: Sink>(
        &mut self,
        sink: &mut S,
        state: State,
        tag: RecordTag,
        raw: RawLine,
    ) -> Result<Option<State>> {
        let line = raw.number;
        match (state, tag) {
            (State::ExpectFileHeader, RecordTag::FileHeader) => {
                let header = self
                    .decoder
                    .file_header(&raw.text)
                    .map_err(|e| self.fatal(e, line))?;
                if self.config.validate_header {
                    validate_file_header(&header).map_err(|e| self.fatal(e, line))?;
                }
                debug!("file header from {:?}", header.input_system.trim());
                sink.file_header(header);
                Ok(Some(State::ExpectSchedule))
            }
            (State::ExpectFileHeader, _) => {
                Err(self.fatal(unexpected(tag, "file must begin with a file header"), line))
            }

            (State::ExpectSchedule, RecordTag::AchScheduleHeader) => {
                let header = self
                    .decoder
                    .ach_schedule_header(&raw.text)
                    .map_err(|e| self.fatal(e, line))?;
                let open = OpenSchedule {
                    index: self.stats.schedules_processed as usize,
                    number: header.schedule_number.trim().to_string(),
                    payment_tag: RecordTag::AchPayment,
                    sec_code: header.standard_entry_class_code.clone(),
                    payments: 0,
                };
                let schedule = Schedule::Ach(AchSchedule {
                    header,
                    ..AchSchedule::default()
                });
                self.open_schedule(sink, schedule, open)
            }
            (State::ExpectSchedule, RecordTag::CheckScheduleHeader) => {
                let header = self
                    .decoder
                    .check_schedule_header(&raw.text)
                    .map_err(|e| self.fatal(e, line))?;
                let open = OpenSchedule {
                    index: self.stats.schedules_processed as usize,
                    number: header.schedule_number.trim().to_string(),
                    payment_tag: RecordTag::CheckPayment,
                    sec_code: String::new(),
                    payments: 0,
                };
                let schedule = Schedule::Check(CheckSchedule {
                    header,
                    ..CheckSchedule::default()
                });
                self.open_schedule(sink, schedule, open)
            }
            (State::ExpectSchedule, RecordTag::FileTrailer) => {
                let trailer = self
                    .decoder
                    .file_trailer(&raw.text)
                    .map_err(|e| self.fatal(e, line))?;
                sink.file_trailer(trailer);
                Ok(Some(State::Done))
            }
            (State::ExpectSchedule, _) => Err(self.fatal(
                unexpected(tag, "expected a schedule header or the file trailer"),
                line,
            )),

            (State::InSchedule(open), RecordTag::ScheduleTrailer) => {
                let trailer = self
                    .decoder
                    .schedule_trailer(&raw.text)
                    .map_err(|e| self.fatal(e, line))?;
                debug!("schedule {} closed after {} payment(s)", open.number, open.payments);
                sink.schedule_trailer(trailer);
                Ok(Some(State::ExpectSchedule))
            }
            (State::InSchedule(mut open), t) if t == open.payment_tag => {
                match self.payment_group(sink, &mut open, raw)? {
                    ControlFlow::Continue(()) => Ok(Some(State::InSchedule(open))),
                    ControlFlow::Break(()) => Ok(None),
                }
            }
            (State::InSchedule(open), RecordTag::AchPayment | RecordTag::CheckPayment) => {
                let err = unexpected(tag, format!("wrong payment kind for schedule {}", open.number));
                self.record_error(err.at_line(line))?;
                Ok(Some(State::InSchedule(open)))
            }
            (State::InSchedule(open), t)
                if t.is_associated_with(RecordTag::AchPayment)
                    || t.is_associated_with(RecordTag::CheckPayment) =>
            {
                let err = unexpected(t, "no payment to attach to");
                self.record_error(err.at_line(line))?;
                Ok(Some(State::InSchedule(open)))
            }
            (State::InSchedule(open), _) => Err(self.fatal(
                unexpected(
                    tag,
                    format!("schedule {} is not closed by a schedule trailer", open.number),
                ),
                line,
            )),

            (State::Done, _) => Err(self.fatal(unexpected(tag, "record after the file trailer"), line)),
        }
    }

    fn open_schedule<S: Sink>(
        &mut self,
        sink: &mut S,
        schedule: Schedule,
        open: OpenSchedule,
    ) -> Result<Option<State>> {
        debug!("schedule {} opened", open.number);
        self.stats.schedules_processed += 1;
        match sink.schedule(schedule, open.index) {
            ControlFlow::Continue(()) => Ok(Some(State::InSchedule(open))),
            ControlFlow::Break(()) => Ok(None),
        }
    }

    /// Decodes a payment and every associated record that follows it.
    fn payment_group<S: Sink>(
        &mut self,
        sink: &mut S,
        open: &mut OpenSchedule,
        raw: RawLine,
    ) -> Result<ControlFlow<()>> {
        let decoded = match open.payment_tag {
            RecordTag::AchPayment => self.decoder.ach_payment(&raw.text).map(|mut p| {
                p.standard_entry_class_code = open.sec_code.clone();
                Payment::Ach(p)
            }),
            _ => self.decoder.check_payment(&raw.text).map(Payment::Check),
        };
        let mut payment = match decoded {
            Ok(payment) => Some(payment),
            Err(e) => {
                self.record_error(e.at_line(raw.number))?;
                None
            }
        };

        while let Some(next) = self.next_line()? {
            let tag = match self.frame(&next) {
                Ok(tag) => tag,
                Err(e) => {
                    self.record_error(e.at_line(next.number))?;
                    continue;
                }
            };
            if !tag.is_associated_with(open.payment_tag) {
                self.unread(next);
                break;
            }
            if sink.record(tag, next.number, &next.text, &self.stats).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            if !sink.wants_associated() {
                continue;
            }
            if let Some(p) = payment.as_mut() {
                let attached = self
                    .decoder
                    .decode_record(&next.text)
                    .and_then(|record| attach(p, record));
                if let Err(e) = attached {
                    self.record_error(e.at_line(next.number))?;
                }
            }
        }

        let Some(payment) = payment else {
            return Ok(ControlFlow::Continue(()));
        };
        let index = open.payments;
        open.payments += 1;
        self.stats.payments_processed += 1;
        Ok(sink.payment(payment, open.index, index))
    }
}

/// Reads a whole file from any byte source with the default configuration.
pub fn read_file<R: Read>(source: R) -> Result<File> {
    Reader::new(BufReader::new(source)).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AchPayment, Addendum, AddendumKind, CheckPayment, Dnp};
    use crate::writer;

    fn sample() -> File {
        let mut p1 = AchPayment::new("P1", "JANE", 100_000, "021000021", "1234", "22");
        p1.standard_entry_class_code = "PPD".into();
        p1.addenda.push(Addendum {
            kind: AddendumKind::Plain,
            payment_id: "P1".into(),
            addenda_information: "INVOICE 7".into(),
        });
        let mut p2 = AchPayment::new("P2", "JOHN", 200_000, "021000021", "5678", "22");
        p2.standard_entry_class_code = "PPD".into();
        p2.dnp = Some(Dnp {
            payment_id: "P2".into(),
            dnp_detail: "DNP".into(),
        });
        let check = CheckPayment::new("C1", "ACME", 50, "1 MAIN ST");

        let mut file = File {
            header: Some(FileHeader::new("SYS")),
            schedules: vec![
                Schedule::Ach(AchSchedule {
                    header: crate::model::AchScheduleHeader {
                        schedule_number: "1".into(),
                        standard_entry_class_code: "PPD".into(),
                        ..Default::default()
                    },
                    payments: vec![p1, p2],
                    trailer: None,
                }),
                Schedule::Check(CheckSchedule {
                    header: crate::model::CheckScheduleHeader {
                        schedule_number: "2".into(),
                        ..Default::default()
                    },
                    payments: vec![check],
                    trailer: None,
                }),
            ],
            trailer: None,
        };
        file.recalculate_trailers();
        file
    }

    fn text() -> String {
        writer::to_string(&sample()).unwrap()
    }

    fn lines(text: &str) -> Vec<String> {
        text.split_terminator('\n').map(str::to_string).collect()
    }

    fn join(lines: &[String]) -> String {
        lines.iter().map(|l| format!("{l}\n")).collect()
    }

    #[test]
    fn test_read_builds_tree() {
        let text = text();
        let mut reader = Reader::new(text.as_bytes());
        let file = reader.read().unwrap();
        assert_eq!(file.schedules.len(), 2);
        assert_eq!(file.payment_count(), 3);
        match &file.schedules[0] {
            Schedule::Ach(s) => {
                assert_eq!(s.payments[0].addenda.len(), 1);
                assert_eq!(s.payments[0].standard_entry_class_code, "PPD");
                assert!(s.payments[1].dnp.is_some());
            }
            Schedule::Check(_) => panic!("expected ACH schedule first"),
        }
        let stats = reader.stats();
        assert_eq!(stats.lines_processed, 11);
        assert_eq!(stats.bytes_processed, 11 * 851);
        assert_eq!(stats.payments_processed, 3);
        assert_eq!(stats.schedules_processed, 2);
        assert_eq!(stats.errors_encountered, 0);
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = text().replace('\n', "\r\n");
        let file = Reader::new(text.as_bytes()).read().unwrap();
        assert_eq!(file.payment_count(), 3);
    }

    #[test]
    fn test_for_each_payment_sees_indexes() {
        let text = text();
        let mut seen = Vec::new();
        Reader::new(text.as_bytes())
            .for_each_payment(|p, s, i| seen.push((p.payment_id().trim().to_string(), s, i)))
            .unwrap();
        assert_eq!(
            seen,
            vec![("P1".to_string(), 0, 0), ("P2".to_string(), 0, 1), ("C1".to_string(), 1, 0)]
        );
    }

    #[test]
    fn test_payment_only_mode_skips_associated_records() {
        let mut rows = lines(&text());
        rows[3].replace_range(2..4, "PX");
        let mut addenda = 0;
        Reader::new(join(&rows).as_bytes())
            .for_each_payment(|p, _, _| {
                if let Payment::Ach(p) = p {
                    addenda += p.addenda.len();
                }
            })
            .unwrap();
        assert_eq!(addenda, 0);
    }

    struct FirstPayment {
        records: usize,
        ids: Vec<String>,
    }

    impl Visitor for FirstPayment {
        fn on_payment(&mut self, payment: &Payment, _: usize, _: usize) -> ControlFlow<()> {
            self.ids.push(payment.payment_id().trim().to_string());
            ControlFlow::Break(())
        }

        fn on_record(&mut self, _: RecordTag, _: usize, _: &str, _: &ReadStats) -> ControlFlow<()> {
            self.records += 1;
            ControlFlow::Continue(())
        }
    }

    #[derive(Default)]
    struct Progress {
        seen: Vec<(usize, u64, u64)>,
    }

    impl Visitor for Progress {
        fn on_record(&mut self, _: RecordTag, line: usize, _: &str, stats: &ReadStats) -> ControlFlow<()> {
            self.seen.push((line, stats.lines_processed, stats.payments_processed));
            ControlFlow::Continue(())
        }
    }

    #[test]
    fn test_visitor_sees_running_stats() {
        let text = text();
        let mut progress = Progress::default();
        Reader::new(text.as_bytes()).stream(&mut progress).unwrap();
        assert_eq!(progress.seen.len(), 11);
        assert!(progress.seen.iter().all(|&(line, lines, _)| lines == line as u64));
        assert_eq!(progress.seen[0], (1, 1, 0));
        assert_eq!(progress.seen[10].2, 3);
    }

    #[test]
    fn test_visitor_can_stop_early() {
        let text = text();
        let mut visitor = FirstPayment {
            records: 0,
            ids: Vec::new(),
        };
        let mut reader = Reader::new(text.as_bytes());
        reader.stream(&mut visitor).unwrap();
        assert_eq!(visitor.ids, vec!["P1"]);
        // H, 01, 02 and 03; the next 02 is only looked at, not reported.
        assert_eq!(visitor.records, 4);
        assert!(reader.stats().lines_processed < 11);
    }

    #[test]
    fn test_mismatched_payment_id_is_rejected() {
        let mut rows = lines(&text());
        rows[3].replace_range(2..4, "PX");
        let err = Reader::new(join(&rows).as_bytes()).read().unwrap_err();
        assert_eq!(err.line(), Some(4));
        assert!(matches!(err.inner(), SprError::UnexpectedRecord { tag, .. } if tag == "03"));
    }

    #[test]
    fn test_skip_and_collect_continues() {
        let mut rows = lines(&text());
        rows[3].truncate(800);
        let input = join(&rows);
        let mut reader = Reader::with_config(input.as_bytes(), ReaderConfig::skip_and_collect(10));
        let file = reader.read().unwrap();
        assert_eq!(file.payment_count(), 3);
        assert_eq!(reader.errors().len(), 1);
        assert_eq!(reader.errors()[0].line(), Some(4));
        assert!(matches!(
            reader.errors()[0].inner(),
            SprError::RecordLength { actual: 800, .. }
        ));
        assert_eq!(reader.stats().errors_encountered, 1);
    }

    #[test]
    fn test_error_buffer_is_capped() {
        let mut rows = lines(&text());
        rows[3].truncate(10);
        rows[5].truncate(10);
        let input = join(&rows);
        let mut reader = Reader::with_config(input.as_bytes(), ReaderConfig::skip_and_collect(1));
        reader.read().unwrap();
        assert_eq!(reader.errors().len(), 1);
        assert_eq!(reader.stats().errors_encountered, 2);
    }

    #[test]
    fn test_ordering_errors_are_fatal_even_when_skipping() {
        let mut rows = lines(&text());
        rows.swap(0, 1);
        let err = Reader::with_config(join(&rows).as_bytes(), ReaderConfig::skip_and_collect(10))
            .read()
            .unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(matches!(err.inner(), SprError::UnexpectedRecord { .. }));
    }

    #[test]
    fn test_missing_trailer() {
        let mut rows = lines(&text());
        rows.pop();
        let err = Reader::new(join(&rows).as_bytes()).read().unwrap_err();
        assert!(matches!(err, SprError::MissingRecord("file trailer")));
    }

    #[test]
    fn test_unsupported_version_rejected_unless_disabled() {
        let mut rows = lines(&text());
        rows[0].replace_range(42..45, "501");
        let err = Reader::new(join(&rows).as_bytes()).read().unwrap_err();
        assert_eq!(err.rule(), Some("version"));

        let config = ReaderConfig {
            validate_header: false,
            ..ReaderConfig::default()
        };
        assert!(Reader::with_config(join(&rows).as_bytes(), config).read().is_ok());
    }

    #[test]
    fn test_verify_structure() {
        let text = text();
        let summary = Reader::new(text.as_bytes()).verify_structure().unwrap();
        assert_eq!(
            summary,
            StructureSummary {
                records: 11,
                schedules: 2,
                payments: 3
            }
        );

        let mut rows = lines(&text);
        rows.push(rows[0].clone());
        let err = Reader::new(join(&rows).as_bytes()).verify_structure().unwrap_err();
        assert_eq!(err.line(), Some(12));
    }
}
