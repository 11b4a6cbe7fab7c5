//! Writes a [`File`] tree as fixed-width records.
//!
//! The whole file is encoded before anything reaches the sink. If any field
//! cannot be rendered under the truncation policy, every problem in the file
//! is returned together and the sink receives nothing.

use crate::config::WriterConfig;
use crate::encode::{ensure_record_length, EncodeResult, Encoder};
use crate::error::{FieldProblem, FormatErrors, Result, SprError};
use crate::model::{AchPayment, CheckPayment, File, Schedule};
use crate::validate::validate_file_structure;
use log::{debug, info};
use std::io::Write;

/// Collects encoded lines and problems in output order.
struct Assembler {
    encoder: Encoder,
    lines: Vec<String>,
    problems: Vec<FieldProblem>,
    warnings: Vec<FieldProblem>,
    next_index: usize,
}

impl Assembler {
    fn new(encoder: Encoder) -> Self {
        Assembler {
            encoder,
            lines: Vec::new(),
            problems: Vec::new(),
            warnings: Vec::new(),
            next_index: 0,
        }
    }

    fn index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    fn push(&mut self, result: EncodeResult) {
        match result {
            Ok(encoded) => {
                self.warnings.extend(encoded.warnings);
                self.lines.push(encoded.line);
            }
            Err(problems) => self.problems.extend(problems),
        }
    }

    fn ach_payment(&mut self, p: &AchPayment) {
        let i = self.index();
        let r = self.encoder.ach_payment(p, i);
        self.push(r);
        for addendum in &p.addenda {
            let i = self.index();
            let r = self.encoder.addendum(addendum, i);
            self.push(r);
        }
        for cars in &p.cars_tas_betc {
            let i = self.index();
            let r = self.encoder.cars_tas_betc(cars, i);
            self.push(r);
        }
        if let Some(dnp) = &p.dnp {
            let i = self.index();
            let r = self.encoder.dnp(dnp, i);
            self.push(r);
        }
    }

    fn check_payment(&mut self, p: &CheckPayment) {
        let i = self.index();
        let r = self.encoder.check_payment(p, i);
        self.push(r);
        if let Some(stub) = &p.stub {
            let i = self.index();
            let r = self.encoder.check_stub(stub, i);
            self.push(r);
        }
        for cars in &p.cars_tas_betc {
            let i = self.index();
            let r = self.encoder.cars_tas_betc(cars, i);
            self.push(r);
        }
        if let Some(dnp) = &p.dnp {
            let i = self.index();
            let r = self.encoder.dnp(dnp, i);
            self.push(r);
        }
    }

    fn schedule(&mut self, schedule: &Schedule) -> Result<()> {
        let i = self.index();
        match schedule {
            Schedule::Ach(s) => {
                let r = self.encoder.ach_schedule_header(&s.header, i);
                self.push(r);
                for p in &s.payments {
                    self.ach_payment(p);
                }
            }
            Schedule::Check(s) => {
                let r = self.encoder.check_schedule_header(&s.header, i);
                self.push(r);
                for p in &s.payments {
                    self.check_payment(p);
                }
            }
        }
        let trailer = schedule
            .trailer()
            .ok_or(SprError::MissingRecord("schedule trailer"))?;
        let i = self.index();
        let r = self.encoder.schedule_trailer(trailer, i);
        self.push(r);
        Ok(())
    }
}

/// Encodes every record of `file` in output order.
///
/// Returns the lines and any warn-and-truncate events, or every field
/// problem in the file as one [`FormatErrors`].
pub fn encode_file(encoder: Encoder, file: &File) -> Result<(Vec<String>, Vec<FieldProblem>)> {
    let header = file
        .header
        .as_ref()
        .ok_or(SprError::MissingRecord("file header"))?;
    let trailer = file
        .trailer
        .as_ref()
        .ok_or(SprError::MissingRecord("file trailer"))?;

    let mut asm = Assembler::new(encoder);
    let i = asm.index();
    let r = asm.encoder.file_header(header, i);
    asm.push(r);
    for schedule in &file.schedules {
        asm.schedule(schedule)?;
    }
    let i = asm.index();
    let r = asm.encoder.file_trailer(trailer, i);
    asm.push(r);

    if !asm.problems.is_empty() {
        return Err(FormatErrors {
            problems: asm.problems,
        }
        .into());
    }
    Ok((asm.lines, asm.warnings))
}

/// Fixed-width file writer over any byte sink.
pub struct Writer<W: Write> {
    inner: W,
    encoder: Encoder,
    warnings: Vec<FieldProblem>,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Writer::with_config(inner, WriterConfig::default())
    }

    pub fn with_config(inner: W, config: WriterConfig) -> Self {
        Writer {
            inner,
            encoder: Encoder::new(config.truncation),
            warnings: Vec::new(),
        }
    }

    /// Writes the whole file, each record followed by `\n`.
    ///
    /// Trailers are written as they stand; call
    /// [`File::recalculate_trailers`] first to derive them.
    pub fn write(&mut self, file: &File) -> Result<()> {
        validate_file_structure(file)?;
        let (lines, warnings) = encode_file(self.encoder, file)?;
        for line in &lines {
            ensure_record_length(line)?;
        }

        for line in &lines {
            self.inner.write_all(line.as_bytes())?;
            self.inner.write_all(b"\n")?;
        }
        self.inner.flush()?;

        if !warnings.is_empty() {
            debug!("{} field(s) truncated", warnings.len());
        }
        self.warnings.extend(warnings);
        info!(
            "wrote {} records in {} schedule(s)",
            lines.len(),
            file.schedules.len()
        );
        Ok(())
    }

    /// Warn-and-truncate events from every write so far.
    pub fn warnings(&self) -> &[FieldProblem] {
        &self.warnings
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Renders a file to a string with the default writer configuration.
pub fn to_string(file: &File) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write(file)?;
    // Every encoded line is ASCII.
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TruncationPolicy;
    use crate::error::ProblemKind;
    use crate::model::{AchSchedule, AchScheduleHeader, FileHeader};

    fn file(payments: Vec<AchPayment>) -> File {
        let payments = payments
            .into_iter()
            .map(|p| AchPayment {
                standard_entry_class_code: "PPD".into(),
                ..p
            })
            .collect();
        let mut file = File {
            header: Some(FileHeader::new("SYS")),
            schedules: vec![Schedule::Ach(AchSchedule {
                header: AchScheduleHeader {
                    schedule_number: "1".into(),
                    standard_entry_class_code: "PPD".into(),
                    ..AchScheduleHeader::default()
                },
                payments,
                trailer: None,
            })],
            trailer: None,
        };
        file.recalculate_trailers();
        file
    }

    fn ach(id: &str, name: &str) -> AchPayment {
        AchPayment::new(id, name, 100, "021000021", "12345", "22")
    }

    #[test]
    fn test_every_line_is_one_record() {
        let text = to_string(&file(vec![ach("P1", "A"), ach("P2", "B")])).unwrap();
        let lines: Vec<&str> = text.split_terminator('\n').collect();
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.len() == 850));
        let tags: Vec<&str> = lines.iter().map(|l| &l[..2]).collect();
        assert_eq!(tags, vec!["H ", "01", "02", "02", "T ", "E "]);
    }

    #[test]
    fn test_all_problems_reported_and_nothing_written() {
        let long = "X".repeat(40);
        let f = file(vec![ach("P1", &long), ach("P2", &long)]);
        let mut writer = Writer::new(Vec::new());
        let err = writer.write(&f).unwrap_err();
        match err {
            SprError::Format(errors) => {
                assert_eq!(errors.problems.len(), 2);
                assert!(errors.problems.iter().all(|p| p.field == "PayeeName"));
                assert!(errors.problems.iter().all(|p| p.kind == ProblemKind::Truncated));
                assert_eq!(errors.problems[0].record_index, 2);
                assert_eq!(errors.problems[1].record_index, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_negative_amount_is_not_written() {
        let mut payment = ach("P1", "A");
        payment.amount = -500;
        let f = file(vec![payment]);
        let config = WriterConfig {
            truncation: TruncationPolicy::Allow,
        };
        let mut writer = Writer::with_config(Vec::new(), config);
        match writer.write(&f).unwrap_err() {
            SprError::Format(errors) => {
                let fields: Vec<(&str, &str)> =
                    errors.problems.iter().map(|p| (p.record, p.field)).collect();
                assert_eq!(
                    fields,
                    vec![
                        ("02", "Amount"),
                        ("T ", "ScheduleAmount"),
                        ("E ", "TotalAmount_Payments")
                    ]
                );
                assert!(errors.problems.iter().all(|p| p.kind == ProblemKind::Negative));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_warn_and_truncate_keeps_events() {
        let f = file(vec![ach("P1", &"Y".repeat(40))]);
        let config = WriterConfig {
            truncation: TruncationPolicy::WarnAndTruncate,
        };
        let mut writer = Writer::with_config(Vec::new(), config);
        writer.write(&f).unwrap();
        assert_eq!(writer.warnings().len(), 1);
        assert_eq!(writer.warnings()[0].field, "PayeeName");
    }

    #[test]
    fn test_structure_checked_before_encoding() {
        let mut f = file(vec![ach("P1", "A")]);
        f.trailer = None;
        let err = to_string(&f).unwrap_err();
        assert_eq!(err.rule(), Some("structure_trailer"));
    }
}
