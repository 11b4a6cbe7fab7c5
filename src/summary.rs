//! CSV reports over payment files.
//!
//! [`FileSummary`] needs a whole [`File`]; [`PaymentListing`] is a
//! [`Visitor`] that writes one row per payment as the file streams past.

use crate::error::{Result, SprError};
use crate::model::{File, Payment, Schedule, ScheduleHeader};
use crate::money::Dollars;
use crate::reader::Visitor;
use serde::Serialize;
use std::io::Write;
use std::ops::ControlFlow;

/// One schedule: recomputed totals next to what its trailer declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub schedule: usize,
    pub schedule_number: String,
    pub kind: &'static str,
    pub sec_code: String,
    pub payments: i64,
    pub amount: Dollars,
    pub declared_payments: Option<i64>,
    pub declared_amount: Option<Dollars>,
    pub balanced: bool,
}

/// Per-schedule totals for a whole file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub rows: Vec<ScheduleRow>,
    pub total_payments: i64,
    pub total_amount: Dollars,
}

impl FileSummary {
    pub fn from_file(file: &File) -> Self {
        let mut summary = FileSummary::default();
        for (index, schedule) in file.schedules.iter().enumerate() {
            let totals = schedule.totals();
            let trailer = schedule.trailer();
            let (kind, sec_code) = match schedule {
                Schedule::Ach(s) => ("ACH", s.header.standard_entry_class_code.trim().to_string()),
                Schedule::Check(_) => ("Check", String::new()),
            };
            let balanced = trailer.is_some_and(|t| {
                t.schedule_count == totals.payments && t.schedule_amount == totals.amount
            });
            summary.rows.push(ScheduleRow {
                schedule: index,
                schedule_number: schedule.schedule_number().trim().to_string(),
                kind,
                sec_code,
                payments: totals.payments,
                amount: Dollars::from_cents(totals.amount),
                declared_payments: trailer.map(|t| t.schedule_count),
                declared_amount: trailer.map(|t| Dollars::from_cents(t.schedule_amount)),
                balanced,
            });
            summary.total_payments += totals.payments;
            summary.total_amount += Dollars::from_cents(totals.amount);
        }
        summary
    }

    /// Writes one CSV row per schedule, header row first.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PaymentRow<'a> {
    schedule: usize,
    schedule_number: &'a str,
    index: usize,
    payment_id: &'a str,
    payee_name: &'a str,
    kind: &'static str,
    amount: Dollars,
}

/// Streams one CSV row per payment.
///
/// A write failure stops the stream; [`finish`](Self::finish) returns it.
pub struct PaymentListing<W: Write> {
    csv: csv::Writer<W>,
    schedule_number: String,
    rows: usize,
    error: Option<SprError>,
}

impl<W: Write> PaymentListing<W> {
    pub fn new(writer: W) -> Self {
        PaymentListing {
            csv: csv::Writer::from_writer(writer),
            schedule_number: String::new(),
            rows: 0,
            error: None,
        }
    }

    /// Flushes the output and reports the row count or the first error.
    pub fn finish(mut self) -> Result<usize> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.csv.flush()?;
        Ok(self.rows)
    }
}

impl<W: Write> Visitor for PaymentListing<W> {
    fn on_schedule(&mut self, header: ScheduleHeader<'_>, _index: usize) -> ControlFlow<()> {
        self.schedule_number = header.schedule_number().trim().to_string();
        ControlFlow::Continue(())
    }

    fn on_payment(&mut self, payment: &Payment, schedule: usize, index: usize) -> ControlFlow<()> {
        let row = PaymentRow {
            schedule,
            schedule_number: &self.schedule_number,
            index,
            payment_id: payment.payment_id().trim(),
            payee_name: payment.payee_name().trim(),
            kind: match payment {
                Payment::Ach(_) => "ACH",
                Payment::Check(_) => "Check",
            },
            amount: Dollars::from_cents(payment.amount()),
        };
        match self.csv.serialize(row) {
            Ok(()) => {
                self.rows += 1;
                ControlFlow::Continue(())
            }
            Err(e) => {
                self.error = Some(e.into());
                ControlFlow::Break(())
            }
        }
    }
}
