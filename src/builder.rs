//! Fluent construction of payment files.
//!
//! ```no_run
//! use spr_file::{AchPayment, AchScheduleBuilder, FileBuilder};
//!
//! let file = FileBuilder::new("PAYROLL")
//!     .schedule(
//!         AchScheduleBuilder::new("1", "Salary", "PPD", "12345678")
//!             .payment(AchPayment::new("P1", "JANE DOE", 15_000, "021000021", "1234", "22")),
//!     )
//!     .build();
//! assert_eq!(file.trailer.unwrap().total_count_payments, 1);
//! ```

use crate::model::{
    AchPayment, AchSchedule, AchScheduleHeader, Addendum, AddendumKind, CarsTasBetc,
    CheckPayment, CheckSchedule, CheckScheduleHeader, CheckStub, Dnp, File, FileHeader, Schedule,
};
use crate::registry::STUB_LINES;

/// Builds a [`File`] whose trailers are derived on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct FileBuilder {
    header: FileHeader,
    schedules: Vec<Schedule>,
}

impl FileBuilder {
    pub fn new(input_system: impl Into<String>) -> Self {
        FileBuilder {
            header: FileHeader::new(input_system),
            schedules: Vec::new(),
        }
    }

    pub fn same_day_ach(mut self, requested: bool) -> Self {
        self.header.is_requested_for_same_day_ach = if requested { "1" } else { "0" }.to_string();
        self
    }

    pub fn schedule(mut self, schedule: impl Into<Schedule>) -> Self {
        self.schedules.push(schedule.into());
        self
    }

    pub fn build(self) -> File {
        let mut file = File {
            header: Some(self.header),
            schedules: self.schedules,
            trailer: None,
        };
        file.recalculate_trailers();
        file
    }
}

/// Blank associated-record payment IDs take the parent's.
fn inherit_id(slot: &mut String, parent: &str) {
    if slot.trim().is_empty() {
        *slot = parent.to_string();
    }
}

#[derive(Debug, Clone)]
pub struct AchScheduleBuilder {
    schedule: AchSchedule,
}

impl AchScheduleBuilder {
    pub fn new(
        schedule_number: impl Into<String>,
        payment_type_code: impl Into<String>,
        standard_entry_class_code: impl Into<String>,
        agency_location_code: impl Into<String>,
    ) -> Self {
        AchScheduleBuilder {
            schedule: AchSchedule {
                header: AchScheduleHeader {
                    schedule_number: schedule_number.into(),
                    payment_type_code: payment_type_code.into(),
                    standard_entry_class_code: standard_entry_class_code.into(),
                    agency_location_code: agency_location_code.into(),
                    ..AchScheduleHeader::default()
                },
                ..AchSchedule::default()
            },
        }
    }

    pub fn agency_ach_text(mut self, text: impl Into<String>) -> Self {
        self.schedule.header.agency_ach_text = text.into();
        self
    }

    pub fn federal_employer_identification_number(mut self, fein: impl Into<String>) -> Self {
        self.schedule.header.federal_employer_identification_number = fein.into();
        self
    }

    /// Adds a payment, stamping it with this schedule's SEC code.
    pub fn payment(mut self, mut payment: AchPayment) -> Self {
        payment.standard_entry_class_code = self.schedule.header.standard_entry_class_code.clone();
        let id = payment.payment_id.clone();
        for a in &mut payment.addenda {
            inherit_id(&mut a.payment_id, &id);
        }
        for c in &mut payment.cars_tas_betc {
            inherit_id(&mut c.payment_id, &id);
        }
        if let Some(d) = &mut payment.dnp {
            inherit_id(&mut d.payment_id, &id);
        }
        self.schedule.payments.push(payment);
        self
    }

    pub fn build(self) -> Schedule {
        Schedule::Ach(self.schedule)
    }
}

impl From<AchScheduleBuilder> for Schedule {
    fn from(builder: AchScheduleBuilder) -> Self {
        builder.build()
    }
}

#[derive(Debug, Clone)]
pub struct CheckScheduleBuilder {
    schedule: CheckSchedule,
}

impl CheckScheduleBuilder {
    pub fn new(
        schedule_number: impl Into<String>,
        payment_type_code: impl Into<String>,
        agency_location_code: impl Into<String>,
    ) -> Self {
        CheckScheduleBuilder {
            schedule: CheckSchedule {
                header: CheckScheduleHeader {
                    schedule_number: schedule_number.into(),
                    payment_type_code: payment_type_code.into(),
                    agency_location_code: agency_location_code.into(),
                    ..CheckScheduleHeader::default()
                },
                ..CheckSchedule::default()
            },
        }
    }

    pub fn enclosure_code(mut self, code: impl Into<String>) -> Self {
        self.schedule.header.check_payment_enclosure_code = code.into();
        self
    }

    pub fn payment(mut self, mut payment: CheckPayment) -> Self {
        let id = payment.payment_id.clone();
        if let Some(s) = &mut payment.stub {
            inherit_id(&mut s.payment_id, &id);
        }
        for c in &mut payment.cars_tas_betc {
            inherit_id(&mut c.payment_id, &id);
        }
        if let Some(d) = &mut payment.dnp {
            inherit_id(&mut d.payment_id, &id);
        }
        self.schedule.payments.push(payment);
        self
    }

    pub fn build(self) -> Schedule {
        Schedule::Check(self.schedule)
    }
}

impl From<CheckScheduleBuilder> for Schedule {
    fn from(builder: CheckScheduleBuilder) -> Self {
        builder.build()
    }
}

impl AchPayment {
    pub fn with_addendum(mut self, kind: AddendumKind, information: impl Into<String>) -> Self {
        self.addenda.push(Addendum {
            kind,
            payment_id: self.payment_id.clone(),
            addenda_information: information.into(),
        });
        self
    }

    pub fn with_cars_tas_betc(mut self, mut cars: CarsTasBetc) -> Self {
        inherit_id(&mut cars.payment_id, &self.payment_id);
        self.cars_tas_betc.push(cars);
        self
    }

    pub fn with_dnp(mut self, detail: impl Into<String>) -> Self {
        self.dnp = Some(Dnp {
            payment_id: self.payment_id.clone(),
            dnp_detail: detail.into(),
        });
        self
    }
}

impl CheckPayment {
    /// Attaches a stub; lines past the fourteenth are dropped.
    pub fn with_stub<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stub = CheckStub {
            payment_id: self.payment_id.clone(),
            ..CheckStub::default()
        };
        for (slot, line) in stub
            .payment_identification_lines
            .iter_mut()
            .zip(lines.into_iter().take(STUB_LINES))
        {
            *slot = line.into();
        }
        self.stub = Some(stub);
        self
    }

    pub fn with_cars_tas_betc(mut self, mut cars: CarsTasBetc) -> Self {
        inherit_id(&mut cars.payment_id, &self.payment_id);
        self.cars_tas_betc.push(cars);
        self
    }

    pub fn with_dnp(mut self, detail: impl Into<String>) -> Self {
        self.dnp = Some(Dnp {
            payment_id: self.payment_id.clone(),
            dnp_detail: detail.into(),
        });
        self
    }
}
