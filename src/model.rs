//! Payment file data model.
//!
//! The tree is strictly owned: a [`File`] owns its schedules, a schedule owns
//! its payments, and a payment owns its addenda, accounting classifications,
//! stub and DNP record. Text fields hold the exact characters read from the
//! wire (trailing pad spaces included); compare them through `trim()`.

use crate::registry::{RecordTag, STUB_LINES};

/// The only file format version this crate reads and writes.
pub const SUPPORTED_VERSION: &str = "502";

/// A complete payment request file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    pub header: Option<FileHeader>,
    pub schedules: Vec<Schedule>,
    pub trailer: Option<FileTrailer>,
}

/// Record `H `.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub input_system: String,
    pub standard_payment_request_version: String,
    /// Blank, `"0"` or `"1"`.
    pub is_requested_for_same_day_ach: String,
}

/// Interpretation of [`FileHeader::is_requested_for_same_day_ach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameDayAch {
    Unset,
    No,
    Yes,
    /// Anything other than blank, `0` or `1`.
    Invalid,
}

impl FileHeader {
    pub fn new(input_system: impl Into<String>) -> Self {
        FileHeader {
            input_system: input_system.into(),
            standard_payment_request_version: SUPPORTED_VERSION.to_string(),
            is_requested_for_same_day_ach: String::new(),
        }
    }

    pub fn same_day_ach(&self) -> SameDayAch {
        match self.is_requested_for_same_day_ach.trim() {
            "" => SameDayAch::Unset,
            "0" => SameDayAch::No,
            "1" => SameDayAch::Yes,
            _ => SameDayAch::Invalid,
        }
    }
}

/// Record `E `.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTrailer {
    pub total_count_records: i64,
    pub total_count_payments: i64,
    pub total_amount_payments: i64,
}

/// Record `T `.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleTrailer {
    pub schedule_count: i64,
    pub schedule_amount: i64,
}

/// Record `01`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchScheduleHeader {
    pub agency_ach_text: String,
    pub schedule_number: String,
    pub payment_type_code: String,
    pub standard_entry_class_code: String,
    pub agency_location_code: String,
    pub federal_employer_identification_number: String,
}

/// Record `11`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckScheduleHeader {
    pub schedule_number: String,
    pub payment_type_code: String,
    pub agency_location_code: String,
    pub check_payment_enclosure_code: String,
}

/// Borrowed view of either schedule header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleHeader<'a> {
    Ach(&'a AchScheduleHeader),
    Check(&'a CheckScheduleHeader),
}

impl<'a> ScheduleHeader<'a> {
    pub fn schedule_number(&self) -> &'a str {
        match *self {
            ScheduleHeader::Ach(h) => &h.schedule_number,
            ScheduleHeader::Check(h) => &h.schedule_number,
        }
    }

    pub fn payment_type_code(&self) -> &'a str {
        match *self {
            ScheduleHeader::Ach(h) => &h.payment_type_code,
            ScheduleHeader::Check(h) => &h.payment_type_code,
        }
    }

    pub fn agency_location_code(&self) -> &'a str {
        match *self {
            ScheduleHeader::Ach(h) => &h.agency_location_code,
            ScheduleHeader::Check(h) => &h.agency_location_code,
        }
    }

    pub fn record_tag(&self) -> RecordTag {
        match self {
            ScheduleHeader::Ach(_) => RecordTag::AchScheduleHeader,
            ScheduleHeader::Check(_) => RecordTag::CheckScheduleHeader,
        }
    }
}

/// A schedule of ACH payments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchSchedule {
    pub header: AchScheduleHeader,
    pub payments: Vec<AchPayment>,
    pub trailer: Option<ScheduleTrailer>,
}

/// A schedule of check payments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSchedule {
    pub header: CheckScheduleHeader,
    pub payments: Vec<CheckPayment>,
    pub trailer: Option<ScheduleTrailer>,
}

/// One schedule; ACH and check payments never share a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Ach(AchSchedule),
    Check(CheckSchedule),
}

impl Schedule {
    pub fn header(&self) -> ScheduleHeader<'_> {
        match self {
            Schedule::Ach(s) => ScheduleHeader::Ach(&s.header),
            Schedule::Check(s) => ScheduleHeader::Check(&s.header),
        }
    }

    pub fn trailer(&self) -> Option<&ScheduleTrailer> {
        match self {
            Schedule::Ach(s) => s.trailer.as_ref(),
            Schedule::Check(s) => s.trailer.as_ref(),
        }
    }

    pub fn trailer_mut(&mut self) -> &mut Option<ScheduleTrailer> {
        match self {
            Schedule::Ach(s) => &mut s.trailer,
            Schedule::Check(s) => &mut s.trailer,
        }
    }

    pub fn schedule_number(&self) -> &str {
        self.header().schedule_number()
    }

    pub fn payment_count(&self) -> usize {
        match self {
            Schedule::Ach(s) => s.payments.len(),
            Schedule::Check(s) => s.payments.len(),
        }
    }

    /// Payments as borrowed [`PaymentRef`]s, in file order.
    pub fn payments(&self) -> Box<dyn Iterator<Item = PaymentRef<'_>> + '_> {
        match self {
            Schedule::Ach(s) => Box::new(s.payments.iter().map(PaymentRef::Ach)),
            Schedule::Check(s) => Box::new(s.payments.iter().map(PaymentRef::Check)),
        }
    }
}

/// Record `02` plus its payment group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AchPayment {
    pub agency_account_identifier: String,
    /// Cents.
    pub amount: i64,
    pub agency_payment_type_code: String,
    pub is_top_offset: String,
    pub payee_name: String,
    pub payee_address_line_1: String,
    pub payee_address_line_2: String,
    pub city_name: String,
    pub state_name: String,
    pub state_code_text: String,
    pub postal_code: String,
    pub postal_code_extension: String,
    pub country_code_text: String,
    pub routing_number: String,
    pub account_number: String,
    pub ach_transaction_code: String,
    pub payee_identifier_additional: String,
    pub payee_name_additional: String,
    pub payment_id: String,
    pub reconcilement: String,
    pub tin: String,
    pub payment_recipient_tin_indicator: String,
    pub additional_payee_tin_indicator: String,
    pub amount_eligible_for_offset: String,
    pub payee_address_line_3: String,
    pub payee_address_line_4: String,
    pub country_name: String,
    pub consular_code: String,
    pub sub_payment_type_code: String,
    pub payer_mechanism: String,
    pub payment_description_code: String,
    /// Inherited from the schedule header; not carried on the payment record.
    pub standard_entry_class_code: String,
    pub addenda: Vec<Addendum>,
    pub cars_tas_betc: Vec<CarsTasBetc>,
    pub dnp: Option<Dnp>,
}

impl AchPayment {
    pub fn new(
        payment_id: impl Into<String>,
        payee_name: impl Into<String>,
        amount: i64,
        routing_number: impl Into<String>,
        account_number: impl Into<String>,
        ach_transaction_code: impl Into<String>,
    ) -> Self {
        AchPayment {
            payment_id: payment_id.into(),
            payee_name: payee_name.into(),
            amount,
            routing_number: routing_number.into(),
            account_number: account_number.into(),
            ach_transaction_code: ach_transaction_code.into(),
            ..AchPayment::default()
        }
    }
}

/// Record `12` plus its payment group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckPayment {
    pub agency_account_identifier: String,
    /// Cents.
    pub amount: i64,
    pub agency_payment_type_code: String,
    pub is_top_offset: String,
    pub payee_name: String,
    pub payee_address_line_1: String,
    pub payee_address_line_2: String,
    pub payee_address_line_3: String,
    pub payee_address_line_4: String,
    pub city_name: String,
    pub state_name: String,
    pub state_code_text: String,
    pub postal_code: String,
    pub postal_code_extension: String,
    pub postnet_barcode_delivery_point: String,
    pub country_name: String,
    pub consular_code: String,
    pub check_legend_text_1: String,
    pub check_legend_text_2: String,
    pub payee_identifier_secondary: String,
    pub party_name_secondary: String,
    pub payment_id: String,
    pub reconcilement: String,
    pub special_handling: String,
    pub tin: String,
    pub usps_intelligent_mail_barcode: String,
    pub payment_recipient_tin_indicator: String,
    pub secondary_payee_tin_indicator: String,
    pub amount_eligible_for_offset: String,
    pub sub_payment_type_code: String,
    pub payer_mechanism: String,
    pub payment_description_code: String,
    pub stub: Option<CheckStub>,
    pub cars_tas_betc: Vec<CarsTasBetc>,
    pub dnp: Option<Dnp>,
}

impl CheckPayment {
    pub fn new(
        payment_id: impl Into<String>,
        payee_name: impl Into<String>,
        amount: i64,
        payee_address_line_1: impl Into<String>,
    ) -> Self {
        CheckPayment {
            payment_id: payment_id.into(),
            payee_name: payee_name.into(),
            amount,
            payee_address_line_1: payee_address_line_1.into(),
            ..CheckPayment::default()
        }
    }
}

/// An owned payment of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payment {
    Ach(AchPayment),
    Check(CheckPayment),
}

impl Payment {
    pub fn view(&self) -> PaymentRef<'_> {
        match self {
            Payment::Ach(p) => PaymentRef::Ach(p),
            Payment::Check(p) => PaymentRef::Check(p),
        }
    }

    pub fn payment_id(&self) -> &str {
        self.view().payment_id()
    }

    pub fn amount(&self) -> i64 {
        self.view().amount()
    }

    pub fn set_amount(&mut self, amount: i64) {
        match self {
            Payment::Ach(p) => p.amount = amount,
            Payment::Check(p) => p.amount = amount,
        }
    }

    pub fn payee_name(&self) -> &str {
        self.view().payee_name()
    }

    pub fn record_tag(&self) -> RecordTag {
        self.view().record_tag()
    }

    pub fn reconcilement(&self) -> &str {
        self.view().reconcilement()
    }
}

/// A borrowed payment of either kind; what streaming callbacks and
/// schedule walks hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentRef<'a> {
    Ach(&'a AchPayment),
    Check(&'a CheckPayment),
}

impl<'a> PaymentRef<'a> {
    pub fn payment_id(&self) -> &'a str {
        match self {
            PaymentRef::Ach(p) => &p.payment_id,
            PaymentRef::Check(p) => &p.payment_id,
        }
    }

    pub fn amount(&self) -> i64 {
        match self {
            PaymentRef::Ach(p) => p.amount,
            PaymentRef::Check(p) => p.amount,
        }
    }

    pub fn payee_name(&self) -> &'a str {
        match self {
            PaymentRef::Ach(p) => &p.payee_name,
            PaymentRef::Check(p) => &p.payee_name,
        }
    }

    pub fn record_tag(&self) -> RecordTag {
        match self {
            PaymentRef::Ach(_) => RecordTag::AchPayment,
            PaymentRef::Check(_) => RecordTag::CheckPayment,
        }
    }

    pub fn reconcilement(&self) -> &'a str {
        match self {
            PaymentRef::Ach(p) => &p.reconcilement,
            PaymentRef::Check(p) => &p.reconcilement,
        }
    }

    pub fn tin(&self) -> &'a str {
        match self {
            PaymentRef::Ach(p) => &p.tin,
            PaymentRef::Check(p) => &p.tin,
        }
    }

    /// Physical records this payment occupies: itself plus its group.
    pub fn record_count(&self) -> i64 {
        let (associated, dnp) = match self {
            PaymentRef::Ach(p) => (p.addenda.len() + p.cars_tas_betc.len(), &p.dnp),
            PaymentRef::Check(p) => (
                usize::from(p.stub.is_some()) + p.cars_tas_betc.len(),
                &p.dnp,
            ),
        };
        1 + associated as i64 + i64::from(dnp.is_some())
    }
}

/// Which addendum record carries the payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddendumKind {
    /// Tag `03`, 80-character payload.
    #[default]
    Plain,
    /// Tag `04`, 800-character EDI payload.
    Ctx,
}

impl AddendumKind {
    pub fn record_tag(self) -> RecordTag {
        match self {
            AddendumKind::Plain => RecordTag::AchAddendum,
            AddendumKind::Ctx => RecordTag::CtxAddendum,
        }
    }
}

/// Record `03` or `04`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Addendum {
    pub kind: AddendumKind,
    pub payment_id: String,
    pub addenda_information: String,
}

/// Record `G `: one budget-accounting classification line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarsTasBetc {
    pub payment_id: String,
    pub sub_level_prefix_code: String,
    pub allocation_transfer_agency_identifier: String,
    pub agency_identifier: String,
    pub beginning_period_of_availability: String,
    pub ending_period_of_availability: String,
    pub availability_type_code: String,
    pub main_account_code: String,
    pub sub_account_code: String,
    pub business_event_type_code: String,
    /// Cents.
    pub amount: i64,
    /// `"1"` credit, `"0"` debit.
    pub is_credit: String,
}

/// Record `DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dnp {
    pub payment_id: String,
    pub dnp_detail: String,
}

/// Record `13`: fourteen 55-character lines printed on the check stub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckStub {
    pub payment_id: String,
    pub payment_identification_lines: [String; STUB_LINES],
}

/// Counts and sums that trailers must agree with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// Physical records, including headers and trailers at this level.
    pub records: i64,
    pub payments: i64,
    pub amount: i64,
}

impl Schedule {
    /// Totals recomputed from the payments; `records` counts the schedule
    /// header and trailer.
    pub fn totals(&self) -> Totals {
        let mut totals = Totals {
            records: 2,
            ..Totals::default()
        };
        for payment in self.payments() {
            totals.records += payment.record_count();
            totals.payments += 1;
            totals.amount = totals.amount.saturating_add(payment.amount());
        }
        totals
    }
}

impl File {
    /// Totals recomputed from every schedule; `records` counts the file
    /// header and trailer.
    pub fn totals(&self) -> Totals {
        let mut totals = Totals {
            records: 2,
            ..Totals::default()
        };
        for schedule in &self.schedules {
            let t = schedule.totals();
            totals.records += t.records;
            totals.payments += t.payments;
            totals.amount = totals.amount.saturating_add(t.amount);
        }
        totals
    }

    /// Rewrites every schedule trailer and the file trailer from the
    /// payments. Calling it twice yields the same trailers.
    pub fn recalculate_trailers(&mut self) {
        for schedule in &mut self.schedules {
            let t = schedule.totals();
            *schedule.trailer_mut() = Some(ScheduleTrailer {
                schedule_count: t.payments,
                schedule_amount: t.amount,
            });
        }
        let t = self.totals();
        self.trailer = Some(FileTrailer {
            total_count_records: t.records,
            total_count_payments: t.payments,
            total_amount_payments: t.amount,
        });
    }

    /// Every payment in file order, with schedule and payment indexes.
    pub fn payments(&self) -> impl Iterator<Item = (usize, usize, PaymentRef<'_>)> + '_ {
        self.schedules
            .iter()
            .enumerate()
            .flat_map(|(s, schedule)| schedule.payments().enumerate().map(move |(p, pay)| (s, p, pay)))
    }

    pub fn payment_count(&self) -> usize {
        self.schedules.iter().map(Schedule::payment_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ach(id: &str, amount: i64) -> AchPayment {
        AchPayment::new(id, "PAYEE", amount, "021000021", "12345", "22")
    }

    fn sample() -> File {
        let mut with_group = ach("P2", 200);
        with_group.addenda.push(Addendum::default());
        with_group.cars_tas_betc.push(CarsTasBetc::default());
        with_group.dnp = Some(Dnp::default());

        let mut check = CheckPayment::new("C1", "PAYEE", 50, "1 MAIN ST");
        check.stub = Some(CheckStub::default());

        File {
            header: Some(FileHeader::new("SYS")),
            schedules: vec![
                Schedule::Ach(AchSchedule {
                    payments: vec![ach("P1", 100), with_group],
                    ..AchSchedule::default()
                }),
                Schedule::Check(CheckSchedule {
                    payments: vec![check],
                    ..CheckSchedule::default()
                }),
            ],
            trailer: None,
        }
    }

    #[test]
    fn test_schedule_header_fields_outlive_the_view() {
        let mut file = sample();
        file.schedules[0] = Schedule::Ach(AchSchedule {
            header: AchScheduleHeader {
                schedule_number: "00000000000042".into(),
                payment_type_code: "Salary".into(),
                agency_location_code: "12345678".into(),
                ..AchScheduleHeader::default()
            },
            ..AchSchedule::default()
        });
        let (number, alc) = {
            let header = file.schedules[0].header();
            (header.schedule_number(), header.agency_location_code())
        };
        assert_eq!(number, "00000000000042");
        assert_eq!(alc, "12345678");
        assert_eq!(file.schedules[0].schedule_number(), "00000000000042");
        assert_eq!(file.schedules[1].header().payment_type_code(), "");
    }

    #[test]
    fn test_same_day_flag_states() {
        let mut header = FileHeader::new("SYS");
        assert_eq!(header.same_day_ach(), SameDayAch::Unset);
        header.is_requested_for_same_day_ach = "1".into();
        assert_eq!(header.same_day_ach(), SameDayAch::Yes);
        header.is_requested_for_same_day_ach = "0".into();
        assert_eq!(header.same_day_ach(), SameDayAch::No);
        header.is_requested_for_same_day_ach = "Y".into();
        assert_eq!(header.same_day_ach(), SameDayAch::Invalid);
    }

    #[test]
    fn test_payment_record_count_includes_group() {
        let file = sample();
        let counts: Vec<i64> = file.payments().map(|(_, _, p)| p.record_count()).collect();
        assert_eq!(counts, vec![1, 4, 2]);
    }

    #[test]
    fn test_totals() {
        let file = sample();
        assert_eq!(
            file.schedules[0].totals(),
            Totals { records: 7, payments: 2, amount: 300 }
        );
        assert_eq!(
            file.totals(),
            Totals { records: 13, payments: 3, amount: 350 }
        );
    }

    #[test]
    fn test_recalculate_trailers_is_idempotent() {
        let mut file = sample();
        file.recalculate_trailers();
        let first = file.clone();
        file.recalculate_trailers();
        assert_eq!(file, first);
        assert_eq!(
            file.schedules[1].trailer(),
            Some(&ScheduleTrailer { schedule_count: 1, schedule_amount: 50 })
        );
    }

    #[test]
    fn test_payment_accessors() {
        let mut payment = Payment::Check(CheckPayment::new("C9", "JANE", 10, "ADDR"));
        payment.set_amount(25);
        assert_eq!(payment.amount(), 25);
        assert_eq!(payment.payment_id(), "C9");
        assert_eq!(payment.record_tag(), RecordTag::CheckPayment);
    }

    #[test]
    fn test_file_payments_are_indexed() {
        let file = sample();
        let ids: Vec<(usize, usize, &str)> =
            file.payments().map(|(s, p, pay)| (s, p, pay.payment_id())).collect();
        assert_eq!(ids, vec![(0, 0, "P1"), (0, 1, "P2"), (1, 0, "C1")]);
    }
}
