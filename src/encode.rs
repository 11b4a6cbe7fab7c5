//! Record encoders: render typed records into exact fixed-width lines.
//!
//! A [`LineBuilder`] starts from a record full of spaces and places each
//! field according to its [`FieldKind`]. Every problem found while placing
//! fields is collected, so one record reports all of its bad fields at once.

use crate::config::TruncationPolicy;
use crate::error::{FieldProblem, ProblemKind, Result, SprError};
use crate::model::{
    AchPayment, AchScheduleHeader, Addendum, AddendumKind, CarsTasBetc, CheckPayment,
    CheckScheduleHeader, CheckStub, Dnp, FileHeader, FileTrailer, ScheduleTrailer,
};
use crate::registry::{
    ach_addendum, ach_payment, ach_schedule_header, cars_tas_betc, check_payment,
    check_schedule_header, check_stub, ctx_addendum, dnp, file_header, file_trailer,
    schedule_trailer, FieldDef, FieldKind, RecordTag, RECORD_LENGTH, STUB_LINE_WIDTH,
};
use log::warn;

/// Assembles one record.
pub struct LineBuilder {
    tag: RecordTag,
    record_index: usize,
    policy: TruncationPolicy,
    buf: Vec<u8>,
    problems: Vec<FieldProblem>,
    warnings: Vec<FieldProblem>,
}

impl LineBuilder {
    /// Starts a record with its tag already in place.
    pub fn new(tag: RecordTag, record_index: usize, policy: TruncationPolicy) -> Self {
        let mut buf = vec![b' '; RECORD_LENGTH];
        buf[..2].copy_from_slice(tag.code().as_bytes());
        LineBuilder {
            tag,
            record_index,
            policy,
            buf,
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn problem(&self, field: &FieldDef, value: &str, kind: ProblemKind) -> FieldProblem {
        FieldProblem {
            record: self.tag.code(),
            record_index: self.record_index,
            field: field.name,
            value: value.to_string(),
            width: field.length,
            kind,
        }
    }

    /// Applies the truncation policy to a value that does not fit.
    fn oversize(&mut self, field: &FieldDef, value: &str, kind: ProblemKind) {
        let problem = self.problem(field, value, kind);
        match self.policy {
            TruncationPolicy::Error => self.problems.push(problem),
            TruncationPolicy::WarnAndTruncate => {
                warn!("truncating: {}", problem);
                self.warnings.push(problem);
            }
            TruncationPolicy::Allow => {}
        }
    }

    /// Places a value according to the field's kind.
    pub fn set(&mut self, field: &FieldDef, value: &str) -> &mut Self {
        if !value.is_ascii() {
            let problem = self.problem(field, value, ProblemKind::NonAscii);
            self.problems.push(problem);
            return self;
        }
        let width = field.length;
        let rendered = match field.kind {
            FieldKind::Filler => return self,
            FieldKind::Text => {
                let value = value.trim_end();
                if value.len() > width {
                    self.oversize(field, value, ProblemKind::Truncated);
                }
                let value = &value[..value.len().min(width)];
                format!("{:<width$}", value)
            }
            FieldKind::NoJustify => {
                if value.len() > width {
                    self.oversize(field, value, ProblemKind::Truncated);
                }
                let mut padded = value[..value.len().min(width)].to_string();
                padded.extend(std::iter::repeat(' ').take(width - padded.len()));
                padded
            }
            FieldKind::Numeric => {
                let digits: String = value.chars().filter(char::is_ascii_digit).collect();
                right_justify_zero_filled(self, field, value, &digits)
            }
            FieldKind::ZeroFilled => right_justify_zero_filled(self, field, value, value.trim()),
        };
        self.buf[field.range()].copy_from_slice(rendered.as_bytes());
        self
    }

    /// Places an integer; negative values are rejected under every policy.
    pub fn set_amount(&mut self, field: &FieldDef, value: i64) -> &mut Self {
        if value < 0 {
            let problem = self.problem(field, &value.to_string(), ProblemKind::Negative);
            self.problems.push(problem);
            return self;
        }
        self.set(field, &value.to_string())
    }

    /// Warn-and-truncate events raised so far.
    pub fn warnings(&self) -> &[FieldProblem] {
        &self.warnings
    }

    /// The finished line, or every problem found while building it.
    pub fn finish(self) -> std::result::Result<Encoded, Vec<FieldProblem>> {
        if !self.problems.is_empty() {
            return Err(self.problems);
        }
        // buf only ever receives ASCII of the exact field width.
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        Ok(Encoded {
            line,
            warnings: self.warnings,
        })
    }
}

/// Right-justifies `text`, zero-filling on the left; overflow keeps the
/// low-order characters.
fn right_justify_zero_filled(
    builder: &mut LineBuilder,
    field: &FieldDef,
    original: &str,
    text: &str,
) -> String {
    let width = field.length;
    if text.len() > width {
        builder.oversize(field, original, ProblemKind::Overflow);
        return text[text.len() - width..].to_string();
    }
    format!("{:0>width$}", text)
}

/// One successfully encoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub line: String,
    pub warnings: Vec<FieldProblem>,
}

/// Encoder for every record kind under one truncation policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Encoder {
    pub policy: TruncationPolicy,
}

pub type EncodeResult = std::result::Result<Encoded, Vec<FieldProblem>>;

impl Encoder {
    pub fn new(policy: TruncationPolicy) -> Self {
        Encoder { policy }
    }

    fn builder(&self, tag: RecordTag, index: usize) -> LineBuilder {
        LineBuilder::new(tag, index, self.policy)
    }

    pub fn file_header(&self, header: &FileHeader, index: usize) -> EncodeResult {
        let mut b = self.builder(RecordTag::FileHeader, index);
        b.set(&file_header::INPUT_SYSTEM, &header.input_system)
            .set(&file_header::VERSION, &header.standard_payment_request_version)
            .set(&file_header::SAME_DAY_ACH, &header.is_requested_for_same_day_ach);
        b.finish()
    }

    pub fn file_trailer(&self, trailer: &FileTrailer, index: usize) -> EncodeResult {
        let mut b = self.builder(RecordTag::FileTrailer, index);
        b.set_amount(&file_trailer::TOTAL_COUNT_RECORDS, trailer.total_count_records)
            .set_amount(&file_trailer::TOTAL_COUNT_PAYMENTS, trailer.total_count_payments)
            .set_amount(&file_trailer::TOTAL_AMOUNT_PAYMENTS, trailer.total_amount_payments);
        b.finish()
    }

    pub fn ach_schedule_header(&self, header: &AchScheduleHeader, index: usize) -> EncodeResult {
        use ach_schedule_header as f;
        let mut b = self.builder(RecordTag::AchScheduleHeader, index);
        b.set(&f::AGENCY_ACH_TEXT, &header.agency_ach_text)
            .set(&f::SCHEDULE_NUMBER, &header.schedule_number)
            .set(&f::PAYMENT_TYPE_CODE, &header.payment_type_code)
            .set(&f::SEC_CODE, &header.standard_entry_class_code)
            .set(&f::AGENCY_LOCATION_CODE, &header.agency_location_code)
            .set(&f::FEIN, &header.federal_employer_identification_number);
        b.finish()
    }

    pub fn check_schedule_header(&self, header: &CheckScheduleHeader, index: usize) -> EncodeResult {
        use check_schedule_header as f;
        let mut b = self.builder(RecordTag::CheckScheduleHeader, index);
        b.set(&f::SCHEDULE_NUMBER, &header.schedule_number)
            .set(&f::PAYMENT_TYPE_CODE, &header.payment_type_code)
            .set(&f::AGENCY_LOCATION_CODE, &header.agency_location_code)
            .set(&f::ENCLOSURE_CODE, &header.check_payment_enclosure_code);
        b.finish()
    }

    pub fn schedule_trailer(&self, trailer: &ScheduleTrailer, index: usize) -> EncodeResult {
        let mut b = self.builder(RecordTag::ScheduleTrailer, index);
        b.set_amount(&schedule_trailer::SCHEDULE_COUNT, trailer.schedule_count)
            .set_amount(&schedule_trailer::SCHEDULE_AMOUNT, trailer.schedule_amount);
        b.finish()
    }

    pub fn ach_payment(&self, p: &AchPayment, index: usize) -> EncodeResult {
        use ach_payment as f;
        let mut b = self.builder(RecordTag::AchPayment, index);
        b.set(&f::AGENCY_ACCOUNT_IDENTIFIER, &p.agency_account_identifier)
            .set_amount(&f::AMOUNT, p.amount)
            .set(&f::AGENCY_PAYMENT_TYPE_CODE, &p.agency_payment_type_code)
            .set(&f::IS_TOP_OFFSET, &p.is_top_offset)
            .set(&f::PAYEE_NAME, &p.payee_name)
            .set(&f::PAYEE_ADDRESS_LINE_1, &p.payee_address_line_1)
            .set(&f::PAYEE_ADDRESS_LINE_2, &p.payee_address_line_2)
            .set(&f::CITY_NAME, &p.city_name)
            .set(&f::STATE_NAME, &p.state_name)
            .set(&f::STATE_CODE_TEXT, &p.state_code_text)
            .set(&f::POSTAL_CODE, &p.postal_code)
            .set(&f::POSTAL_CODE_EXTENSION, &p.postal_code_extension)
            .set(&f::COUNTRY_CODE_TEXT, &p.country_code_text)
            .set(&f::ROUTING_NUMBER, &p.routing_number)
            .set(&f::ACCOUNT_NUMBER, &p.account_number)
            .set(&f::TRANSACTION_CODE, &p.ach_transaction_code)
            .set(&f::PAYEE_IDENTIFIER_ADDITIONAL, &p.payee_identifier_additional)
            .set(&f::PAYEE_NAME_ADDITIONAL, &p.payee_name_additional)
            .set(&f::PAYMENT_ID, &p.payment_id)
            .set(&f::RECONCILEMENT, &p.reconcilement)
            .set(&f::TIN, &p.tin)
            .set(&f::PAYMENT_RECIPIENT_TIN_INDICATOR, &p.payment_recipient_tin_indicator)
            .set(&f::ADDITIONAL_PAYEE_TIN_INDICATOR, &p.additional_payee_tin_indicator)
            .set(&f::AMOUNT_ELIGIBLE_FOR_OFFSET, &p.amount_eligible_for_offset)
            .set(&f::PAYEE_ADDRESS_LINE_3, &p.payee_address_line_3)
            .set(&f::PAYEE_ADDRESS_LINE_4, &p.payee_address_line_4)
            .set(&f::COUNTRY_NAME, &p.country_name)
            .set(&f::CONSULAR_CODE, &p.consular_code)
            .set(&f::SUB_PAYMENT_TYPE_CODE, &p.sub_payment_type_code)
            .set(&f::PAYER_MECHANISM, &p.payer_mechanism)
            .set(&f::PAYMENT_DESCRIPTION_CODE, &p.payment_description_code);
        b.finish()
    }

    pub fn check_payment(&self, p: &CheckPayment, index: usize) -> EncodeResult {
        use check_payment as f;
        let mut b = self.builder(RecordTag::CheckPayment, index);
        b.set(&f::AGENCY_ACCOUNT_IDENTIFIER, &p.agency_account_identifier)
            .set_amount(&f::AMOUNT, p.amount)
            .set(&f::AGENCY_PAYMENT_TYPE_CODE, &p.agency_payment_type_code)
            .set(&f::IS_TOP_OFFSET, &p.is_top_offset)
            .set(&f::PAYEE_NAME, &p.payee_name)
            .set(&f::PAYEE_ADDRESS_LINE_1, &p.payee_address_line_1)
            .set(&f::PAYEE_ADDRESS_LINE_2, &p.payee_address_line_2)
            .set(&f::PAYEE_ADDRESS_LINE_3, &p.payee_address_line_3)
            .set(&f::PAYEE_ADDRESS_LINE_4, &p.payee_address_line_4)
            .set(&f::CITY_NAME, &p.city_name)
            .set(&f::STATE_NAME, &p.state_name)
            .set(&f::STATE_CODE_TEXT, &p.state_code_text)
            .set(&f::POSTAL_CODE, &p.postal_code)
            .set(&f::POSTAL_CODE_EXTENSION, &p.postal_code_extension)
            .set(&f::POSTNET_BARCODE_DELIVERY_POINT, &p.postnet_barcode_delivery_point)
            .set(&f::COUNTRY_NAME, &p.country_name)
            .set(&f::CONSULAR_CODE, &p.consular_code)
            .set(&f::CHECK_LEGEND_TEXT_1, &p.check_legend_text_1)
            .set(&f::CHECK_LEGEND_TEXT_2, &p.check_legend_text_2)
            .set(&f::PAYEE_IDENTIFIER_SECONDARY, &p.payee_identifier_secondary)
            .set(&f::PARTY_NAME_SECONDARY, &p.party_name_secondary)
            .set(&f::PAYMENT_ID, &p.payment_id)
            .set(&f::RECONCILEMENT, &p.reconcilement)
            .set(&f::SPECIAL_HANDLING, &p.special_handling)
            .set(&f::TIN, &p.tin)
            .set(&f::USPS_INTELLIGENT_MAIL_BARCODE, &p.usps_intelligent_mail_barcode)
            .set(&f::PAYMENT_RECIPIENT_TIN_INDICATOR, &p.payment_recipient_tin_indicator)
            .set(&f::SECONDARY_PAYEE_TIN_INDICATOR, &p.secondary_payee_tin_indicator)
            .set(&f::AMOUNT_ELIGIBLE_FOR_OFFSET, &p.amount_eligible_for_offset)
            .set(&f::SUB_PAYMENT_TYPE_CODE, &p.sub_payment_type_code)
            .set(&f::PAYER_MECHANISM, &p.payer_mechanism)
            .set(&f::PAYMENT_DESCRIPTION_CODE, &p.payment_description_code);
        b.finish()
    }

    pub fn addendum(&self, a: &Addendum, index: usize) -> EncodeResult {
        let (payment_id, information) = match a.kind {
            AddendumKind::Plain => (&ach_addendum::PAYMENT_ID, &ach_addendum::ADDENDA_INFORMATION),
            AddendumKind::Ctx => (&ctx_addendum::PAYMENT_ID, &ctx_addendum::ADDENDA_INFORMATION),
        };
        let mut b = self.builder(a.kind.record_tag(), index);
        b.set(payment_id, &a.payment_id)
            .set(information, &a.addenda_information);
        b.finish()
    }

    pub fn check_stub(&self, stub: &CheckStub, index: usize) -> EncodeResult {
        let lines = &check_stub::PAYMENT_IDENTIFICATION_LINES;
        let mut b = self.builder(RecordTag::CheckStub, index);
        b.set(&check_stub::PAYMENT_ID, &stub.payment_id);
        for (i, text) in stub.payment_identification_lines.iter().enumerate() {
            let start = lines.start + i * STUB_LINE_WIDTH;
            let line_field = FieldDef {
                name: "PaymentIdentificationLine",
                start,
                end: start + STUB_LINE_WIDTH - 1,
                length: STUB_LINE_WIDTH,
                kind: FieldKind::NoJustify,
                required: false,
            };
            b.set(&line_field, text);
        }
        b.finish()
    }

    pub fn cars_tas_betc(&self, c: &CarsTasBetc, index: usize) -> EncodeResult {
        use cars_tas_betc as f;
        let mut b = self.builder(RecordTag::CarsTasBetc, index);
        b.set(&f::PAYMENT_ID, &c.payment_id)
            .set(&f::SUB_LEVEL_PREFIX_CODE, &c.sub_level_prefix_code)
            .set(
                &f::ALLOCATION_TRANSFER_AGENCY_IDENTIFIER,
                &c.allocation_transfer_agency_identifier,
            )
            .set(&f::AGENCY_IDENTIFIER, &c.agency_identifier)
            .set(&f::BEGINNING_PERIOD_OF_AVAILABILITY, &c.beginning_period_of_availability)
            .set(&f::ENDING_PERIOD_OF_AVAILABILITY, &c.ending_period_of_availability)
            .set(&f::AVAILABILITY_TYPE_CODE, &c.availability_type_code)
            .set(&f::MAIN_ACCOUNT_CODE, &c.main_account_code)
            .set(&f::SUB_ACCOUNT_CODE, &c.sub_account_code)
            .set(&f::BUSINESS_EVENT_TYPE_CODE, &c.business_event_type_code)
            .set_amount(&f::AMOUNT, c.amount)
            .set(&f::IS_CREDIT, &c.is_credit);
        b.finish()
    }

    pub fn dnp(&self, d: &Dnp, index: usize) -> EncodeResult {
        let mut b = self.builder(RecordTag::Dnp, index);
        b.set(&dnp::PAYMENT_ID, &d.payment_id)
            .set(&dnp::DNP_DETAIL, &d.dnp_detail);
        b.finish()
    }
}

/// Checks the fixed-width invariant on a finished line.
pub fn ensure_record_length(line: &str) -> Result<()> {
    if line.len() != RECORD_LENGTH {
        return Err(SprError::RecordLength {
            expected: RECORD_LENGTH,
            actual: line.len(),
        });
    }
    Ok(())
}
