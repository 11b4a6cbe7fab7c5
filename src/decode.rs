//! Record decoders: slice a fixed-width line into a typed record.
//!
//! Decoding is purely mechanical. Text fields come back verbatim, numeric
//! fields go through the configured [`NumericPolicy`], and no business rule
//! is applied here; that is the validator's job.

use crate::config::{ExtractPolicy, NumericPolicy, ReaderConfig};
use crate::error::{ExtractionError, Result, SprError};
use crate::model::{
    AchPayment, AchScheduleHeader, Addendum, AddendumKind, CarsTasBetc, CheckPayment,
    CheckScheduleHeader, CheckStub, Dnp, FileHeader, FileTrailer, ScheduleTrailer,
};
use crate::registry::{
    ach_addendum, ach_payment, ach_schedule_header, cars_tas_betc, check_payment,
    check_schedule_header, check_stub, ctx_addendum, dnp, file_header, file_trailer,
    schedule_trailer, FieldDef, RecordTag, RECORD_LENGTH, STUB_LINE_WIDTH,
};
use log::debug;

/// One decoded physical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    FileHeader(FileHeader),
    AchScheduleHeader(AchScheduleHeader),
    AchPayment(Box<AchPayment>),
    Addendum(Addendum),
    CheckScheduleHeader(CheckScheduleHeader),
    CheckPayment(Box<CheckPayment>),
    CheckStub(CheckStub),
    CarsTasBetc(CarsTasBetc),
    Dnp(Dnp),
    ScheduleTrailer(ScheduleTrailer),
    FileTrailer(FileTrailer),
}

/// Reads a field's raw text from `line` under the given policy.
///
/// Never panics: a range outside the line (or splitting a multi-byte
/// character) yields `""` when lenient, or an [`ExtractionError`] when strict.
pub fn extract_field<'a>(line: &'a str, field: &FieldDef, policy: ExtractPolicy) -> Result<&'a str> {
    match line.get(field.range()) {
        Some(value) => Ok(value),
        None => match policy {
            ExtractPolicy::Lenient => Ok(""),
            ExtractPolicy::Strict => Err(ExtractionError {
                field: field.name,
                start: field.start,
                end: field.end,
                line_length: line.len(),
            }
            .into()),
        },
    }
}

/// Parses a numeric field's text: surrounding whitespace is ignored.
pub fn parse_number(field: &FieldDef, raw: &str, policy: NumericPolicy) -> Result<i64> {
    let trimmed = raw.trim();
    match (trimmed.parse::<i64>(), policy) {
        (Ok(value), _) => Ok(value),
        (Err(_), NumericPolicy::Lenient) => {
            if !trimmed.is_empty() {
                debug!("{}: non-numeric {:?} read as 0", field.name, raw);
            }
            Ok(0)
        }
        (Err(_), NumericPolicy::Strict) => Err(SprError::InvalidNumber {
            field: field.name,
            value: raw.to_string(),
        }),
    }
}

/// Rejects any line that is not exactly one record long.
pub fn check_length(line: &str) -> Result<()> {
    if line.len() == RECORD_LENGTH {
        Ok(())
    } else {
        Err(SprError::RecordLength {
            expected: RECORD_LENGTH,
            actual: line.len(),
        })
    }
}

/// Field-slicing decoder parameterised by extraction and numeric policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    pub extract: ExtractPolicy,
    pub numeric: NumericPolicy,
}

impl Decoder {
    pub fn new(extract: ExtractPolicy, numeric: NumericPolicy) -> Self {
        Decoder { extract, numeric }
    }

    pub fn from_config(config: &ReaderConfig) -> Self {
        Decoder::new(config.extract_policy, config.numeric_policy)
    }

    fn text(&self, line: &str, field: &FieldDef) -> Result<String> {
        extract_field(line, field, self.extract).map(str::to_string)
    }

    fn number(&self, line: &str, field: &FieldDef) -> Result<i64> {
        let raw = extract_field(line, field, self.extract)?;
        parse_number(field, raw, self.numeric)
    }

    /// Decodes any record, dispatching on its tag.
    pub fn decode_record(&self, line: &str) -> Result<Record> {
        check_length(line)?;
        let record = match RecordTag::of_line(line)? {
            RecordTag::FileHeader => Record::FileHeader(self.file_header(line)?),
            RecordTag::AchScheduleHeader => {
                Record::AchScheduleHeader(self.ach_schedule_header(line)?)
            }
            RecordTag::AchPayment => Record::AchPayment(Box::new(self.ach_payment(line)?)),
            RecordTag::AchAddendum | RecordTag::CtxAddendum => {
                Record::Addendum(self.addendum(line)?)
            }
            RecordTag::CheckScheduleHeader => {
                Record::CheckScheduleHeader(self.check_schedule_header(line)?)
            }
            RecordTag::CheckPayment => Record::CheckPayment(Box::new(self.check_payment(line)?)),
            RecordTag::CheckStub => Record::CheckStub(self.check_stub(line)?),
            RecordTag::CarsTasBetc => Record::CarsTasBetc(self.cars_tas_betc(line)?),
            RecordTag::Dnp => Record::Dnp(self.dnp(line)?),
            RecordTag::ScheduleTrailer => Record::ScheduleTrailer(self.schedule_trailer(line)?),
            RecordTag::FileTrailer => Record::FileTrailer(self.file_trailer(line)?),
        };
        Ok(record)
    }

    pub fn file_header(&self, line: &str) -> Result<FileHeader> {
        check_length(line)?;
        Ok(FileHeader {
            input_system: self.text(line, &file_header::INPUT_SYSTEM)?,
            standard_payment_request_version: self.text(line, &file_header::VERSION)?,
            is_requested_for_same_day_ach: self.text(line, &file_header::SAME_DAY_ACH)?,
        })
    }

    pub fn file_trailer(&self, line: &str) -> Result<FileTrailer> {
        check_length(line)?;
        Ok(FileTrailer {
            total_count_records: self.number(line, &file_trailer::TOTAL_COUNT_RECORDS)?,
            total_count_payments: self.number(line, &file_trailer::TOTAL_COUNT_PAYMENTS)?,
            total_amount_payments: self.number(line, &file_trailer::TOTAL_AMOUNT_PAYMENTS)?,
        })
    }

    pub fn ach_schedule_header(&self, line: &str) -> Result<AchScheduleHeader> {
        use ach_schedule_header as f;
        check_length(line)?;
        Ok(AchScheduleHeader {
            agency_ach_text: self.text(line, &f::AGENCY_ACH_TEXT)?,
            schedule_number: self.text(line, &f::SCHEDULE_NUMBER)?,
            payment_type_code: self.text(line, &f::PAYMENT_TYPE_CODE)?,
            standard_entry_class_code: self.text(line, &f::SEC_CODE)?,
            agency_location_code: self.text(line, &f::AGENCY_LOCATION_CODE)?,
            federal_employer_identification_number: self.text(line, &f::FEIN)?,
        })
    }

    pub fn check_schedule_header(&self, line: &str) -> Result<CheckScheduleHeader> {
        use check_schedule_header as f;
        check_length(line)?;
        Ok(CheckScheduleHeader {
            schedule_number: self.text(line, &f::SCHEDULE_NUMBER)?,
            payment_type_code: self.text(line, &f::PAYMENT_TYPE_CODE)?,
            agency_location_code: self.text(line, &f::AGENCY_LOCATION_CODE)?,
            check_payment_enclosure_code: self.text(line, &f::ENCLOSURE_CODE)?,
        })
    }

    pub fn schedule_trailer(&self, line: &str) -> Result<ScheduleTrailer> {
        check_length(line)?;
        Ok(ScheduleTrailer {
            schedule_count: self.number(line, &schedule_trailer::SCHEDULE_COUNT)?,
            schedule_amount: self.number(line, &schedule_trailer::SCHEDULE_AMOUNT)?,
        })
    }

    /// Decodes a `02` record. The SEC code is left empty; the reader fills
    /// it in from the enclosing schedule header.
    pub fn ach_payment(&self, line: &str) -> Result<AchPayment> {
        use ach_payment as f;
        check_length(line)?;
        Ok(AchPayment {
            agency_account_identifier: self.text(line, &f::AGENCY_ACCOUNT_IDENTIFIER)?,
            amount: self.number(line, &f::AMOUNT)?,
            agency_payment_type_code: self.text(line, &f::AGENCY_PAYMENT_TYPE_CODE)?,
            is_top_offset: self.text(line, &f::IS_TOP_OFFSET)?,
            payee_name: self.text(line, &f::PAYEE_NAME)?,
            payee_address_line_1: self.text(line, &f::PAYEE_ADDRESS_LINE_1)?,
            payee_address_line_2: self.text(line, &f::PAYEE_ADDRESS_LINE_2)?,
            city_name: self.text(line, &f::CITY_NAME)?,
            state_name: self.text(line, &f::STATE_NAME)?,
            state_code_text: self.text(line, &f::STATE_CODE_TEXT)?,
            postal_code: self.text(line, &f::POSTAL_CODE)?,
            postal_code_extension: self.text(line, &f::POSTAL_CODE_EXTENSION)?,
            country_code_text: self.text(line, &f::COUNTRY_CODE_TEXT)?,
            routing_number: self.text(line, &f::ROUTING_NUMBER)?,
            account_number: self.text(line, &f::ACCOUNT_NUMBER)?,
            ach_transaction_code: self.text(line, &f::TRANSACTION_CODE)?,
            payee_identifier_additional: self.text(line, &f::PAYEE_IDENTIFIER_ADDITIONAL)?,
            payee_name_additional: self.text(line, &f::PAYEE_NAME_ADDITIONAL)?,
            payment_id: self.text(line, &f::PAYMENT_ID)?,
            reconcilement: self.text(line, &f::RECONCILEMENT)?,
            tin: self.text(line, &f::TIN)?,
            payment_recipient_tin_indicator: self
                .text(line, &f::PAYMENT_RECIPIENT_TIN_INDICATOR)?,
            additional_payee_tin_indicator: self.text(line, &f::ADDITIONAL_PAYEE_TIN_INDICATOR)?,
            amount_eligible_for_offset: self.text(line, &f::AMOUNT_ELIGIBLE_FOR_OFFSET)?,
            payee_address_line_3: self.text(line, &f::PAYEE_ADDRESS_LINE_3)?,
            payee_address_line_4: self.text(line, &f::PAYEE_ADDRESS_LINE_4)?,
            country_name: self.text(line, &f::COUNTRY_NAME)?,
            consular_code: self.text(line, &f::CONSULAR_CODE)?,
            sub_payment_type_code: self.text(line, &f::SUB_PAYMENT_TYPE_CODE)?,
            payer_mechanism: self.text(line, &f::PAYER_MECHANISM)?,
            payment_description_code: self.text(line, &f::PAYMENT_DESCRIPTION_CODE)?,
            standard_entry_class_code: String::new(),
            addenda: Vec::new(),
            cars_tas_betc: Vec::new(),
            dnp: None,
        })
    }

    pub fn check_payment(&self, line: &str) -> Result<CheckPayment> {
        use check_payment as f;
        check_length(line)?;
        Ok(CheckPayment {
            agency_account_identifier: self.text(line, &f::AGENCY_ACCOUNT_IDENTIFIER)?,
            amount: self.number(line, &f::AMOUNT)?,
            agency_payment_type_code: self.text(line, &f::AGENCY_PAYMENT_TYPE_CODE)?,
            is_top_offset: self.text(line, &f::IS_TOP_OFFSET)?,
            payee_name: self.text(line, &f::PAYEE_NAME)?,
            payee_address_line_1: self.text(line, &f::PAYEE_ADDRESS_LINE_1)?,
            payee_address_line_2: self.text(line, &f::PAYEE_ADDRESS_LINE_2)?,
            payee_address_line_3: self.text(line, &f::PAYEE_ADDRESS_LINE_3)?,
            payee_address_line_4: self.text(line, &f::PAYEE_ADDRESS_LINE_4)?,
            city_name: self.text(line, &f::CITY_NAME)?,
            state_name: self.text(line, &f::STATE_NAME)?,
            state_code_text: self.text(line, &f::STATE_CODE_TEXT)?,
            postal_code: self.text(line, &f::POSTAL_CODE)?,
            postal_code_extension: self.text(line, &f::POSTAL_CODE_EXTENSION)?,
            postnet_barcode_delivery_point: self.text(line, &f::POSTNET_BARCODE_DELIVERY_POINT)?,
            country_name: self.text(line, &f::COUNTRY_NAME)?,
            consular_code: self.text(line, &f::CONSULAR_CODE)?,
            check_legend_text_1: self.text(line, &f::CHECK_LEGEND_TEXT_1)?,
            check_legend_text_2: self.text(line, &f::CHECK_LEGEND_TEXT_2)?,
            payee_identifier_secondary: self.text(line, &f::PAYEE_IDENTIFIER_SECONDARY)?,
            party_name_secondary: self.text(line, &f::PARTY_NAME_SECONDARY)?,
            payment_id: self.text(line, &f::PAYMENT_ID)?,
            reconcilement: self.text(line, &f::RECONCILEMENT)?,
            special_handling: self.text(line, &f::SPECIAL_HANDLING)?,
            tin: self.text(line, &f::TIN)?,
            usps_intelligent_mail_barcode: self.text(line, &f::USPS_INTELLIGENT_MAIL_BARCODE)?,
            payment_recipient_tin_indicator: self
                .text(line, &f::PAYMENT_RECIPIENT_TIN_INDICATOR)?,
            secondary_payee_tin_indicator: self.text(line, &f::SECONDARY_PAYEE_TIN_INDICATOR)?,
            amount_eligible_for_offset: self.text(line, &f::AMOUNT_ELIGIBLE_FOR_OFFSET)?,
            sub_payment_type_code: self.text(line, &f::SUB_PAYMENT_TYPE_CODE)?,
            payer_mechanism: self.text(line, &f::PAYER_MECHANISM)?,
            payment_description_code: self.text(line, &f::PAYMENT_DESCRIPTION_CODE)?,
            stub: None,
            cars_tas_betc: Vec::new(),
            dnp: None,
        })
    }

    /// Decodes a `03` or `04` record.
    pub fn addendum(&self, line: &str) -> Result<Addendum> {
        check_length(line)?;
        let (kind, payment_id, information) = match RecordTag::of_line(line)? {
            RecordTag::CtxAddendum => (
                AddendumKind::Ctx,
                &ctx_addendum::PAYMENT_ID,
                &ctx_addendum::ADDENDA_INFORMATION,
            ),
            RecordTag::AchAddendum => (
                AddendumKind::Plain,
                &ach_addendum::PAYMENT_ID,
                &ach_addendum::ADDENDA_INFORMATION,
            ),
            other => {
                return Err(SprError::UnexpectedRecord {
                    tag: other.code().to_string(),
                    message: "expected an addendum record".to_string(),
                })
            }
        };
        Ok(Addendum {
            kind,
            payment_id: self.text(line, payment_id)?,
            addenda_information: self.text(line, information)?,
        })
    }

    pub fn check_stub(&self, line: &str) -> Result<CheckStub> {
        check_length(line)?;
        let block = self.text(line, &check_stub::PAYMENT_IDENTIFICATION_LINES)?;
        let mut stub = CheckStub {
            payment_id: self.text(line, &check_stub::PAYMENT_ID)?,
            ..CheckStub::default()
        };
        for (i, slot) in stub.payment_identification_lines.iter_mut().enumerate() {
            let start = i * STUB_LINE_WIDTH;
            *slot = block
                .get(start..start + STUB_LINE_WIDTH)
                .unwrap_or_default()
                .to_string();
        }
        Ok(stub)
    }

    pub fn cars_tas_betc(&self, line: &str) -> Result<CarsTasBetc> {
        use cars_tas_betc as f;
        check_length(line)?;
        Ok(CarsTasBetc {
            payment_id: self.text(line, &f::PAYMENT_ID)?,
            sub_level_prefix_code: self.text(line, &f::SUB_LEVEL_PREFIX_CODE)?,
            allocation_transfer_agency_identifier: self
                .text(line, &f::ALLOCATION_TRANSFER_AGENCY_IDENTIFIER)?,
            agency_identifier: self.text(line, &f::AGENCY_IDENTIFIER)?,
            beginning_period_of_availability: self
                .text(line, &f::BEGINNING_PERIOD_OF_AVAILABILITY)?,
            ending_period_of_availability: self.text(line, &f::ENDING_PERIOD_OF_AVAILABILITY)?,
            availability_type_code: self.text(line, &f::AVAILABILITY_TYPE_CODE)?,
            main_account_code: self.text(line, &f::MAIN_ACCOUNT_CODE)?,
            sub_account_code: self.text(line, &f::SUB_ACCOUNT_CODE)?,
            business_event_type_code: self.text(line, &f::BUSINESS_EVENT_TYPE_CODE)?,
            amount: self.number(line, &f::AMOUNT)?,
            is_credit: self.text(line, &f::IS_CREDIT)?,
        })
    }

    pub fn dnp(&self, line: &str) -> Result<Dnp> {
        check_length(line)?;
        Ok(Dnp {
            payment_id: self.text(line, &dnp::PAYMENT_ID)?,
            dnp_detail: self.text(line, &dnp::DNP_DETAIL)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an 850-character line from (start, text) placements.
    fn line(parts: &[(usize, &str)]) -> String {
        let mut bytes = vec![b' '; RECORD_LENGTH];
        for (start, text) in parts {
            bytes[start - 1..start - 1 + text.len()].copy_from_slice(text.as_bytes());
        }
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_rejects_wrong_length_before_field_access() {
        let decoder = Decoder::default();
        let err = decoder.file_header("H short").unwrap_err();
        assert!(matches!(err, SprError::RecordLength { expected: 850, actual: 7 }));
    }

    #[test]
    fn test_file_header_keeps_padding() {
        let raw = line(&[(1, "H "), (3, "PAYROLL"), (43, "502"), (46, "1")]);
        let header = Decoder::default().file_header(&raw).unwrap();
        assert_eq!(header.input_system.len(), 40);
        assert_eq!(header.input_system.trim_end(), "PAYROLL");
        assert_eq!(header.standard_payment_request_version, "502");
        assert_eq!(header.is_requested_for_same_day_ach, "1");
    }

    #[test]
    fn test_numeric_fields_are_lenient_by_default() {
        let raw = line(&[(1, "E "), (3, "      000000000006"), (21, "  abc")]);
        let trailer = Decoder::default().file_trailer(&raw).unwrap();
        assert_eq!(trailer.total_count_records, 6);
        assert_eq!(trailer.total_count_payments, 0);
        assert_eq!(trailer.total_amount_payments, 0);
    }

    #[test]
    fn test_numeric_fields_strict() {
        let raw = line(&[(1, "E "), (3, "000000000000000006"), (21, "abc")]);
        let decoder = Decoder::new(ExtractPolicy::Strict, NumericPolicy::Strict);
        let err = decoder.file_trailer(&raw).unwrap_err();
        assert!(matches!(err, SprError::InvalidNumber { field: "TotalCount_Payments", .. }));
    }

    #[test]
    fn test_extract_field_out_of_range() {
        let field = ach_payment::PAYEE_NAME;
        assert_eq!(extract_field("02", &field, ExtractPolicy::Lenient).unwrap(), "");
        let err = extract_field("02", &field, ExtractPolicy::Strict).unwrap_err();
        match err {
            SprError::Extraction(e) => {
                assert_eq!(e.field, "PayeeName");
                assert_eq!((e.start, e.end, e.line_length), (31, 65, 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_ach_payment_fields() {
        let raw = line(&[
            (1, "02"),
            (19, "0000012345"),
            (31, "JANE DOE"),
            (187, "021000021"),
            (196, "987654321"),
            (213, "22"),
            (259, "PAY-1"),
            (279, "  RECON"),
        ]);
        let payment = Decoder::default().ach_payment(&raw).unwrap();
        assert_eq!(payment.amount, 12345);
        assert_eq!(payment.payee_name.trim_end(), "JANE DOE");
        assert_eq!(payment.routing_number, "021000021");
        assert_eq!(payment.ach_transaction_code, "22");
        assert_eq!(payment.payment_id.trim_end(), "PAY-1");
        assert!(payment.reconcilement.starts_with("  RECON"));
        assert_eq!(payment.reconcilement.len(), 100);
        assert!(payment.standard_entry_class_code.is_empty());
    }

    #[test]
    fn test_addendum_kind_follows_tag() {
        let plain = line(&[(1, "03"), (3, "PAY-1"), (23, "NOTE")]);
        let ctx = line(&[(1, "04"), (3, "PAY-1"), (23, "ISA*00")]);
        let decoder = Decoder::default();
        let a = decoder.addendum(&plain).unwrap();
        assert_eq!(a.kind, AddendumKind::Plain);
        assert_eq!(a.addenda_information.len(), 80);
        let b = decoder.addendum(&ctx).unwrap();
        assert_eq!(b.kind, AddendumKind::Ctx);
        assert_eq!(b.addenda_information.len(), 800);
        assert!(b.addenda_information.starts_with("ISA"));
    }

    #[test]
    fn test_check_stub_splits_lines() {
        let raw = line(&[(1, "13"), (3, "CHK-1"), (23, "FIRST"), (78, "SECOND")]);
        let stub = Decoder::default().check_stub(&raw).unwrap();
        assert_eq!(stub.payment_identification_lines[0].trim_end(), "FIRST");
        assert_eq!(stub.payment_identification_lines[1].trim_end(), "SECOND");
        assert!(stub.payment_identification_lines[13].trim().is_empty());
        assert!(stub.payment_identification_lines.iter().all(|l| l.len() == 55));
    }

    #[test]
    fn test_decode_record_dispatch() {
        let decoder = Decoder::default();
        let trailer = line(&[(1, "T "), (13, "00000002"), (24, "000000000300000")]);
        assert_eq!(
            decoder.decode_record(&trailer).unwrap(),
            Record::ScheduleTrailer(ScheduleTrailer {
                schedule_count: 2,
                schedule_amount: 300000
            })
        );
        let unknown = line(&[(1, "ZZ")]);
        assert!(matches!(
            decoder.decode_record(&unknown),
            Err(SprError::UnknownTag { .. })
        ));
    }

    #[test]
    fn test_cars_tas_betc_amount_and_flag() {
        let raw = line(&[(1, "G "), (3, "PAY-1"), (28, "020"), (47, "DISB"), (55, "0000000500"), (65, "1")]);
        let record = Decoder::default().cars_tas_betc(&raw).unwrap();
        assert_eq!(record.amount, 500);
        assert_eq!(record.is_credit, "1");
        assert_eq!(record.agency_identifier, "020");
    }
}
