//! Structural and business-rule validation.
//!
//! Each rule group is a free function returning the first violation it
//! finds. [`Validator`] runs the groups in a fixed order over a whole file,
//! either stopping at the first failure or collecting all of them.

use crate::config::ValidatorConfig;
use crate::error::{BalancingError, Result, SprError, ValidationError};
use crate::model::{
    AchPayment, AchSchedule, CheckPayment, File, FileHeader, PaymentRef, SameDayAch, Schedule,
    SUPPORTED_VERSION,
};
use crate::money::Dollars;
use crate::reconcilement;
use log::debug;

/// Largest single payment allowed in a Same-Day ACH file, in cents.
pub const SAME_DAY_ACH_MAX_AMOUNT: i64 = 100_000_000;

/// ACH transaction codes accepted on a payment record.
pub const ACH_TRANSACTION_CODES: [&str; 10] =
    ["22", "23", "24", "32", "33", "34", "42", "43", "52", "53"];

const ROUTING_WEIGHTS: [u32; 3] = [3, 7, 1];

fn fail(field: impl Into<String>, value: &str, rule: &'static str, message: impl Into<String>) -> SprError {
    ValidationError::new(field, value.trim_end(), rule, message).into()
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Header and trailer present, every schedule closed, every ACH payment
/// carrying its schedule's SEC code and every associated record tied to
/// its own payment.
pub fn validate_file_structure(file: &File) -> Result<()> {
    if file.header.is_none() {
        return Err(fail("FileHeader", "", "structure_header", "file header is missing"));
    }
    if file.trailer.is_none() {
        return Err(fail("FileTrailer", "", "structure_trailer", "file trailer is missing"));
    }

    for schedule in &file.schedules {
        let number = schedule.schedule_number().trim();
        if schedule.trailer().is_none() {
            return Err(fail(
                "ScheduleTrailer",
                number,
                "structure_schedule_trailer",
                format!("schedule {} has no trailer", number),
            ));
        }
        if let Schedule::Ach(ach) = schedule {
            let sec = ach.header.standard_entry_class_code.trim();
            for payment in &ach.payments {
                if payment.standard_entry_class_code.trim() != sec {
                    return Err(fail(
                        "StandardEntryClassCode",
                        &payment.standard_entry_class_code,
                        "sec_code_mismatch",
                        format!(
                            "payment {} does not carry schedule {} SEC code {}",
                            payment.payment_id.trim(),
                            number,
                            sec
                        ),
                    ));
                }
            }
        }
        for payment in schedule.payments() {
            check_associated_ids(payment)?;
        }
    }
    Ok(())
}

fn check_associated_ids(payment: PaymentRef<'_>) -> Result<()> {
    let parent = payment.payment_id().trim();
    let mut ids: Vec<&str> = Vec::new();
    match payment {
        PaymentRef::Ach(p) => {
            ids.extend(p.addenda.iter().map(|a| a.payment_id.as_str()));
            ids.extend(p.cars_tas_betc.iter().map(|c| c.payment_id.as_str()));
            ids.extend(p.dnp.iter().map(|d| d.payment_id.as_str()));
        }
        PaymentRef::Check(p) => {
            ids.extend(p.stub.iter().map(|s| s.payment_id.as_str()));
            ids.extend(p.cars_tas_betc.iter().map(|c| c.payment_id.as_str()));
            ids.extend(p.dnp.iter().map(|d| d.payment_id.as_str()));
        }
    }
    match ids.into_iter().find(|id| id.trim() != parent) {
        Some(orphan) => Err(fail(
            "PaymentID",
            orphan,
            "associated_payment_id",
            format!("associated record does not belong to payment {}", parent),
        )),
        None => Ok(()),
    }
}

/// Supported version and a well-formed Same-Day ACH flag.
pub fn validate_file_header(header: &FileHeader) -> Result<()> {
    let version = header.standard_payment_request_version.trim();
    if version != SUPPORTED_VERSION {
        return Err(fail(
            "StandardPaymentRequestVersion",
            version,
            "version",
            format!("only version {} is supported", SUPPORTED_VERSION),
        ));
    }
    if header.same_day_ach() == SameDayAch::Invalid {
        return Err(fail(
            "IsRequestedForSameDayACH",
            &header.is_requested_for_same_day_ach,
            "same_day_ach_flag",
            "must be blank, 0 or 1",
        ));
    }
    Ok(())
}

/// Nine digits, a Federal Reserve prefix and a valid ABA checksum.
pub fn validate_routing_number(routing: &str) -> Result<()> {
    let digits: Option<Vec<u32>> = routing.chars().map(|c| c.to_digit(10)).collect();
    let digits = match digits {
        Some(d) if d.len() == 9 => d,
        _ => {
            return Err(fail(
                "RoutingNumber",
                routing,
                "routing_number_format",
                "must be exactly 9 digits",
            ))
        }
    };

    let prefix = digits[0] * 10 + digits[1];
    if !matches!(prefix, 0..=12 | 21..=32 | 61..=72 | 80) {
        return Err(fail(
            "RoutingNumber",
            routing,
            "routing_number_prefix",
            format!("prefix {:02} is not a Federal Reserve routing symbol", prefix),
        ));
    }

    let sum: u32 = digits
        .iter()
        .zip(ROUTING_WEIGHTS.iter().cycle())
        .map(|(d, w)| d * w)
        .sum();
    if sum % 10 != 0 {
        return Err(fail(
            "RoutingNumber",
            routing,
            "routing_number_checksum",
            "checksum digit does not match",
        ));
    }
    Ok(())
}

fn validate_tin(tin: &str) -> Result<()> {
    let tin = tin.trim();
    if !tin.is_empty() && !(tin.len() == 9 && tin.bytes().all(|b| b.is_ascii_digit())) {
        return Err(fail("TIN", tin, "tin_format", "must be exactly 9 digits"));
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if is_blank(value) {
        return Err(fail(field, value, "required", format!("{} is required", field)));
    }
    Ok(())
}

/// Field-level rules for one ACH payment.
pub fn validate_ach_payment(p: &AchPayment) -> Result<()> {
    if p.amount < 0 {
        return Err(fail(
            "Amount",
            &p.amount.to_string(),
            "amount_non_negative",
            "ACH amount cannot be negative",
        ));
    }
    require("PayeeName", &p.payee_name)?;
    require("PaymentID", &p.payment_id)?;

    let account = p.account_number.trim();
    if account.is_empty() || account.bytes().all(|b| b == b'0') {
        return Err(fail(
            "AccountNumber",
            account,
            "account_number",
            "account number cannot be blank or all zeros",
        ));
    }

    let code = p.ach_transaction_code.trim();
    if !ACH_TRANSACTION_CODES.contains(&code) {
        return Err(fail(
            "ACH_TransactionCode",
            code,
            "transaction_code",
            format!("must be one of {}", ACH_TRANSACTION_CODES.join(", ")),
        ));
    }

    validate_routing_number(p.routing_number.trim())?;
    validate_tin(&p.tin)?;

    if p.standard_entry_class_code.trim() == "IAT" {
        if is_blank(&p.payee_address_line_1) {
            return Err(fail(
                "PayeeAddressLine1",
                &p.payee_address_line_1,
                "iat_address",
                "IAT payments need a street address",
            ));
        }
        if is_blank(&p.city_name) {
            return Err(fail("CityName", &p.city_name, "iat_address", "IAT payments need a city"));
        }
        let country = p.country_code_text.trim();
        if country.is_empty() || country == "00" {
            return Err(fail(
                "CountryCodeText",
                country,
                "iat_country",
                "IAT payments need a country code",
            ));
        }
    }
    Ok(())
}

/// Field-level rules for one check payment.
pub fn validate_check_payment(p: &CheckPayment) -> Result<()> {
    if p.amount <= 0 {
        return Err(fail(
            "Amount",
            &p.amount.to_string(),
            "check_amount_positive",
            "check amount must be greater than zero",
        ));
    }
    require("PayeeName", &p.payee_name)?;
    require("PaymentID", &p.payment_id)?;
    require("PayeeAddressLine1", &p.payee_address_line_1)?;
    validate_tin(&p.tin)
}

/// CTX payments need `04` addenda, the first opening an ISA segment.
pub fn validate_ctx_addenda(p: &AchPayment) -> Result<()> {
    use crate::model::AddendumKind;

    if p.standard_entry_class_code.trim() != "CTX" {
        return Ok(());
    }
    let id = p.payment_id.trim();
    let first = match p.addenda.first() {
        Some(first) => first,
        None => {
            return Err(fail(
                "Addenda",
                id,
                "ctx_required",
                format!("CTX payment {} has no addendum", id),
            ))
        }
    };
    if let Some(plain) = p.addenda.iter().find(|a| a.kind != AddendumKind::Ctx) {
        return Err(fail(
            "RecordCode",
            plain.kind.record_tag().code(),
            "ctx_record_code",
            format!("CTX payment {} addenda must use record code 04", id),
        ));
    }
    if !first.addenda_information.starts_with("ISA") {
        let head: String = first.addenda_information.chars().take(3).collect();
        return Err(fail(
            "AddendaInformation",
            &head,
            "ctx_isa_segment",
            format!("CTX payment {} addendum must begin with an ISA segment", id),
        ));
    }
    Ok(())
}

/// ACH payments must be sorted by routing number within their schedule.
pub fn validate_ach_payment_order(schedule: &AchSchedule) -> Result<()> {
    for pair in schedule.payments.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.routing_number < prev.routing_number {
            return Err(fail(
                "RoutingNumber",
                &next.routing_number,
                "ach_payment_order",
                format!(
                    "payment {} sorts before payment {} in schedule {}",
                    next.payment_id.trim(),
                    prev.payment_id.trim(),
                    schedule.header.schedule_number.trim()
                ),
            ));
        }
    }
    Ok(())
}

/// Same-Day ACH limits, active only when the header requests it.
pub fn validate_same_day_ach(file: &File) -> Result<()> {
    let requested = file
        .header
        .as_ref()
        .map(|h| h.same_day_ach() == SameDayAch::Yes)
        .unwrap_or(false);
    if !requested {
        return Ok(());
    }

    for schedule in &file.schedules {
        let ach = match schedule {
            Schedule::Ach(ach) => ach,
            Schedule::Check(check) => {
                return Err(fail(
                    "ScheduleNumber",
                    &check.header.schedule_number,
                    "sda_ach_only",
                    "Same-Day ACH files cannot contain check schedules",
                ))
            }
        };
        if ach.header.standard_entry_class_code.trim() == "IAT" {
            return Err(fail(
                "StandardEntryClassCode",
                "IAT",
                "sda_no_iat",
                "IAT payments are not eligible for Same-Day ACH",
            ));
        }
        if let Some(p) = ach.payments.iter().find(|p| p.amount > SAME_DAY_ACH_MAX_AMOUNT) {
            return Err(fail(
                "Amount",
                &p.amount.to_string(),
                "sda_max_amount",
                format!(
                    "payment {} for {} exceeds the Same-Day ACH limit of {}",
                    p.payment_id.trim(),
                    Dollars::from_cents(p.amount),
                    Dollars::from_cents(SAME_DAY_ACH_MAX_AMOUNT)
                ),
            ));
        }
    }
    Ok(())
}

fn balance(scope: &str, field: &'static str, expected: i64, actual: i64) -> Result<()> {
    if expected != actual {
        return Err(BalancingError {
            scope: scope.to_string(),
            field,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

/// Trailer counts and amounts must equal the recomputed totals, schedules
/// first and then the file.
pub fn validate_balancing(file: &File) -> Result<()> {
    for schedule in &file.schedules {
        let scope = format!("schedule {}", schedule.schedule_number().trim());
        let trailer = schedule
            .trailer()
            .ok_or(SprError::MissingRecord("schedule trailer"))?;
        let totals = schedule.totals();
        balance(&scope, "ScheduleTrailer.ScheduleCount", totals.payments, trailer.schedule_count)?;
        balance(&scope, "ScheduleTrailer.ScheduleAmount", totals.amount, trailer.schedule_amount)?;
    }

    let trailer = file.trailer.as_ref().ok_or(SprError::MissingRecord("file trailer"))?;
    let totals = file.totals();
    balance("file", "FileTrailer.TotalCountRecords", totals.records, trailer.total_count_records)?;
    balance("file", "FileTrailer.TotalCountPayments", totals.payments, trailer.total_count_payments)?;
    balance("file", "FileTrailer.TotalAmountPayments", totals.amount, trailer.total_amount_payments)?;
    Ok(())
}

/// Runs every rule group over a file.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Validator { config }
    }

    /// First violation, in rule-group order.
    pub fn validate(&self, file: &File) -> Result<()> {
        match self.collect(file).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every violation: at most one per rule group per schedule or payment.
    ///
    /// A structurally broken file reports only its structural error, since
    /// the remaining groups depend on headers and trailers being present.
    pub fn collect(&self, file: &File) -> Vec<SprError> {
        let mut errors = Vec::new();
        if let Err(e) = validate_file_structure(file) {
            errors.push(e);
            return errors;
        }
        if let Some(header) = &file.header {
            errors.extend(validate_file_header(header).err());
        }

        for schedule in &file.schedules {
            if let Schedule::Ach(ach) = schedule {
                errors.extend(validate_ach_payment_order(ach).err());
            }
        }

        for (_, _, payment) in file.payments() {
            match payment {
                PaymentRef::Ach(p) => {
                    errors.extend(validate_ach_payment(p).err());
                    errors.extend(validate_ctx_addenda(p).err());
                }
                PaymentRef::Check(p) => errors.extend(validate_check_payment(p).err()),
            }
        }

        errors.extend(validate_same_day_ach(file).err());
        errors.extend(validate_balancing(file).err());

        if let Some(agency) = self.config.agency {
            for (_, _, payment) in file.payments() {
                errors.extend(
                    reconcilement::validate_reconcilement(agency, payment.reconcilement())
                        .map_err(|e| match e {
                            SprError::Validation(mut v) => {
                                v.message =
                                    format!("payment {}: {}", payment.payment_id().trim(), v.message);
                                SprError::Validation(v)
                            }
                            other => other,
                        })
                        .err(),
                );
            }
        }

        debug!("validation found {} problem(s)", errors.len());
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AchScheduleHeader, Addendum, AddendumKind, CheckSchedule, FileTrailer, ScheduleTrailer,
    };

    fn ach(id: &str, amount: i64) -> AchPayment {
        AchPayment {
            standard_entry_class_code: "PPD".into(),
            ..AchPayment::new(id, "JANE DOE", amount, "021000021", "12345678", "22")
        }
    }

    fn ach_file(payments: Vec<AchPayment>, sec: &str) -> File {
        let payments = payments
            .into_iter()
            .map(|p| AchPayment {
                standard_entry_class_code: sec.into(),
                ..p
            })
            .collect();
        let mut file = File {
            header: Some(FileHeader::new("SYS")),
            schedules: vec![Schedule::Ach(AchSchedule {
                header: AchScheduleHeader {
                    schedule_number: "00000000000001".into(),
                    standard_entry_class_code: sec.into(),
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

    fn rule(result: Result<()>) -> String {
        result.unwrap_err().rule().unwrap_or_default().to_string()
    }

    #[test]
    fn test_routing_numbers() {
        assert!(validate_routing_number("021000021").is_ok());
        assert!(validate_routing_number("011000015").is_ok());
        assert_eq!(rule(validate_routing_number("123456789")), "routing_number_checksum");
        assert_eq!(rule(validate_routing_number("991000021")), "routing_number_prefix");
        assert_eq!(rule(validate_routing_number("02100002")), "routing_number_format");
        assert_eq!(rule(validate_routing_number("02100002X")), "routing_number_format");
    }

    #[test]
    fn test_ach_field_rules() {
        assert!(validate_ach_payment(&ach("P1", 0)).is_ok());
        assert_eq!(rule(validate_ach_payment(&ach("P1", -1))), "amount_non_negative");
        assert_eq!(rule(validate_ach_payment(&ach(" ", 10))), "required");

        let mut zeros = ach("P1", 10);
        zeros.account_number = "0000000".into();
        assert_eq!(rule(validate_ach_payment(&zeros)), "account_number");

        let mut code = ach("P1", 10);
        code.ach_transaction_code = "27".into();
        assert_eq!(rule(validate_ach_payment(&code)), "transaction_code");

        let mut tin = ach("P1", 10);
        tin.tin = "12345".into();
        assert_eq!(rule(validate_ach_payment(&tin)), "tin_format");
        tin.tin = "123456789".into();
        assert!(validate_ach_payment(&tin).is_ok());
    }

    #[test]
    fn test_iat_requires_address() {
        let mut p = ach("P1", 10);
        p.standard_entry_class_code = "IAT".into();
        assert_eq!(rule(validate_ach_payment(&p)), "iat_address");
        p.payee_address_line_1 = "1 RUE".into();
        p.city_name = "PARIS".into();
        p.country_code_text = "00".into();
        assert_eq!(rule(validate_ach_payment(&p)), "iat_country");
        p.country_code_text = "FR".into();
        assert!(validate_ach_payment(&p).is_ok());
    }

    #[test]
    fn test_check_amount_must_be_positive() {
        let mut p = CheckPayment::new("C1", "JOHN", 0, "1 MAIN ST");
        assert_eq!(rule(validate_check_payment(&p)), "check_amount_positive");
        p.amount = 1;
        assert!(validate_check_payment(&p).is_ok());
        p.payee_address_line_1.clear();
        assert_eq!(rule(validate_check_payment(&p)), "required");
    }

    #[test]
    fn test_ctx_addenda() {
        let mut p = ach("P1", 10);
        p.standard_entry_class_code = "CTX".into();
        assert_eq!(rule(validate_ctx_addenda(&p)), "ctx_required");

        p.addenda.push(Addendum {
            kind: AddendumKind::Ctx,
            payment_id: "P1".into(),
            addenda_information: "ISA*00*".into(),
        });
        assert!(validate_ctx_addenda(&p).is_ok());

        p.addenda[0].kind = AddendumKind::Plain;
        assert_eq!(rule(validate_ctx_addenda(&p)), "ctx_record_code");

        p.addenda[0].kind = AddendumKind::Ctx;
        p.addenda[0].addenda_information = "GS*".into();
        assert_eq!(rule(validate_ctx_addenda(&p)), "ctx_isa_segment");
    }

    #[test]
    fn test_payment_order() {
        let mut low = ach("P1", 10);
        low.routing_number = "011000015".into();
        let file = ach_file(vec![ach("P2", 10), low], "PPD");
        match &file.schedules[0] {
            Schedule::Ach(s) => assert_eq!(rule(validate_ach_payment_order(s)), "ach_payment_order"),
            Schedule::Check(_) => unreachable!(),
        }
    }

    #[test]
    fn test_same_day_ach_boundary() {
        let mut file = ach_file(vec![ach("P1", SAME_DAY_ACH_MAX_AMOUNT)], "CCD");
        if let Some(h) = file.header.as_mut() {
            h.is_requested_for_same_day_ach = "1".into();
        }
        assert!(validate_same_day_ach(&file).is_ok());

        if let Schedule::Ach(s) = &mut file.schedules[0] {
            s.payments[0].amount += 1;
        }
        assert_eq!(rule(validate_same_day_ach(&file)), "sda_max_amount");

        if let Schedule::Ach(s) = &mut file.schedules[0] {
            s.payments[0].amount -= 1;
        }
        file.schedules.push(Schedule::Check(CheckSchedule {
            trailer: Some(ScheduleTrailer::default()),
            ..CheckSchedule::default()
        }));
        assert_eq!(rule(validate_same_day_ach(&file)), "sda_ach_only");
    }

    #[test]
    fn test_same_day_ach_rejects_iat_and_ignores_unset_flag() {
        let mut file = ach_file(vec![ach("P1", SAME_DAY_ACH_MAX_AMOUNT + 1)], "IAT");
        assert!(validate_same_day_ach(&file).is_ok());
        if let Some(h) = file.header.as_mut() {
            h.is_requested_for_same_day_ach = "1".into();
        }
        assert_eq!(rule(validate_same_day_ach(&file)), "sda_no_iat");
    }

    #[test]
    fn test_balancing_scenario() {
        let mut file = ach_file(vec![ach("P1", 100_000), ach("P2", 200_000)], "PPD");
        assert_eq!(
            file.trailer,
            Some(FileTrailer {
                total_count_records: 6,
                total_count_payments: 2,
                total_amount_payments: 300_000
            })
        );
        assert!(validate_balancing(&file).is_ok());

        if let Some(t) = file.trailer.as_mut() {
            t.total_count_payments = 3;
        }
        match validate_balancing(&file).unwrap_err() {
            SprError::Balancing(b) => {
                assert_eq!(b.field, "FileTrailer.TotalCountPayments");
                assert_eq!((b.expected, b.actual), (2, 3));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_schedule_mismatch_reported_before_file() {
        let mut file = ach_file(vec![ach("P1", 100)], "PPD");
        if let Some(t) = file.schedules[0].trailer_mut() {
            t.schedule_amount = 99;
        }
        if let Some(t) = file.trailer.as_mut() {
            t.total_amount_payments = 98;
        }
        match validate_balancing(&file).unwrap_err() {
            SprError::Balancing(b) => {
                assert_eq!(b.field, "ScheduleTrailer.ScheduleAmount");
                assert_eq!(b.scope, "schedule 00000000000001");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_structure_rules() {
        let mut file = ach_file(vec![ach("P1", 100)], "PPD");
        assert!(validate_file_structure(&file).is_ok());

        if let Schedule::Ach(s) = &mut file.schedules[0] {
            s.payments[0].standard_entry_class_code = "CCD".into();
        }
        assert_eq!(rule(validate_file_structure(&file)), "sec_code_mismatch");

        if let Schedule::Ach(s) = &mut file.schedules[0] {
            s.payments[0].standard_entry_class_code = "PPD".into();
            s.payments[0].addenda.push(Addendum {
                payment_id: "OTHER".into(),
                ..Addendum::default()
            });
        }
        assert_eq!(rule(validate_file_structure(&file)), "associated_payment_id");

        file.trailer = None;
        assert_eq!(rule(validate_file_structure(&file)), "structure_trailer");
        file.header = None;
        assert_eq!(rule(validate_file_structure(&file)), "structure_header");
    }

    #[test]
    fn test_file_header_rules() {
        let mut header = FileHeader::new("SYS");
        assert!(validate_file_header(&header).is_ok());
        header.is_requested_for_same_day_ach = "Y".into();
        assert_eq!(rule(validate_file_header(&header)), "same_day_ach_flag");
        header.is_requested_for_same_day_ach = " ".into();
        header.standard_payment_request_version = "501".into();
        assert_eq!(rule(validate_file_header(&header)), "version");
    }

    #[test]
    fn test_validator_collects_across_groups() {
        let mut bad_tin = ach("P2", 200);
        bad_tin.tin = "12".into();
        let mut file = ach_file(vec![ach("P1", 100), bad_tin], "PPD");
        if let Some(t) = file.trailer.as_mut() {
            t.total_amount_payments = 1;
        }
        let errors = Validator::default().collect(&file);
        let rules: Vec<&str> = errors.iter().filter_map(|e| e.rule()).collect();
        assert_eq!(rules, vec!["tin_format", "balancing"]);
        assert_eq!(Validator::default().validate(&file).unwrap_err().rule(), Some("tin_format"));
    }
}
