//! Field registry: the fixed byte layout of every record kind.
//!
//! Positions are 1-based and inclusive, exactly as published in the file
//! format. Each layout is a `const` slice, so both the decoder and encoder
//! address fields through named constants rather than string lookups; the
//! by-name index is built once, lazily, for callers that need it.

use crate::error::{Result, SprError};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Every physical record is exactly this many characters.
pub const RECORD_LENGTH: usize = 850;

/// How a field is justified and padded on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Left-justified, space-padded.
    Text,
    /// Right-justified, zero-padded digits.
    Numeric,
    /// Space-padded to width as-is; embedded layout is the caller's.
    NoJustify,
    /// Free-form identifier, right-justified and zero-filled.
    ZeroFilled,
    /// Unused bytes, always spaces.
    Filler,
}

/// One field of a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub start: usize,
    pub end: usize,
    pub length: usize,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDef {
    /// Zero-based byte range of the field.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start - 1..self.end
    }

    pub fn is_filler(&self) -> bool {
        self.name.contains("Filler")
    }
}

/// The closed set of record kinds, keyed by the tag in bytes 1-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordTag {
    FileHeader,
    AchScheduleHeader,
    AchPayment,
    AchAddendum,
    CtxAddendum,
    CheckScheduleHeader,
    CheckPayment,
    CheckStub,
    CarsTasBetc,
    Dnp,
    ScheduleTrailer,
    FileTrailer,
}

impl RecordTag {
    pub const ALL: [RecordTag; 12] = [
        RecordTag::FileHeader,
        RecordTag::AchScheduleHeader,
        RecordTag::AchPayment,
        RecordTag::AchAddendum,
        RecordTag::CtxAddendum,
        RecordTag::CheckScheduleHeader,
        RecordTag::CheckPayment,
        RecordTag::CheckStub,
        RecordTag::CarsTasBetc,
        RecordTag::Dnp,
        RecordTag::ScheduleTrailer,
        RecordTag::FileTrailer,
    ];

    /// The two-character wire tag.
    pub fn code(self) -> &'static str {
        match self {
            RecordTag::FileHeader => "H ",
            RecordTag::AchScheduleHeader => "01",
            RecordTag::AchPayment => "02",
            RecordTag::AchAddendum => "03",
            RecordTag::CtxAddendum => "04",
            RecordTag::CheckScheduleHeader => "11",
            RecordTag::CheckPayment => "12",
            RecordTag::CheckStub => "13",
            RecordTag::CarsTasBetc => "G ",
            RecordTag::Dnp => "DD",
            RecordTag::ScheduleTrailer => "T ",
            RecordTag::FileTrailer => "E ",
        }
    }

    pub fn from_code(code: &str) -> Option<RecordTag> {
        RecordTag::ALL.into_iter().find(|tag| tag.code() == code)
    }

    /// Reads the tag from the first two bytes of a line.
    pub fn of_line(line: &str) -> Result<RecordTag> {
        match line.get(..2).and_then(RecordTag::from_code) {
            Some(tag) => Ok(tag),
            None => Err(SprError::UnknownTag {
                tag: line.chars().take(2).collect(),
            }),
        }
    }

    /// Whether this record belongs to the payment group of a payment of the
    /// given kind (addenda, stub, accounting classification, DNP).
    pub fn is_associated_with(self, payment: RecordTag) -> bool {
        match (payment, self) {
            (RecordTag::AchPayment, RecordTag::AchAddendum | RecordTag::CtxAddendum) => true,
            (RecordTag::CheckPayment, RecordTag::CheckStub) => true,
            (
                RecordTag::AchPayment | RecordTag::CheckPayment,
                RecordTag::CarsTasBetc | RecordTag::Dnp,
            ) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.code())
    }
}

macro_rules! layout {
    ($module:ident { $($konst:ident: $name:literal, $start:literal, $end:literal, $len:literal, $kind:ident, $req:literal;)+ }) => {
        pub mod $module {
            use super::{FieldDef, FieldKind};
            $(
                pub const $konst: FieldDef = FieldDef {
                    name: $name,
                    start: $start,
                    end: $end,
                    length: $len,
                    kind: FieldKind::$kind,
                    required: $req,
                };
            )+
            pub const FIELDS: &[FieldDef] = &[$($konst),+];
        }
    };
}

layout!(file_header {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    INPUT_SYSTEM: "InputSystem", 3, 42, 40, Text, true;
    VERSION: "StandardPaymentRequestVersion", 43, 45, 3, Text, true;
    SAME_DAY_ACH: "IsRequestedForSameDayACH", 46, 46, 1, Text, false;
    FILLER: "Filler", 47, 850, 804, Filler, false;
});

layout!(ach_schedule_header {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    AGENCY_ACH_TEXT: "AgencyACHText", 3, 6, 4, Text, false;
    SCHEDULE_NUMBER: "ScheduleNumber", 7, 20, 14, ZeroFilled, true;
    PAYMENT_TYPE_CODE: "PaymentTypeCode", 21, 45, 25, Text, true;
    SEC_CODE: "StandardEntryClassCode", 46, 48, 3, Text, true;
    AGENCY_LOCATION_CODE: "AgencyLocationCode", 49, 56, 8, Text, true;
    FILLER_1: "Filler1", 57, 57, 1, Filler, false;
    FEIN: "FederalEmployerIdentificationNumber", 58, 67, 10, Text, false;
    FILLER_2: "Filler2", 68, 850, 783, Filler, false;
});

layout!(ach_payment {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    AGENCY_ACCOUNT_IDENTIFIER: "AgencyAccountIdentifier", 3, 18, 16, Text, false;
    AMOUNT: "Amount", 19, 28, 10, Numeric, true;
    AGENCY_PAYMENT_TYPE_CODE: "AgencyPaymentTypeCode", 29, 29, 1, Text, false;
    IS_TOP_OFFSET: "IsTOP_Offset", 30, 30, 1, Text, false;
    PAYEE_NAME: "PayeeName", 31, 65, 35, Text, true;
    PAYEE_ADDRESS_LINE_1: "PayeeAddressLine1", 66, 100, 35, Text, false;
    PAYEE_ADDRESS_LINE_2: "PayeeAddressLine2", 101, 135, 35, Text, false;
    CITY_NAME: "CityName", 136, 162, 27, Text, false;
    STATE_NAME: "StateName", 163, 172, 10, Text, false;
    STATE_CODE_TEXT: "StateCodeText", 173, 174, 2, Text, false;
    POSTAL_CODE: "PostalCode", 175, 179, 5, Text, false;
    POSTAL_CODE_EXTENSION: "PostalCodeExtension", 180, 184, 5, Text, false;
    COUNTRY_CODE_TEXT: "CountryCodeText", 185, 186, 2, Text, false;
    ROUTING_NUMBER: "RoutingNumber", 187, 195, 9, Text, true;
    ACCOUNT_NUMBER: "AccountNumber", 196, 212, 17, Text, true;
    TRANSACTION_CODE: "ACH_TransactionCode", 213, 214, 2, Text, true;
    PAYEE_IDENTIFIER_ADDITIONAL: "PayeeIdentifierAdditional", 215, 223, 9, Text, false;
    PAYEE_NAME_ADDITIONAL: "PayeeNameAdditional", 224, 258, 35, Text, false;
    PAYMENT_ID: "PaymentID", 259, 278, 20, Text, true;
    RECONCILEMENT: "Reconcilement", 279, 378, 100, NoJustify, false;
    TIN: "TIN", 379, 387, 9, Text, false;
    PAYMENT_RECIPIENT_TIN_INDICATOR: "PaymentRecipientTINIndicator", 388, 388, 1, Text, false;
    ADDITIONAL_PAYEE_TIN_INDICATOR: "AdditionalPayeeTINIndicator", 389, 389, 1, Text, false;
    AMOUNT_ELIGIBLE_FOR_OFFSET: "AmountEligibleForOffset", 390, 399, 10, Text, false;
    PAYEE_ADDRESS_LINE_3: "PayeeAddressLine3", 400, 434, 35, Text, false;
    PAYEE_ADDRESS_LINE_4: "PayeeAddressLine4", 435, 469, 35, Text, false;
    COUNTRY_NAME: "CountryName", 470, 509, 40, Text, false;
    CONSULAR_CODE: "ConsularCode", 510, 512, 3, Text, false;
    SUB_PAYMENT_TYPE_CODE: "SubPaymentTypeCode", 513, 544, 32, Text, false;
    PAYER_MECHANISM: "PayerMechanism", 545, 564, 20, Text, false;
    PAYMENT_DESCRIPTION_CODE: "PaymentDescriptionCode", 565, 566, 2, Text, false;
    FILLER: "Filler", 567, 850, 284, Filler, false;
});

layout!(ach_addendum {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    PAYMENT_ID: "PaymentID", 3, 22, 20, Text, true;
    ADDENDA_INFORMATION: "AddendaInformation", 23, 102, 80, NoJustify, true;
    FILLER: "Filler", 103, 850, 748, Filler, false;
});

layout!(ctx_addendum {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    PAYMENT_ID: "PaymentID", 3, 22, 20, Text, true;
    ADDENDA_INFORMATION: "AddendaInformation", 23, 822, 800, NoJustify, true;
    FILLER: "Filler", 823, 850, 28, Filler, false;
});

layout!(check_schedule_header {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    SCHEDULE_NUMBER: "ScheduleNumber", 3, 16, 14, ZeroFilled, true;
    PAYMENT_TYPE_CODE: "PaymentTypeCode", 17, 41, 25, Text, true;
    AGENCY_LOCATION_CODE: "AgencyLocationCode", 42, 49, 8, Text, true;
    FILLER_1: "Filler1", 50, 58, 9, Filler, false;
    ENCLOSURE_CODE: "CheckPaymentEnclosureCode", 59, 68, 10, Text, false;
    FILLER_2: "Filler2", 69, 850, 782, Filler, false;
});

layout!(check_payment {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    AGENCY_ACCOUNT_IDENTIFIER: "AgencyAccountIdentifier", 3, 18, 16, Text, false;
    AMOUNT: "Amount", 19, 28, 10, Numeric, true;
    AGENCY_PAYMENT_TYPE_CODE: "AgencyPaymentTypeCode", 29, 29, 1, Text, false;
    IS_TOP_OFFSET: "IsTOP_Offset", 30, 30, 1, Text, false;
    PAYEE_NAME: "PayeeName", 31, 65, 35, Text, true;
    PAYEE_ADDRESS_LINE_1: "PayeeAddressLine1", 66, 100, 35, Text, true;
    PAYEE_ADDRESS_LINE_2: "PayeeAddressLine2", 101, 135, 35, Text, false;
    PAYEE_ADDRESS_LINE_3: "PayeeAddressLine3", 136, 170, 35, Text, false;
    PAYEE_ADDRESS_LINE_4: "PayeeAddressLine4", 171, 205, 35, Text, false;
    CITY_NAME: "CityName", 206, 232, 27, Text, false;
    STATE_NAME: "StateName", 233, 242, 10, Text, false;
    STATE_CODE_TEXT: "StateCodeText", 243, 244, 2, Text, false;
    POSTAL_CODE: "PostalCode", 245, 249, 5, Text, false;
    POSTAL_CODE_EXTENSION: "PostalCodeExtension", 250, 254, 5, Text, false;
    POSTNET_BARCODE_DELIVERY_POINT: "PostNetBarcodeDeliveryPoint", 255, 257, 3, Text, false;
    FILLER_1: "Filler1", 258, 271, 14, Filler, false;
    COUNTRY_NAME: "CountryName", 272, 311, 40, Text, false;
    CONSULAR_CODE: "ConsularCode", 312, 314, 3, Text, false;
    CHECK_LEGEND_TEXT_1: "CheckLegendText1", 315, 369, 55, Text, false;
    CHECK_LEGEND_TEXT_2: "CheckLegendText2", 370, 424, 55, Text, false;
    PAYEE_IDENTIFIER_SECONDARY: "PayeeIdentifierSecondary", 425, 433, 9, Text, false;
    PARTY_NAME_SECONDARY: "PartyNameSecondary", 434, 468, 35, Text, false;
    PAYMENT_ID: "PaymentID", 469, 488, 20, Text, true;
    RECONCILEMENT: "Reconcilement", 489, 588, 100, NoJustify, false;
    SPECIAL_HANDLING: "SpecialHandling", 589, 638, 50, Text, false;
    TIN: "TIN", 639, 647, 9, Text, false;
    USPS_INTELLIGENT_MAIL_BARCODE: "USPSIntelligentMailBarCode", 648, 697, 50, Text, false;
    PAYMENT_RECIPIENT_TIN_INDICATOR: "PaymentRecipientTINIndicator", 698, 698, 1, Text, false;
    SECONDARY_PAYEE_TIN_INDICATOR: "SecondaryPayeeTINIndicator", 699, 699, 1, Text, false;
    AMOUNT_ELIGIBLE_FOR_OFFSET: "AmountEligibleForOffset", 700, 709, 10, Text, false;
    SUB_PAYMENT_TYPE_CODE: "SubPaymentTypeCode", 710, 741, 32, Text, false;
    PAYER_MECHANISM: "PayerMechanism", 742, 761, 20, Text, false;
    PAYMENT_DESCRIPTION_CODE: "PaymentDescriptionCode", 762, 763, 2, Text, false;
    FILLER_2: "Filler2", 764, 850, 87, Filler, false;
});

layout!(check_stub {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    PAYMENT_ID: "PaymentID", 3, 22, 20, Text, true;
    PAYMENT_IDENTIFICATION_LINES: "PaymentIdentificationLines", 23, 792, 770, NoJustify, false;
    FILLER: "Filler", 793, 850, 58, Filler, false;
});

layout!(cars_tas_betc {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    PAYMENT_ID: "PaymentID", 3, 22, 20, Text, true;
    SUB_LEVEL_PREFIX_CODE: "SubLevelPrefixCode", 23, 24, 2, Text, false;
    ALLOCATION_TRANSFER_AGENCY_IDENTIFIER: "AllocationTransferAgencyIdentifier", 25, 27, 3, Text, false;
    AGENCY_IDENTIFIER: "AgencyIdentifier", 28, 30, 3, Text, true;
    BEGINNING_PERIOD_OF_AVAILABILITY: "BeginningPeriodOfAvailability", 31, 34, 4, Text, false;
    ENDING_PERIOD_OF_AVAILABILITY: "EndingPeriodOfAvailability", 35, 38, 4, Text, false;
    AVAILABILITY_TYPE_CODE: "AvailabilityTypeCode", 39, 39, 1, Text, false;
    MAIN_ACCOUNT_CODE: "MainAccountCode", 40, 43, 4, Text, true;
    SUB_ACCOUNT_CODE: "SubAccountCode", 44, 46, 3, Text, false;
    BUSINESS_EVENT_TYPE_CODE: "BusinessEventTypeCode", 47, 54, 8, Text, true;
    AMOUNT: "Amount", 55, 64, 10, Numeric, true;
    IS_CREDIT: "IsCredit", 65, 65, 1, Text, false;
    FILLER: "Filler", 66, 850, 785, Filler, false;
});

layout!(dnp {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    PAYMENT_ID: "PaymentID", 3, 22, 20, Text, true;
    DNP_DETAIL: "DNPDetail", 23, 788, 766, NoJustify, false;
    FILLER: "Filler", 789, 850, 62, Filler, false;
});

layout!(schedule_trailer {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    FILLER_1: "Filler1", 3, 12, 10, Filler, false;
    SCHEDULE_COUNT: "ScheduleCount", 13, 20, 8, Numeric, true;
    FILLER_2: "Filler2", 21, 23, 3, Filler, false;
    SCHEDULE_AMOUNT: "ScheduleAmount", 24, 38, 15, Numeric, true;
    FILLER_3: "Filler3", 39, 850, 812, Filler, false;
});

layout!(file_trailer {
    RECORD_CODE: "RecordCode", 1, 2, 2, Text, true;
    TOTAL_COUNT_RECORDS: "TotalCount_Records", 3, 20, 18, Numeric, true;
    TOTAL_COUNT_PAYMENTS: "TotalCount_Payments", 21, 38, 18, Numeric, true;
    TOTAL_AMOUNT_PAYMENTS: "TotalAmount_Payments", 39, 56, 18, Numeric, true;
    FILLER: "Filler", 57, 850, 794, Filler, false;
});

/// Width of one check stub line; a stub carries [`STUB_LINES`] of them.
pub const STUB_LINE_WIDTH: usize = 55;
pub const STUB_LINES: usize = 14;

/// The ordered fields of one record kind, with a by-name index.
#[derive(Debug)]
pub struct Layout {
    pub tag: RecordTag,
    pub fields: &'static [FieldDef],
    by_name: HashMap<&'static str, FieldDef>,
}

impl Layout {
    fn new(tag: RecordTag, fields: &'static [FieldDef]) -> Self {
        Layout {
            tag,
            fields,
            by_name: fields.iter().map(|f| (f.name, *f)).collect(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name)
    }
}

fn fields_of(tag: RecordTag) -> &'static [FieldDef] {
    match tag {
        RecordTag::FileHeader => file_header::FIELDS,
        RecordTag::AchScheduleHeader => ach_schedule_header::FIELDS,
        RecordTag::AchPayment => ach_payment::FIELDS,
        RecordTag::AchAddendum => ach_addendum::FIELDS,
        RecordTag::CtxAddendum => ctx_addendum::FIELDS,
        RecordTag::CheckScheduleHeader => check_schedule_header::FIELDS,
        RecordTag::CheckPayment => check_payment::FIELDS,
        RecordTag::CheckStub => check_stub::FIELDS,
        RecordTag::CarsTasBetc => cars_tas_betc::FIELDS,
        RecordTag::Dnp => dnp::FIELDS,
        RecordTag::ScheduleTrailer => schedule_trailer::FIELDS,
        RecordTag::FileTrailer => file_trailer::FIELDS,
    }
}

static REGISTRY: LazyLock<HashMap<RecordTag, Layout>> = LazyLock::new(|| {
    RecordTag::ALL
        .into_iter()
        .map(|tag| (tag, Layout::new(tag, fields_of(tag))))
        .collect()
});

/// Layout for a known record kind.
pub fn layout(tag: RecordTag) -> &'static Layout {
    // REGISTRY is built from RecordTag::ALL, so every tag is present.
    &REGISTRY[&tag]
}

/// Layout for a raw wire tag such as `"02"`.
pub fn layout_for_code(code: &str) -> Result<&'static Layout> {
    RecordTag::from_code(code)
        .map(layout)
        .ok_or_else(|| SprError::UnknownTag {
            tag: code.to_string(),
        })
}

/// Checks every layout for bounds, declared-length and overlap errors.
///
/// Returns one message per violation; an empty registry check is `Ok`.
pub fn verify() -> std::result::Result<(), Vec<String>> {
    let violations: Vec<String> = RecordTag::ALL
        .into_iter()
        .flat_map(|tag| verify_layout(tag, fields_of(tag)))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Violations in one table. Fillers may overlap anything.
fn verify_layout(tag: RecordTag, fields: &[FieldDef]) -> Vec<String> {
    let mut violations = Vec::new();
    for f in fields {
        if f.start < 1 || f.end > RECORD_LENGTH || f.start > f.end {
            violations.push(format!(
                "{} {}: range {}-{} out of bounds",
                tag, f.name, f.start, f.end
            ));
            continue;
        }
        if f.end - f.start + 1 != f.length {
            violations.push(format!(
                "{} {}: length {} does not match range {}-{}",
                tag, f.name, f.length, f.start, f.end
            ));
        }
    }

    let named: Vec<&FieldDef> = fields.iter().filter(|f| !f.is_filler()).collect();
    for (i, a) in named.iter().enumerate() {
        for b in &named[i + 1..] {
            if a.start <= b.end && b.start <= a.end {
                violations.push(format!(
                    "{} {} ({}-{}) overlaps {} ({}-{})",
                    tag, a.name, a.start, a.end, b.name, b.start, b.end
                ));
            }
        }
    }
    violations
}
