//! Agency-specific layouts of the 100-character reconcilement field.
//!
//! Each agency packs its own sub-fields into the payment's reconcilement
//! blob. Decoding is lenient: a short blob yields empty values for the
//! sub-fields it does not reach.

use crate::error::{Result, SprError, ValidationError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One sub-field, 1-based inclusive positions within the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubField {
    pub name: &'static str,
    pub start: usize,
    pub end: usize,
}

const fn sub(name: &'static str, start: usize, end: usize) -> SubField {
    SubField { name, start, end }
}

const IRS: &[SubField] = &[
    sub("MFTCode", 1, 2),
    sub("TaxPeriod", 3, 8),
    sub("DocumentLocatorNumber", 9, 22),
    sub("NameControl", 23, 26),
    sub("TaxpayerIdentificationNumber", 27, 35),
];

const VA: &[SubField] = &[
    sub("StationCode", 1, 3),
    sub("FinCode", 4, 5),
    sub("CourtesyCode", 6, 6),
    sub("AppropriationCode", 7, 10),
    sub("PolicyNumber", 11, 20),
    sub("PayPeriodInfo", 21, 50),
];

const SSA: &[SubField] = &[
    sub("ProgramServiceCenterCode", 1, 1),
    sub("PaymentIDCode", 2, 3),
    sub("TIN", 4, 12),
];

const SSA_A: &[SubField] = &[
    sub("ProgramServiceCenterCode", 1, 1),
    sub("PaymentIDCode", 2, 3),
    sub("TIN", 4, 12),
    sub("AdditionalAddressIndicator", 13, 13),
    sub("BenefitType", 14, 15),
];

const RRB: &[SubField] = &[
    sub("BeneficiarySymbol", 1, 2),
    sub("PrefixCode", 3, 3),
    sub("PayeeCode", 4, 4),
    sub("ObjectCode", 5, 5),
];

const CCC: &[SubField] = &[
    sub("StateCode", 1, 2),
    sub("CountyCode", 3, 5),
    sub("ProgramCode", 6, 9),
    sub("FiscalYear", 10, 13),
];

/// Agencies with a known reconcilement layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Agency {
    #[serde(rename = "IRS")]
    Irs,
    #[serde(rename = "VA")]
    Va,
    #[serde(rename = "SSA")]
    Ssa,
    #[serde(rename = "SSA-A")]
    SsaA,
    #[serde(rename = "RRB")]
    Rrb,
    #[serde(rename = "CCC")]
    Ccc,
}

impl Agency {
    pub const ALL: [Agency; 6] = [
        Agency::Irs,
        Agency::Va,
        Agency::Ssa,
        Agency::SsaA,
        Agency::Rrb,
        Agency::Ccc,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Agency::Irs => "IRS",
            Agency::Va => "VA",
            Agency::Ssa => "SSA",
            Agency::SsaA => "SSA-A",
            Agency::Rrb => "RRB",
            Agency::Ccc => "CCC",
        }
    }

    pub fn layout(self) -> &'static [SubField] {
        match self {
            Agency::Irs => IRS,
            Agency::Va => VA,
            Agency::Ssa => SSA,
            Agency::SsaA => SSA_A,
            Agency::Rrb => RRB,
            Agency::Ccc => CCC,
        }
    }

    /// Sub-fields that must not be blank.
    pub fn required(self) -> &'static [&'static str] {
        match self {
            Agency::Irs => &["TaxPeriod"],
            Agency::Va => &["StationCode", "FinCode"],
            Agency::Ssa | Agency::SsaA => &["ProgramServiceCenterCode", "PaymentIDCode"],
            Agency::Rrb => &["BeneficiarySymbol"],
            Agency::Ccc => &["ProgramCode"],
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Agency {
    type Err = SprError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Agency::ALL
            .into_iter()
            .find(|a| a.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SprError::Usage(format!("unknown agency {:?}", s)))
    }
}

/// Splits a reconcilement blob into the agency's named sub-fields.
pub fn decode(agency: Agency, blob: &str) -> BTreeMap<&'static str, String> {
    agency
        .layout()
        .iter()
        .map(|f| {
            let value = blob
                .get(f.start - 1..f.end.min(blob.len()))
                .unwrap_or("")
                .to_string();
            (f.name, value)
        })
        .collect()
}

/// Fails on the first required sub-field that is blank.
pub fn validate_reconcilement(agency: Agency, blob: &str) -> Result<()> {
    let fields = decode(agency, blob);
    for &name in agency.required() {
        let value = fields.get(name).map(String::as_str).unwrap_or("");
        if value.trim().is_empty() {
            return Err(ValidationError::new(
                format!("{}.{}", agency.code(), name),
                value,
                "reconcilement_required",
                format!("{} reconcilement requires {}", agency.code(), name),
            )
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_are_contiguous() {
        for agency in Agency::ALL {
            let layout = agency.layout();
            assert_eq!(layout[0].start, 1, "{agency}");
            for pair in layout.windows(2) {
                assert_eq!(pair[1].start, pair[0].end + 1, "{agency} {}", pair[1].name);
            }
            for name in agency.required() {
                assert!(layout.iter().any(|f| f.name == *name), "{agency} {name}");
            }
        }
    }

    #[test]
    fn test_decode_irs() {
        let blob = format!("{:<100}", "30202312ABCDEFGHIJKLMNSMIT123456789");
        let fields = decode(Agency::Irs, &blob);
        assert_eq!(fields["MFTCode"], "30");
        assert_eq!(fields["TaxPeriod"], "202312");
        assert_eq!(fields["DocumentLocatorNumber"], "ABCDEFGHIJKLMN");
        assert_eq!(fields["NameControl"], "SMIT");
        assert_eq!(fields["TaxpayerIdentificationNumber"], "123456789");
    }

    #[test]
    fn test_short_blob_decodes_leniently() {
        let fields = decode(Agency::Va, "3170");
        assert_eq!(fields["StationCode"], "317");
        assert_eq!(fields["FinCode"], "0");
        assert_eq!(fields["CourtesyCode"], "");
        assert_eq!(fields["PayPeriodInfo"], "");
    }

    #[test]
    fn test_required_sub_fields() {
        assert!(validate_reconcilement(Agency::Rrb, "AB").is_ok());
        let err = validate_reconcilement(Agency::Ssa, "A  123").unwrap_err();
        match err {
            SprError::Validation(v) => {
                assert_eq!(v.rule, "reconcilement_required");
                assert_eq!(v.field, "SSA.PaymentIDCode");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(
            validate_reconcilement(Agency::Ccc, "").unwrap_err().rule(),
            Some("reconcilement_required")
        );
    }

    #[test]
    fn test_agency_codes_parse() {
        assert_eq!("ssa-a".parse::<Agency>().unwrap(), Agency::SsaA);
        assert_eq!("IRS".parse::<Agency>().unwrap(), Agency::Irs);
        assert!("DOD".parse::<Agency>().is_err());
    }
}
