//! Records produced by the decoder

use serde::{Deserialize, Serialize};

/// Receiver clock state from a NAV-CLOCK message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSample {
    /// Clock bias, ns
    pub bias: i32,
    /// Clock drift, ns/s
    pub drift: i32,
}

impl ClockSample {
    pub fn new(bias: i32, drift: i32) -> Self {
        Self { bias, drift }
    }
}

/// Value of [`NavigationRecord::authenticity`] while a meaconing attack is flagged.
pub const AUTHENTICITY_ATTACK: i8 = 0;

/// Value of [`NavigationRecord::authenticity`] when no cryptographic check was made.
pub const AUTHENTICITY_UNRESOLVED: i8 = -1;

/// Storage column names, in record order.
pub const COLUMNS: [&str; 16] = [
    "receptiontime",
    "timestampmessage_unix",
    "raw_galtow",
    "raw_galwno",
    "raw_leaps",
    "raw_data",
    "galileo_data",
    "raw_authbit",
    "raw_svid",
    "raw_numwords",
    "raw_ck_b",
    "raw_ck_a",
    "raw_ck_a_time",
    "raw_ck_b_time",
    "authenticity",
    "timestampmessage_galileo",
];

/// Column used as the primary key by every store.
pub const PRIMARY_KEY: &str = "timestampmessage_unix";

/// One decoded Galileo subframe joined with the time context it was received under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRecord {
    #[serde(rename = "receptiontime")]
    pub reception_time: i64,
    #[serde(rename = "timestampmessage_unix")]
    pub unix_ts: i64,
    #[serde(rename = "raw_galtow")]
    pub gal_tow: u32,
    #[serde(rename = "raw_galwno")]
    pub gal_wno: i16,
    #[serde(rename = "raw_leaps")]
    pub leap_s: u8,
    #[serde(rename = "raw_data")]
    pub raw_hex: String,
    pub galileo_data: String,
    #[serde(rename = "raw_authbit")]
    pub auth_bits: u64,
    #[serde(rename = "raw_svid")]
    pub sv_id: u8,
    #[serde(rename = "raw_numwords")]
    pub num_words: u8,
    #[serde(rename = "raw_ck_b")]
    pub ck_b: u8,
    #[serde(rename = "raw_ck_a")]
    pub ck_a: u8,
    #[serde(rename = "raw_ck_a_time")]
    pub time_ck_a: u8,
    #[serde(rename = "raw_ck_b_time")]
    pub time_ck_b: u8,
    pub authenticity: i8,
    #[serde(rename = "timestampmessage_galileo")]
    pub galileo_ts: i64,
}

/// Table a record belongs to: `{year}_{nation}_{sv_id}`.
pub fn table_name(year: i32, nation: &str, sv_id: u8) -> String {
    format!("{}_{}_{}", year, nation, sv_id)
}

/// Convolutionally encoded subframe chunk kept for offline cross-checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedSample {
    pub satellite_id: u8,
    pub encoded_hex: String,
}
