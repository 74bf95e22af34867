//! UBX wire format constants and receiver setup frames
//!
//! Every UBX frame on the wire has the layout
//!
//! ```text
//! | 0xB5 0x62 | class | id | len (u16 LE) | payload (len bytes) | CK_A | CK_B |
//! ```
//!
//! The reader strips the two preamble bytes, so all `FRAME_*` offsets below are
//! relative to the class byte.

/// Two synchronization characters that open every frame.
pub const PREAMBLE: [u8; 2] = [0xB5, 0x62];

/// Class, id and length bytes that follow the preamble.
pub const HEADER_LEN: usize = 4;

/// CK_A and CK_B.
pub const TRAILER_LEN: usize = 2;

/// Candidates shorter than this are dropped while the receiver flushes its startup noise.
pub const MIN_CLEANING_FRAME_LEN: usize = 24;

/// Accepted candidates needed before the reader trusts the preamble alignment.
pub const CLEANING_FRAMES: u8 = 5;

/// Navigation results class.
pub const CLASS_NAV: u8 = 0x01;

/// Receiver manager class (raw subframes).
pub const CLASS_RXM: u8 = 0x02;

/// Configuration class.
pub const CLASS_CFG: u8 = 0x06;

/// NAV-TIMEGAL: Galileo time solution.
pub const ID_NAV_TIMEGAL: u8 = 0x25;

/// NAV-CLOCK: receiver clock bias and drift.
pub const ID_NAV_CLOCK: u8 = 0x22;

/// RXM-SFRBX: broadcast navigation data subframe.
pub const ID_RXM_SFRBX: u8 = 0x13;

/// CFG-MSG: set message rate.
pub const ID_CFG_MSG: u8 = 0x01;

/// Constellation codes carried by RXM-SFRBX.
pub mod gnss_id {
    pub const GPS: u8 = 0;
    pub const SBAS: u8 = 1;
    pub const GALILEO: u8 = 2;
    pub const BEIDOU: u8 = 3;
    pub const IMES: u8 = 4;
    pub const QZSS: u8 = 5;
    pub const GLONASS: u8 = 6;
}

/// Byte offsets inside a NAV-TIMEGAL frame.
pub mod timegal {
    pub const GAL_TOW: usize = 8;
    pub const GAL_WNO: usize = 16;
    pub const LEAP_S: usize = 18;
    pub const CK_A: usize = 24;
    pub const CK_B: usize = 25;
    pub const MIN_LEN: usize = 26;
}

/// Byte offsets inside a NAV-CLOCK frame.
pub mod clock {
    pub const BIAS: usize = 8;
    pub const DRIFT: usize = 12;
    pub const MIN_LEN: usize = 16;
}

/// Byte offsets inside a RXM-SFRBX frame.
pub mod sfrbx {
    pub const GNSS_ID: usize = 4;
    pub const SV_ID: usize = 5;
    pub const NUM_WORDS: usize = 8;
    pub const WORDS: usize = 12;
    pub const WORDS_LEN: usize = 32;
    pub const AUTH: usize = 28;
    pub const AUTH_LEN: usize = 8;
    pub const MIN_LEN: usize = WORDS + WORDS_LEN + super::TRAILER_LEN;
}

/// Length of a CFG-MSG frame setting the rate on the current port.
pub const SETUP_FRAME_LEN: usize = ublox::CfgMsgSinglePortBuilder::PACKET_LEN;

/// Messages the decoder consumes, by class and id.
pub const CONSUMED_MESSAGES: [(u8, u8); 3] =
    [(CLASS_NAV, ID_NAV_TIMEGAL), (CLASS_NAV, ID_NAV_CLOCK), (CLASS_RXM, ID_RXM_SFRBX)];

/// CFG-MSG frames enabling every consumed message once per navigation epoch.
pub fn setup_frames() -> [[u8; SETUP_FRAME_LEN]; 3] {
    CONSUMED_MESSAGES.map(|(msg_class, msg_id)| {
        ublox::CfgMsgSinglePortBuilder { msg_class, msg_id, rate: 1 }.into_packet_bytes()
    })
}
