//! LLRP protocol constants.

// Header
pub(crate) const PROTOCOL_VERSION: u16 = 1;
pub(crate) const HEADER_SIZE: usize = 10; // ver/type(2) + length(4) + message id(4)
pub(crate) const DEFAULT_PORT: u16 = 5084;

// Message types
pub(crate) const MSG_GET_READER_CAPABILITIES: u16 = 1;
pub(crate) const MSG_SET_READER_CONFIG: u16 = 3;
pub(crate) const MSG_CLOSE_CONNECTION_RESPONSE: u16 = 4;
pub(crate) const MSG_GET_READER_CAPABILITIES_RESPONSE: u16 = 11;
pub(crate) const MSG_SET_READER_CONFIG_RESPONSE: u16 = 13;
pub(crate) const MSG_CLOSE_CONNECTION: u16 = 14;
pub(crate) const MSG_ADD_ROSPEC: u16 = 20;
pub(crate) const MSG_START_ROSPEC: u16 = 22;
pub(crate) const MSG_STOP_ROSPEC: u16 = 23;
pub(crate) const MSG_ENABLE_ROSPEC: u16 = 24;
pub(crate) const MSG_ADD_ROSPEC_RESPONSE: u16 = 30;
pub(crate) const MSG_START_ROSPEC_RESPONSE: u16 = 32;
pub(crate) const MSG_STOP_ROSPEC_RESPONSE: u16 = 33;
pub(crate) const MSG_ENABLE_ROSPEC_RESPONSE: u16 = 34;
pub(crate) const MSG_ADD_ACCESSSPEC: u16 = 40;
pub(crate) const MSG_ENABLE_ACCESSSPEC: u16 = 42;
pub(crate) const MSG_ADD_ACCESSSPEC_RESPONSE: u16 = 50;
pub(crate) const MSG_ENABLE_ACCESSSPEC_RESPONSE: u16 = 52;
pub(crate) const MSG_GET_REPORT: u16 = 60;
pub(crate) const MSG_RO_ACCESS_REPORT: u16 = 61;
pub(crate) const MSG_KEEPALIVE: u16 = 62;
pub(crate) const MSG_READER_EVENT_NOTIFICATION: u16 = 63;
pub(crate) const MSG_KEEPALIVE_ACK: u16 = 72;
pub(crate) const MSG_ERROR_MESSAGE: u16 = 100;
pub(crate) const MSG_CUSTOM_MESSAGE: u16 = 1023;

// Vendor extension (Impinj private enterprise number)
pub const IMPINJ_VENDOR_ID: u32 = 25882;
pub(crate) const IMPINJ_ENABLE_EXTENSIONS: u8 = 21;
pub(crate) const IMPINJ_ENABLE_EXTENSIONS_RESPONSE: u8 = 22;

// TV parameter types (value length is fixed per type)
pub(crate) const TV_ANTENNA_ID: u8 = 1;
pub(crate) const TV_FIRST_SEEN_UTC: u8 = 2;
pub(crate) const TV_FIRST_SEEN_UPTIME: u8 = 3;
pub(crate) const TV_LAST_SEEN_UTC: u8 = 4;
pub(crate) const TV_LAST_SEEN_UPTIME: u8 = 5;
pub(crate) const TV_PEAK_RSSI: u8 = 6;
pub(crate) const TV_CHANNEL_INDEX: u8 = 7;
pub(crate) const TV_TAG_SEEN_COUNT: u8 = 8;
pub(crate) const TV_ROSPEC_ID: u8 = 9;
pub(crate) const TV_INVENTORY_PARAMETER_SPEC_ID: u8 = 10;
pub(crate) const TV_C1G2_CRC: u8 = 11;
pub(crate) const TV_C1G2_PC: u8 = 12;
pub(crate) const TV_EPC_96: u8 = 13;
pub(crate) const TV_SPEC_INDEX: u8 = 14;
pub(crate) const TV_CLIENT_REQUEST_OP_SPEC_RESULT: u8 = 15;
pub(crate) const TV_ACCESS_SPEC_ID: u8 = 16;
pub(crate) const TV_OP_SPEC_ID: u8 = 17;
pub(crate) const TV_C1G2_SINGULATION_DETAILS: u8 = 18;
pub(crate) const TV_C1G2_XPCW1: u8 = 19;
pub(crate) const TV_C1G2_XPCW2: u8 = 20;

/// Value length of a TV parameter, `None` for types this client does not know.
pub(crate) fn tv_value_len(tv_type: u8) -> Option<usize> {
    let len = match tv_type {
        TV_ANTENNA_ID | TV_CHANNEL_INDEX | TV_TAG_SEEN_COUNT | TV_INVENTORY_PARAMETER_SPEC_ID => 2,
        TV_C1G2_CRC | TV_C1G2_PC | TV_SPEC_INDEX | TV_CLIENT_REQUEST_OP_SPEC_RESULT => 2,
        TV_OP_SPEC_ID | TV_C1G2_XPCW1 | TV_C1G2_XPCW2 => 2,
        TV_FIRST_SEEN_UTC | TV_FIRST_SEEN_UPTIME | TV_LAST_SEEN_UTC | TV_LAST_SEEN_UPTIME => 8,
        TV_PEAK_RSSI => 1,
        TV_ROSPEC_ID | TV_ACCESS_SPEC_ID | TV_C1G2_SINGULATION_DETAILS => 4,
        TV_EPC_96 => 12,
        _ => return None,
    };
    Some(len)
}

// TLV parameter types
pub(crate) const P_UTC_TIMESTAMP: u16 = 128;
pub(crate) const P_UPTIME: u16 = 129;
pub(crate) const P_GENERAL_DEVICE_CAPABILITIES: u16 = 137;
pub(crate) const P_ROSPEC: u16 = 177;
pub(crate) const P_RO_BOUNDARY_SPEC: u16 = 178;
pub(crate) const P_ROSPEC_START_TRIGGER: u16 = 179;
pub(crate) const P_ROSPEC_STOP_TRIGGER: u16 = 182;
pub(crate) const P_AI_SPEC: u16 = 183;
pub(crate) const P_AI_SPEC_STOP_TRIGGER: u16 = 184;
pub(crate) const P_TAG_OBSERVATION_TRIGGER: u16 = 185;
pub(crate) const P_INVENTORY_PARAMETER_SPEC: u16 = 186;
pub(crate) const P_ACCESS_SPEC: u16 = 207;
pub(crate) const P_ACCESS_SPEC_STOP_TRIGGER: u16 = 208;
pub(crate) const P_ACCESS_COMMAND: u16 = 209;
pub(crate) const P_ANTENNA_CONFIGURATION: u16 = 222;
pub(crate) const P_RF_TRANSMITTER: u16 = 224;
pub(crate) const P_RO_REPORT_SPEC: u16 = 237;
pub(crate) const P_TAG_REPORT_CONTENT_SELECTOR: u16 = 238;
pub(crate) const P_ACCESS_REPORT_SPEC: u16 = 239;
pub(crate) const P_TAG_REPORT_DATA: u16 = 240;
pub(crate) const P_EPC_DATA: u16 = 241;
pub(crate) const P_READER_EVENT_NOTIFICATION_DATA: u16 = 246;
pub(crate) const P_READER_EXCEPTION_EVENT: u16 = 252;
pub(crate) const P_ANTENNA_EVENT: u16 = 255;
pub(crate) const P_CONNECTION_ATTEMPT_EVENT: u16 = 256;
pub(crate) const P_CONNECTION_CLOSE_EVENT: u16 = 257;
pub(crate) const P_LLRP_STATUS: u16 = 287;
pub(crate) const P_C1G2_INVENTORY_COMMAND: u16 = 330;
pub(crate) const P_C1G2_FILTER: u16 = 331;
pub(crate) const P_C1G2_TAG_INVENTORY_MASK: u16 = 332;
pub(crate) const P_C1G2_STATE_AWARE_FILTER_ACTION: u16 = 333;
pub(crate) const P_C1G2_STATE_UNAWARE_FILTER_ACTION: u16 = 334;
pub(crate) const P_C1G2_RF_CONTROL: u16 = 335;
pub(crate) const P_C1G2_SINGULATION_CONTROL: u16 = 336;
pub(crate) const P_C1G2_STATE_AWARE_SINGULATION_ACTION: u16 = 337;
pub(crate) const P_C1G2_TAG_SPEC: u16 = 338;
pub(crate) const P_C1G2_TARGET_TAG: u16 = 339;
pub(crate) const P_C1G2_READ: u16 = 341;
pub(crate) const P_C1G2_WRITE: u16 = 342;
pub(crate) const P_C1G2_EPC_MEMORY_SELECTOR: u16 = 348;
pub(crate) const P_C1G2_READ_OP_SPEC_RESULT: u16 = 349;
pub(crate) const P_C1G2_WRITE_OP_SPEC_RESULT: u16 = 350;
pub(crate) const P_CUSTOM: u16 = 1023;

// Impinj custom parameter subtypes
pub(crate) const IMPINJ_INVENTORY_SEARCH_MODE: u32 = 23;
pub(crate) const IMPINJ_LOW_DUTY_CYCLE: u32 = 28;
pub(crate) const IMPINJ_SET_QT_CONFIG: u32 = 46;
pub(crate) const IMPINJ_SET_QT_CONFIG_OP_SPEC_RESULT: u32 = 47;
pub(crate) const IMPINJ_GET_QT_CONFIG: u32 = 48;
pub(crate) const IMPINJ_GET_QT_CONFIG_OP_SPEC_RESULT: u32 = 49;
pub(crate) const IMPINJ_TAG_REPORT_CONTENT_SELECTOR: u32 = 50;
pub(crate) const IMPINJ_ENABLE_SERIALIZED_TID: u32 = 51;
pub(crate) const IMPINJ_ENABLE_RF_PHASE_ANGLE: u32 = 52;
pub(crate) const IMPINJ_ENABLE_PEAK_RSSI: u32 = 53;
pub(crate) const IMPINJ_SERIALIZED_TID: u32 = 55;

// Status codes
pub const STATUS_SUCCESS: u16 = 0;
pub(crate) const CONNECTION_ATTEMPT_SUCCESS: u16 = 0;

// Air protocol
pub(crate) const AIR_PROTOCOL_C1G2: u8 = 1;
