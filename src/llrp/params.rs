//! LLRP parameter model.
//!
//! Outbound configuration trees are owned by the command that carries them.
//! Inbound records keep the origin order of their sub-parameters.

use serde::Serialize;

use super::types::STATUS_SUCCESS;

/// Mandatory status carried by every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlrpStatus {
    pub code: u16,
    /// Error description, `None` when the reader sent an empty one.
    pub description: Option<String>,
}

impl LlrpStatus {
    pub fn success() -> Self {
        Self {
            code: STATUS_SUCCESS,
            description: None,
        }
    }

    pub fn failure(code: u16, description: Option<&str>) -> Self {
        Self {
            code,
            description: description.map(str::to_string),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_SUCCESS
    }
}

/// Device identity block of a capabilities response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneralDeviceCapabilities {
    pub max_antennas: u16,
    pub can_set_antenna_properties: bool,
    pub has_utc_clock: bool,
    pub manufacturer: u32,
    pub model: u32,
    pub firmware_version: String,
}

/// Variable-length bit field (`u1v`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BitMask {
    pub bits: u16,
    pub bytes: Vec<u8>,
}

impl BitMask {
    pub fn new(bits: u16, bytes: &[u8]) -> Self {
        Self {
            bits,
            bytes: bytes.to_vec(),
        }
    }

    /// Zero-length mask, matches any tag.
    pub fn any() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Reader configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetReaderConfig {
    pub reset_to_factory_default: bool,
    pub antenna_configurations: Vec<AntennaConfiguration>,
    pub ro_report_spec: Option<RoReportSpec>,
}

impl SetReaderConfig {
    pub fn factory_reset() -> Self {
        Self {
            reset_to_factory_default: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AntennaConfiguration {
    /// 0 applies to all antennas.
    pub antenna_id: u16,
    pub transmitter: Option<RfTransmitter>,
    pub inventory_commands: Vec<C1G2InventoryCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RfTransmitter {
    pub hop_table_id: u16,
    pub channel_index: u16,
    pub transmit_power: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct C1G2InventoryCommand {
    pub state_aware: bool,
    pub filters: Vec<C1G2Filter>,
    pub rf_control: Option<C1G2RfControl>,
    pub singulation: Option<C1G2SingulationControl>,
    pub custom: Vec<InventoryCustom>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2Filter {
    pub truncate: u8,
    pub mask: C1G2TagInventoryMask,
    pub action: Option<FilterAction>,
}

/// What a Select does to matching and non-matching tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterAction {
    /// Plain select/unselect action code.
    Unaware(u8),
    /// Action code applied to one session flag or the SL flag.
    StateAware { target: SelectTarget, action: u8 },
}

/// Flag a state-aware Select modifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SelectTarget {
    S0 = 0,
    S1 = 1,
    S2 = 2,
    S3 = 3,
    Sl = 4,
}

/// Assert SL or set A on matching tags; deassert SL or set B otherwise.
pub const SELECT_ASSERT_SL_OR_A: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2TagInventoryMask {
    pub memory_bank: u8,
    pub pointer: u16,
    pub mask: BitMask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2RfControl {
    pub mode_index: u16,
    pub tari: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2SingulationControl {
    pub session: u8,
    pub tag_population: u16,
    pub tag_transit_time: u32,
    /// Which tags a state-aware inventory singulates.
    pub state_aware_action: Option<StateAwareSingulation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateAwareSingulation {
    /// Inventoried flag in state B rather than A.
    pub state_b: bool,
    /// Only tags with SL deasserted.
    pub not_sl: bool,
}

/// Vendor additions to an inventory command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InventoryCustom {
    SearchMode(InventorySearchMode),
    LowDutyCycle {
        enabled: bool,
        empty_field_timeout_ms: u16,
        field_ping_interval_ms: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u16)]
pub enum InventorySearchMode {
    ReaderSelected = 0,
    SingleTarget = 1,
    DualTarget = 2,
    SingleTargetWithSuppression = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RoReportTrigger {
    None = 0,
    UponNTagsOrEndOfAiSpec = 1,
    UponNTagsOrEndOfRoSpec = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoReportSpec {
    pub trigger: RoReportTrigger,
    pub n: u16,
    pub content: TagReportContentSelector,
    pub vendor_content: Option<VendorReportContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReportContentSelector {
    pub enable_rospec_id: bool,
    pub enable_spec_index: bool,
    pub enable_inventory_parameter_spec_id: bool,
    pub enable_antenna_id: bool,
    pub enable_channel_index: bool,
    pub enable_peak_rssi: bool,
    pub enable_first_seen_timestamp: bool,
    pub enable_last_seen_timestamp: bool,
    pub enable_tag_seen_count: bool,
    pub enable_access_spec_id: bool,
    pub epc_memory: Option<C1G2EpcMemorySelector>,
}

impl TagReportContentSelector {
    /// Enable flags packed MSB-first as they appear on the wire.
    pub(crate) fn flag_bits(&self) -> u16 {
        let flags = [
            self.enable_rospec_id,
            self.enable_spec_index,
            self.enable_inventory_parameter_spec_id,
            self.enable_antenna_id,
            self.enable_channel_index,
            self.enable_peak_rssi,
            self.enable_first_seen_timestamp,
            self.enable_last_seen_timestamp,
            self.enable_tag_seen_count,
            self.enable_access_spec_id,
        ];
        flags
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u16, |acc, (i, _)| acc | (0x8000 >> i))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2EpcMemorySelector {
    pub enable_crc: bool,
    pub enable_pc_bits: bool,
}

/// Vendor tag report content selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VendorReportContent {
    pub serialized_tid: bool,
    pub rf_phase_angle: bool,
    pub peak_rssi: bool,
}

// ---------------------------------------------------------------------------
// Inventory specification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoSpec {
    pub id: u32,
    pub priority: u8,
    /// 0 = disabled.
    pub current_state: u8,
    pub start_trigger: u8,
    pub stop_trigger: u8,
    pub stop_duration_ms: u32,
    pub ai_spec: AiSpec,
    pub report_spec: Option<RoReportSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AiSpec {
    pub antenna_ids: Vec<u16>,
    pub stop_trigger: u8,
    pub stop_duration_ms: u32,
    /// Required when `stop_trigger` is [`AI_STOP_TAG_OBSERVATION`].
    pub tag_observation: Option<TagObservationTrigger>,
    pub inventory: Vec<InventoryParameterSpec>,
}

/// AISpec stop trigger type that ends on tag observations.
pub const AI_STOP_TAG_OBSERVATION: u8 = 2;

/// End an AISpec after seeing `tag_count` tags or after `timeout_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagObservationTrigger {
    pub trigger_type: u8,
    pub tag_count: u16,
    pub attempts: u16,
    pub t: u16,
    pub timeout_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryParameterSpec {
    pub id: u16,
    pub protocol: u8,
    pub antenna_configurations: Vec<AntennaConfiguration>,
}

// ---------------------------------------------------------------------------
// Access specification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessSpec {
    pub id: u32,
    pub antenna_id: u16,
    pub protocol: u8,
    pub enabled: bool,
    /// 0 = valid for all inventory specifications.
    pub rospec_id: u32,
    pub stop_trigger: u8,
    pub operation_count: u16,
    pub command: AccessCommand,
    pub report_trigger: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessCommand {
    pub targets: Vec<C1G2TargetTag>,
    pub op_specs: Vec<OpSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2TargetTag {
    pub memory_bank: u8,
    pub is_match: bool,
    pub pointer: u16,
    pub mask: BitMask,
    pub data: BitMask,
}

/// Tag memory operation executed by an access specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OpSpec {
    Read(C1G2Read),
    Write(C1G2Write),
    SetQtConfig(SetQtConfig),
    GetQtConfig(GetQtConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2Read {
    pub op_spec_id: u16,
    pub access_password: u32,
    pub memory_bank: u8,
    pub word_pointer: u16,
    pub word_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct C1G2Write {
    pub op_spec_id: u16,
    pub access_password: u32,
    pub memory_bank: u8,
    pub word_pointer: u16,
    pub data: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetQtConfig {
    pub op_spec_id: u16,
    pub access_password: u32,
    pub data_profile: QtDataProfile,
    pub access_range: QtAccessRange,
    pub persistence: QtPersistence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetQtConfig {
    pub op_spec_id: u16,
    pub access_password: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum QtDataProfile {
    Unknown = 0,
    Private = 1,
    Public = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum QtAccessRange {
    Unknown = 0,
    Normal = 1,
    Short = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum QtPersistence {
    Unknown = 0,
    Temporary = 1,
    Permanent = 2,
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// EPC identifier of a tag report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Epc {
    /// Fixed 96-bit encoding.
    Epc96([u8; 12]),
    /// Variable bit-length encoding.
    Data { bits: u16, bytes: Vec<u8> },
    /// The EPC slot held a parameter of another type.
    Unrecognized { type_code: u16 },
}

/// Per-operation outcome embedded in a tag report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OpSpecResult {
    Read { result: u8, op_spec_id: u16, data: Vec<u16> },
    Write { result: u8, op_spec_id: u16, words_written: u16 },
    SetQtConfig { result: u8, op_spec_id: u16 },
    GetQtConfig { result: u8, op_spec_id: u16, data_profile: u8, access_range: u8 },
    /// Kill, lock, block erase and other results this client does not render.
    Other { type_code: u16 },
}

/// Vendor record attached to a tag report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TagCustom {
    SerializedTid(Vec<u16>),
    Other { vendor: u32, subtype: u32 },
}

/// One observed tag in one reporting cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReportData {
    pub epc: Option<Epc>,
    pub antenna_id: Option<u16>,
    pub peak_rssi: Option<i8>,
    /// Microseconds since the Unix epoch.
    pub first_seen_utc: Option<u64>,
    pub last_seen_utc: Option<u64>,
    pub seen_count: Option<u16>,
    pub rospec_id: Option<u32>,
    pub access_spec_id: Option<u32>,
    pub op_spec_results: Vec<OpSpecResult>,
    pub custom: Vec<TagCustom>,
}

// ---------------------------------------------------------------------------
// Reader events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReaderEventNotificationData {
    /// UTC microseconds or uptime microseconds, whichever the reader sent.
    pub timestamp_us: Option<u64>,
    pub events: Vec<ReaderEvent>,
}

impl ReaderEventNotificationData {
    pub fn connection_attempt(&self) -> Option<u16> {
        self.events.iter().find_map(|e| match e {
            ReaderEvent::ConnectionAttempt { status } => Some(*status),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReaderEvent {
    ConnectionAttempt { status: u16 },
    ConnectionClose,
    Antenna { event_type: u8, antenna_id: u16 },
    ReaderException { message: Option<String> },
    /// Hopping, GPI, ROSpec, buffer, survey, AISpec or custom events.
    Other { type_code: u16 },
}
