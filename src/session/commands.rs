//! Command-tree builders for the inventory and access specifications.

use rand::Rng;

use crate::config::OperationConfig;
use crate::llrp::{
    AI_STOP_TAG_OBSERVATION, AIR_PROTOCOL_C1G2, AccessCommand, AccessSpec, AiSpec, AntennaConfiguration, BitMask,
    C1G2EpcMemorySelector, C1G2Filter, C1G2InventoryCommand, C1G2Read, C1G2RfControl, C1G2SingulationControl,
    C1G2TagInventoryMask, C1G2TargetTag, C1G2Write, FilterAction, GetQtConfig, InventoryCustom,
    InventoryParameterSpec, InventorySearchMode, OpSpec, QtAccessRange, QtDataProfile, QtPersistence, RfTransmitter,
    RoReportSpec, RoReportTrigger, RoSpec, SELECT_ASSERT_SL_OR_A, SelectTarget, SetQtConfig, SetReaderConfig,
    StateAwareSingulation, TagObservationTrigger, TagReportContentSelector, VendorReportContent, memory_bank,
};

pub const ROSPEC_ID: u32 = 1111;
pub const ACCESS_SPEC_ID: u32 = 23;
pub const INVENTORY_PARAMETER_SPEC_ID: u16 = 1234;

/// All antennas.
const ALL_ANTENNAS: u16 = 0;

/// Antenna driven by the state-aware select inventory.
const SELECT_ANTENNA: u16 = 1;
/// Transmit power table index used by the state-aware select inventory.
const SELECT_TRANSMIT_POWER: u16 = 81;

/// What the access specification does to each singulated tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    ReadTid,
    SetPassword,
    ReadPrivateMemory,
    GetQt,
    SetQtPrivate,
    SetQtPublic,
    PeekPrivate,
    WriteUserRandom,
    WriteEpcRandom,
    ReadReserved,
    Personnel,
    StateAwareSelect,
}

impl Scenario {
    /// Unknown numbers fall back to reading the QT status.
    pub fn from_number(n: u8) -> Self {
        match n {
            0 => Self::ReadTid,
            1 => Self::SetPassword,
            2 => Self::ReadPrivateMemory,
            4 => Self::SetQtPrivate,
            5 => Self::SetQtPublic,
            6 => Self::PeekPrivate,
            7 => Self::WriteUserRandom,
            8 => Self::WriteEpcRandom,
            9 => Self::ReadReserved,
            10 => Self::Personnel,
            11 => Self::StateAwareSelect,
            _ => Self::GetQt,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Self::ReadTid => 0,
            Self::SetPassword => 1,
            Self::ReadPrivateMemory => 2,
            Self::GetQt => 3,
            Self::SetQtPrivate => 4,
            Self::SetQtPublic => 5,
            Self::PeekPrivate => 6,
            Self::WriteUserRandom => 7,
            Self::WriteEpcRandom => 8,
            Self::ReadReserved => 9,
            Self::Personnel => 10,
            Self::StateAwareSelect => 11,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::ReadTid => "read TID",
            Self::SetPassword => "set access password",
            Self::ReadPrivateMemory => "read private memory without QT",
            Self::GetQt => "get QT status",
            Self::SetQtPrivate => "set QT private",
            Self::SetQtPublic => "set QT public",
            Self::PeekPrivate => "peek private memory with temporary QT",
            Self::WriteUserRandom => "write random user memory",
            Self::WriteEpcRandom => "write random public EPC",
            Self::ReadReserved => "read reserved memory",
            Self::Personnel => "personnel tags",
            Self::StateAwareSelect => "state-aware select inventory",
        }
    }

    /// Whether the inventory specification carries tag filters.
    pub fn filters_inventory(self) -> bool {
        matches!(self, Self::Personnel | Self::StateAwareSelect)
    }
}

/// Reader configuration applied after the factory reset.
///
/// `polled` selects host-requested reports instead of one report per tag.
pub fn reader_config(op: &OperationConfig, polled: bool) -> SetReaderConfig {
    let inventory = C1G2InventoryCommand {
        state_aware: false,
        filters: Vec::new(),
        rf_control: Some(C1G2RfControl { mode_index: 2, tari: 0 }),
        singulation: Some(C1G2SingulationControl {
            session: 1,
            tag_population: 1,
            tag_transit_time: 0,
            state_aware_action: None,
        }),
        custom: vec![
            InventoryCustom::SearchMode(InventorySearchMode::SingleTarget),
            InventoryCustom::LowDutyCycle {
                enabled: true,
                empty_field_timeout_ms: 10_000,
                field_ping_interval_ms: 200,
            },
        ],
    };

    let (trigger, n) = if polled {
        (RoReportTrigger::None, 0)
    } else {
        (RoReportTrigger::UponNTagsOrEndOfRoSpec, 1)
    };

    SetReaderConfig {
        reset_to_factory_default: false,
        antenna_configurations: vec![AntennaConfiguration {
            antenna_id: ALL_ANTENNAS,
            transmitter: None,
            inventory_commands: vec![inventory],
        }],
        ro_report_spec: Some(RoReportSpec {
            trigger,
            n,
            content: TagReportContentSelector {
                enable_first_seen_timestamp: true,
                epc_memory: Some(C1G2EpcMemorySelector {
                    enable_crc: false,
                    enable_pc_bits: false,
                }),
                ..Default::default()
            },
            vendor_content: Some(VendorReportContent {
                serialized_tid: op.backscatter_tid,
                ..Default::default()
            }),
        }),
    }
}

/// Select tags whose EPC header byte matches `header`.
fn header_filter(header: u8, unaware_action: u8) -> C1G2Filter {
    C1G2Filter {
        truncate: 0,
        mask: C1G2TagInventoryMask {
            memory_bank: memory_bank::EPC,
            pointer: 32,
            mask: BitMask::new(8, &[header]),
        },
        action: Some(FilterAction::Unaware(unaware_action)),
    }
}

/// Select on `bits` of `bank` from word 0 that flips `target`.
fn select_filter(bank: u8, bits: u16, mask: &[u8], target: SelectTarget) -> C1G2Filter {
    C1G2Filter {
        truncate: 0,
        mask: C1G2TagInventoryMask {
            memory_bank: bank,
            pointer: 0,
            mask: BitMask::new(bits, mask),
        },
        action: Some(FilterAction::StateAware {
            target,
            action: SELECT_ASSERT_SL_OR_A,
        }),
    }
}

/// Inventory specification for `scenario`.
///
/// Most scenarios run until stopped on all antennas; the state-aware select
/// inventory has its own specification.
pub fn rospec(scenario: Scenario) -> RoSpec {
    if scenario == Scenario::StateAwareSelect {
        return state_aware_select_rospec();
    }

    let mut antenna = AntennaConfiguration {
        antenna_id: ALL_ANTENNAS,
        transmitter: None,
        inventory_commands: Vec::new(),
    };

    if scenario.filters_inventory() {
        // GID-96 then GRAI-96 headers
        antenna.inventory_commands.push(C1G2InventoryCommand {
            filters: vec![header_filter(0x33, 0), header_filter(0x35, 1)],
            ..Default::default()
        });
    }

    RoSpec {
        id: ROSPEC_ID,
        priority: 0,
        current_state: 0,
        start_trigger: 0,
        stop_trigger: 0,
        stop_duration_ms: 0,
        ai_spec: AiSpec {
            antenna_ids: vec![ALL_ANTENNAS],
            stop_trigger: 0,
            stop_duration_ms: 0,
            tag_observation: None,
            inventory: vec![InventoryParameterSpec {
                id: INVENTORY_PARAMETER_SPEC_ID,
                protocol: AIR_PROTOCOL_C1G2,
                antenna_configurations: vec![antenna],
            }],
        },
        report_spec: None,
    }
}

/// Five chained Selects over TID, EPC and user memory set S3, S2, S1, S0
/// and SL; session 1 then singulates tags in state B with SL asserted.
/// Each AISpec ends after 100 tags or 500 ms, and one report covers up to
/// 1000 tags with every standard content field.
fn state_aware_select_rospec() -> RoSpec {
    let inventory = C1G2InventoryCommand {
        state_aware: true,
        filters: vec![
            select_filter(memory_bank::TID, 15, &[0xE2, 0x00], SelectTarget::S3),
            select_filter(memory_bank::EPC, 16, &[0xE2, 0x00], SelectTarget::S2),
            select_filter(memory_bank::USER, 32, &[0xFF, 0xFF, 0xE2, 0x00], SelectTarget::S1),
            select_filter(memory_bank::TID, 8, &[0xAA], SelectTarget::S0),
            select_filter(memory_bank::EPC, 16, &[0xFF, 0xFF], SelectTarget::Sl),
        ],
        rf_control: None,
        singulation: Some(C1G2SingulationControl {
            session: 1,
            tag_population: 32,
            tag_transit_time: 0,
            state_aware_action: Some(StateAwareSingulation {
                state_b: true,
                not_sl: false,
            }),
        }),
        custom: Vec::new(),
    };

    RoSpec {
        id: ROSPEC_ID,
        priority: 0,
        current_state: 0,
        start_trigger: 0,
        stop_trigger: 0,
        stop_duration_ms: 0,
        ai_spec: AiSpec {
            antenna_ids: vec![SELECT_ANTENNA],
            stop_trigger: AI_STOP_TAG_OBSERVATION,
            stop_duration_ms: 0,
            tag_observation: Some(TagObservationTrigger {
                trigger_type: 0, // upon seeing N tags or timeout
                tag_count: 100,
                attempts: 0,
                t: 0,
                timeout_ms: 500,
            }),
            inventory: vec![InventoryParameterSpec {
                id: INVENTORY_PARAMETER_SPEC_ID,
                protocol: AIR_PROTOCOL_C1G2,
                antenna_configurations: vec![AntennaConfiguration {
                    antenna_id: SELECT_ANTENNA,
                    transmitter: Some(RfTransmitter {
                        hop_table_id: 1,
                        channel_index: 0,
                        transmit_power: SELECT_TRANSMIT_POWER,
                    }),
                    inventory_commands: vec![inventory],
                }],
            }],
        },
        report_spec: Some(RoReportSpec {
            trigger: RoReportTrigger::UponNTagsOrEndOfAiSpec,
            n: 1000,
            content: TagReportContentSelector {
                enable_rospec_id: true,
                enable_spec_index: true,
                enable_inventory_parameter_spec_id: true,
                enable_antenna_id: true,
                enable_channel_index: true,
                enable_peak_rssi: true,
                enable_first_seen_timestamp: true,
                enable_last_seen_timestamp: true,
                enable_tag_seen_count: true,
                enable_access_spec_id: true,
                epc_memory: None,
            },
            vendor_content: None,
        }),
    }
}

fn read(op_spec_id: u16, access_password: u32, memory_bank: u8, word_pointer: u16, word_count: u16) -> OpSpec {
    OpSpec::Read(C1G2Read {
        op_spec_id,
        access_password,
        memory_bank,
        word_pointer,
        word_count,
    })
}

fn write(op_spec_id: u16, access_password: u32, memory_bank: u8, word_pointer: u16, data: Vec<u16>) -> OpSpec {
    OpSpec::Write(C1G2Write {
        op_spec_id,
        access_password,
        memory_bank,
        word_pointer,
        data,
    })
}

fn set_qt(
    op_spec_id: u16,
    access_password: u32,
    data_profile: QtDataProfile,
    access_range: QtAccessRange,
    persistence: QtPersistence,
) -> OpSpec {
    OpSpec::SetQtConfig(SetQtConfig {
        op_spec_id,
        access_password,
        data_profile,
        access_range,
        persistence,
    })
}

fn random_words(rng: &mut impl Rng, count: usize) -> Vec<u16> {
    (0..count).map(|_| rng.r#gen()).collect()
}

/// Access specification for `scenario`, disabled until enabled explicitly.
pub fn access_spec(scenario: Scenario, op: &OperationConfig, rng: &mut impl Rng) -> AccessSpec {
    let pwd = op.password;
    let range = if op.short_range {
        QtAccessRange::Short
    } else {
        QtAccessRange::Normal
    };

    let op_specs = match scenario {
        Scenario::ReadTid | Scenario::StateAwareSelect => vec![read(1, 0, memory_bank::TID, 0, 2)],
        Scenario::SetPassword => vec![write(
            10,
            pwd,
            memory_bank::RESERVED,
            2,
            vec![(op.new_password >> 16) as u16, (op.new_password & 0xffff) as u16],
        )],
        Scenario::ReadPrivateMemory => vec![
            read(2, pwd, memory_bank::TID, 0, 6),
            read(2, pwd, memory_bank::TID, 6, 6),
            read(3, pwd, memory_bank::USER, 0, 32),
        ],
        Scenario::GetQt => vec![OpSpec::GetQtConfig(GetQtConfig {
            op_spec_id: 4,
            access_password: pwd,
        })],
        Scenario::SetQtPrivate => vec![set_qt(5, pwd, QtDataProfile::Private, range, QtPersistence::Permanent)],
        Scenario::SetQtPublic => vec![set_qt(6, pwd, QtDataProfile::Public, range, QtPersistence::Permanent)],
        Scenario::PeekPrivate => vec![
            set_qt(
                6,
                pwd,
                QtDataProfile::Private,
                QtAccessRange::Normal,
                QtPersistence::Temporary,
            ),
            read(7, pwd, memory_bank::EPC, 2, 8),
            read(8, pwd, memory_bank::TID, 0, 6),
            read(9, pwd, memory_bank::USER, 0, 32),
        ],
        Scenario::WriteUserRandom => vec![write(10, pwd, memory_bank::USER, 0, random_words(rng, 32))],
        Scenario::WriteEpcRandom => vec![write(11, pwd, memory_bank::TID, 6, random_words(rng, 6))],
        Scenario::ReadReserved => vec![read(12, pwd, memory_bank::RESERVED, 0, 4)],
        Scenario::Personnel => vec![read(1, pwd, memory_bank::USER, 0, 2)],
    };

    let target = if scenario == Scenario::Personnel {
        C1G2TargetTag {
            memory_bank: memory_bank::EPC,
            is_match: true,
            pointer: 16,
            mask: BitMask::new(24, &[0xf8, 0x00, 0xff]),
            data: BitMask::new(24, &[0x30, 0x00, 0x35]),
        }
    } else {
        C1G2TargetTag {
            memory_bank: memory_bank::EPC,
            is_match: true,
            pointer: 16,
            mask: BitMask::any(),
            data: BitMask::any(),
        }
    };

    AccessSpec {
        id: ACCESS_SPEC_ID,
        antenna_id: ALL_ANTENNAS,
        protocol: AIR_PROTOCOL_C1G2,
        enabled: false,
        rospec_id: 0,
        stop_trigger: 0,
        operation_count: 0,
        command: AccessCommand {
            targets: vec![target],
            op_specs,
        },
        report_trigger: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn op() -> OperationConfig {
        OperationConfig {
            password: 0x1234_5678,
            new_password: 0xDEAD_BEEF,
            ..Default::default()
        }
    }

    #[test]
    fn test_scenario_numbers_round_trip() {
        for n in 0..=11u8 {
            assert_eq!(Scenario::from_number(n).number(), n);
        }
        assert_eq!(Scenario::from_number(42), Scenario::GetQt);
    }

    #[test]
    fn test_reader_config_streaming_and_polled() {
        let streaming = reader_config(&op(), false);
        let spec = streaming.ro_report_spec.unwrap();
        assert_eq!(spec.trigger, RoReportTrigger::UponNTagsOrEndOfRoSpec);
        assert_eq!(spec.n, 1);
        assert!(spec.content.enable_first_seen_timestamp);
        assert!(!spec.content.enable_antenna_id);

        let polled = reader_config(&op(), true).ro_report_spec.unwrap();
        assert_eq!(polled.trigger, RoReportTrigger::None);
        assert_eq!(polled.n, 0);
    }

    #[test]
    fn test_reader_config_tid_backscatter() {
        let config = OperationConfig {
            backscatter_tid: true,
            ..op()
        };
        let vendor = reader_config(&config, false).ro_report_spec.unwrap().vendor_content.unwrap();
        assert!(vendor.serialized_tid);
        assert!(!vendor.peak_rssi);
    }

    #[test]
    fn test_rospec_filters_only_for_personnel() {
        let plain = rospec(Scenario::ReadTid);
        assert_eq!(plain.id, ROSPEC_ID);
        assert!(plain.ai_spec.inventory[0].antenna_configurations[0].inventory_commands.is_empty());

        let personnel = rospec(Scenario::Personnel);
        let commands = &personnel.ai_spec.inventory[0].antenna_configurations[0].inventory_commands;
        assert_eq!(commands.len(), 1);
        let filters = &commands[0].filters;
        assert_eq!(filters[0].mask.mask.bytes, vec![0x33]);
        assert_eq!(filters[1].mask.mask.bytes, vec![0x35]);
        assert_eq!(filters[1].action, Some(FilterAction::Unaware(1)));
    }

    #[test]
    fn test_state_aware_select_rospec() {
        let spec = rospec(Scenario::StateAwareSelect);
        let ai = &spec.ai_spec;
        assert_eq!(ai.antenna_ids, vec![1]);
        assert_eq!(ai.stop_trigger, AI_STOP_TAG_OBSERVATION);
        let observation = ai.tag_observation.as_ref().unwrap();
        assert_eq!((observation.tag_count, observation.timeout_ms), (100, 500));

        let antenna = &ai.inventory[0].antenna_configurations[0];
        assert_eq!(antenna.antenna_id, 1);
        assert_eq!(antenna.transmitter.as_ref().map(|tx| tx.transmit_power), Some(81));

        let command = &antenna.inventory_commands[0];
        assert!(command.state_aware);
        let selects: Vec<(u8, u16, SelectTarget)> = command
            .filters
            .iter()
            .map(|f| match f.action {
                Some(FilterAction::StateAware { target, action }) => {
                    assert_eq!(action, SELECT_ASSERT_SL_OR_A);
                    (f.mask.memory_bank, f.mask.mask.bits, target)
                }
                other => panic!("expected a state-aware select, got {other:?}"),
            })
            .collect();
        assert_eq!(
            selects,
            vec![
                (memory_bank::TID, 15, SelectTarget::S3),
                (memory_bank::EPC, 16, SelectTarget::S2),
                (memory_bank::USER, 32, SelectTarget::S1),
                (memory_bank::TID, 8, SelectTarget::S0),
                (memory_bank::EPC, 16, SelectTarget::Sl),
            ]
        );

        let singulation = command.singulation.as_ref().unwrap();
        assert_eq!((singulation.session, singulation.tag_population), (1, 32));
        assert_eq!(
            singulation.state_aware_action,
            Some(StateAwareSingulation {
                state_b: true,
                not_sl: false,
            })
        );

        let report = spec.report_spec.unwrap();
        assert_eq!(report.trigger, RoReportTrigger::UponNTagsOrEndOfAiSpec);
        assert_eq!(report.n, 1000);
        assert!(report.content.enable_peak_rssi && report.content.enable_tag_seen_count);
    }

    #[test]
    fn test_set_password_splits_new_password() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = access_spec(Scenario::SetPassword, &op(), &mut rng);
        match &spec.command.op_specs[..] {
            [OpSpec::Write(w)] => {
                assert_eq!(w.access_password, 0x1234_5678);
                assert_eq!(w.memory_bank, memory_bank::RESERVED);
                assert_eq!(w.word_pointer, 2);
                assert_eq!(w.data, vec![0xDEAD, 0xBEEF]);
            }
            other => panic!("unexpected op specs {other:?}"),
        }
    }

    #[test]
    fn test_set_qt_private_short_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = OperationConfig {
            short_range: true,
            ..op()
        };
        let spec = access_spec(Scenario::SetQtPrivate, &config, &mut rng);
        match &spec.command.op_specs[..] {
            [OpSpec::SetQtConfig(qt)] => {
                assert_eq!(qt.data_profile, QtDataProfile::Private);
                assert_eq!(qt.access_range, QtAccessRange::Short);
                assert_eq!(qt.persistence, QtPersistence::Permanent);
            }
            other => panic!("unexpected op specs {other:?}"),
        }
    }

    #[test]
    fn test_peek_private_sequence() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = access_spec(Scenario::PeekPrivate, &op(), &mut rng);
        assert_eq!(spec.command.op_specs.len(), 4);
        assert!(matches!(
            spec.command.op_specs[0],
            OpSpec::SetQtConfig(SetQtConfig {
                persistence: QtPersistence::Temporary,
                ..
            })
        ));
    }

    #[test]
    fn test_random_writes_have_expected_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let user = access_spec(Scenario::WriteUserRandom, &op(), &mut rng);
        let epc = access_spec(Scenario::WriteEpcRandom, &op(), &mut rng);
        assert!(matches!(&user.command.op_specs[0], OpSpec::Write(w) if w.data.len() == 32));
        assert!(matches!(&epc.command.op_specs[0], OpSpec::Write(w) if w.data.len() == 6 && w.word_pointer == 6));
    }

    #[test]
    fn test_personnel_target_mask() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = access_spec(Scenario::Personnel, &op(), &mut rng);
        let target = &spec.command.targets[0];
        assert_eq!(target.data.bytes, vec![0x30, 0x00, 0x35]);
        assert_eq!(target.mask.bytes, vec![0xf8, 0x00, 0xff]);
        assert_eq!(spec.id, ACCESS_SPEC_ID);
        assert!(!spec.enabled);
    }
}
