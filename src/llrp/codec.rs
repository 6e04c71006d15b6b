//! Binary encoding and decoding of LLRP frames.
//!
//! All integers are big-endian. A frame is a 10-byte header followed by
//! fixed fields and nested parameters, either TLV (`u16` type, `u16` length
//! including the 4-byte header) or TV (`0x80 | type`, fixed-length value).

use super::error::{ConnError, ErrorKind, Result};
use super::message::{Message, MessageBody, MessageType};
use super::params::*;
use super::types::*;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Growable frame writer. Nested TLV lengths are patched after the body is written.
pub(crate) struct Encoder {
    buf: Vec<u8>,
    failure: Option<String>,
}

impl Encoder {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
            failure: None,
        }
    }

    fn fail(&mut self, what: impl Into<String>) {
        if self.failure.is_none() {
            self.failure = Some(what.into());
        }
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn utf8v(&mut self, s: &str) {
        match u16::try_from(s.len()) {
            Ok(n) => {
                self.u16(n);
                self.bytes(s.as_bytes());
            }
            Err(_) => self.fail("string field too long"),
        }
    }

    fn u1v(&mut self, mask: &BitMask) {
        let need = (mask.bits as usize).div_ceil(8);
        if mask.bytes.len() < need {
            self.fail(format!("bit field declares {} bits but holds {} bytes", mask.bits, mask.bytes.len()));
            return;
        }
        self.u16(mask.bits);
        self.bytes(&mask.bytes[..need]);
    }

    fn u16v(&mut self, words: &[u16]) {
        match u16::try_from(words.len()) {
            Ok(n) => {
                self.u16(n);
                for w in words {
                    self.u16(*w);
                }
            }
            Err(_) => self.fail("word array too long"),
        }
    }

    /// Write a TLV parameter whose body is produced by `body`.
    pub(crate) fn tlv(&mut self, param_type: u16, body: impl FnOnce(&mut Self)) {
        let start = self.buf.len();
        self.u16(param_type & 0x03FF);
        self.u16(0);
        body(self);
        match u16::try_from(self.buf.len() - start) {
            Ok(len) => self.buf[start + 2..start + 4].copy_from_slice(&len.to_be_bytes()),
            Err(_) => self.fail(format!("parameter {param_type} exceeds 65535 bytes")),
        }
    }

    fn tv(&mut self, tv_type: u8) {
        self.u8(0x80 | tv_type);
    }

    /// Write a vendor parameter under the Impinj enterprise number.
    fn custom(&mut self, subtype: u32, body: impl FnOnce(&mut Self)) {
        self.tlv(P_CUSTOM, |e| {
            e.u32(IMPINJ_VENDOR_ID);
            e.u32(subtype);
            body(e);
        });
    }

    fn finish(self) -> Result<Vec<u8>> {
        match self.failure {
            Some(what) => Err(ConnError::new(ErrorKind::Encode, what)),
            None => Ok(self.buf),
        }
    }
}

/// Encode a message into a complete frame.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    let mut e = Encoder::new();
    let (code, subtype) = msg.message_type().wire_code();

    e.u16((PROTOCOL_VERSION << 10) | (code & 0x03FF));
    e.u32(0); // length, patched below
    e.u32(msg.id);
    if let Some(subtype) = subtype {
        e.u32(IMPINJ_VENDOR_ID);
        e.u8(subtype);
    }

    encode_body(&mut e, &msg.body);

    let mut frame = e.finish()?;
    let len = u32::try_from(frame.len()).map_err(|_| ConnError::new(ErrorKind::Encode, "frame too large"))?;
    frame[2..6].copy_from_slice(&len.to_be_bytes());
    Ok(frame)
}

fn encode_body(e: &mut Encoder, body: &MessageBody) {
    match body {
        MessageBody::GetReaderCapabilities { requested_data } => e.u8(*requested_data),
        MessageBody::SetReaderConfig(cfg) => encode_set_reader_config(e, cfg),
        MessageBody::AddRoSpec(spec) => encode_rospec(e, spec),
        MessageBody::EnableRoSpec { rospec_id }
        | MessageBody::StartRoSpec { rospec_id }
        | MessageBody::StopRoSpec { rospec_id } => e.u32(*rospec_id),
        MessageBody::AddAccessSpec(spec) => encode_access_spec(e, spec),
        MessageBody::EnableAccessSpec { access_spec_id } => e.u32(*access_spec_id),
        MessageBody::ImpinjEnableExtensions => e.u32(0), // reserved
        MessageBody::GetReport | MessageBody::KeepaliveAck | MessageBody::CloseConnection | MessageBody::Keepalive => {
        }
        MessageBody::Response { status, .. } | MessageBody::ErrorMessage { status } => {
            if let Some(status) = status {
                encode_status(e, status);
            }
        }
        MessageBody::Capabilities { status, general } => {
            if let Some(status) = status {
                encode_status(e, status);
            }
            if let Some(general) = general {
                encode_general_capabilities(e, general);
            }
        }
        MessageBody::RoAccessReport(tags) => {
            for tag in tags {
                encode_tag_report(e, tag);
            }
        }
        MessageBody::ReaderEventNotification(data) => {
            if let Some(data) = data {
                encode_event_data(e, data);
            }
        }
        MessageBody::Unknown { .. } => {}
    }
}

fn encode_status(e: &mut Encoder, status: &LlrpStatus) {
    e.tlv(P_LLRP_STATUS, |e| {
        e.u16(status.code);
        e.utf8v(status.description.as_deref().unwrap_or(""));
    });
}

fn encode_general_capabilities(e: &mut Encoder, caps: &GeneralDeviceCapabilities) {
    e.tlv(P_GENERAL_DEVICE_CAPABILITIES, |e| {
        e.u16(caps.max_antennas);
        let mut flags = 0u16;
        if caps.can_set_antenna_properties {
            flags |= 0x8000;
        }
        if caps.has_utc_clock {
            flags |= 0x4000;
        }
        e.u16(flags);
        e.u32(caps.manufacturer);
        e.u32(caps.model);
        e.utf8v(&caps.firmware_version);
    });
}

fn encode_set_reader_config(e: &mut Encoder, cfg: &SetReaderConfig) {
    e.u8(if cfg.reset_to_factory_default { 0x80 } else { 0 });
    for antenna in &cfg.antenna_configurations {
        encode_antenna_configuration(e, antenna);
    }
    if let Some(spec) = &cfg.ro_report_spec {
        encode_ro_report_spec(e, spec);
    }
}

fn encode_antenna_configuration(e: &mut Encoder, antenna: &AntennaConfiguration) {
    e.tlv(P_ANTENNA_CONFIGURATION, |e| {
        e.u16(antenna.antenna_id);
        if let Some(tx) = &antenna.transmitter {
            e.tlv(P_RF_TRANSMITTER, |e| {
                e.u16(tx.hop_table_id);
                e.u16(tx.channel_index);
                e.u16(tx.transmit_power);
            });
        }
        for cmd in &antenna.inventory_commands {
            encode_inventory_command(e, cmd);
        }
    });
}

fn encode_inventory_command(e: &mut Encoder, cmd: &C1G2InventoryCommand) {
    e.tlv(P_C1G2_INVENTORY_COMMAND, |e| {
        e.u8(if cmd.state_aware { 0x80 } else { 0 });
        for filter in &cmd.filters {
            e.tlv(P_C1G2_FILTER, |e| {
                e.u8((filter.truncate & 0x03) << 6);
                e.tlv(P_C1G2_TAG_INVENTORY_MASK, |e| {
                    e.u8((filter.mask.memory_bank & 0x03) << 6);
                    e.u16(filter.mask.pointer);
                    e.u1v(&filter.mask.mask);
                });
                match filter.action {
                    Some(FilterAction::Unaware(action)) => {
                        e.tlv(P_C1G2_STATE_UNAWARE_FILTER_ACTION, |e| e.u8(action));
                    }
                    Some(FilterAction::StateAware { target, action }) => {
                        e.tlv(P_C1G2_STATE_AWARE_FILTER_ACTION, |e| {
                            e.u8(target as u8);
                            e.u8(action);
                        });
                    }
                    None => {}
                }
            });
        }
        if let Some(rf) = &cmd.rf_control {
            e.tlv(P_C1G2_RF_CONTROL, |e| {
                e.u16(rf.mode_index);
                e.u16(rf.tari);
            });
        }
        if let Some(sc) = &cmd.singulation {
            e.tlv(P_C1G2_SINGULATION_CONTROL, |e| {
                e.u8((sc.session & 0x03) << 6);
                e.u16(sc.tag_population);
                e.u32(sc.tag_transit_time);
                if let Some(sa) = &sc.state_aware_action {
                    e.tlv(P_C1G2_STATE_AWARE_SINGULATION_ACTION, |e| {
                        let mut flags = 0u8;
                        if sa.state_b {
                            flags |= 0x80;
                        }
                        if sa.not_sl {
                            flags |= 0x40;
                        }
                        e.u8(flags);
                    });
                }
            });
        }
        for custom in &cmd.custom {
            match custom {
                InventoryCustom::SearchMode(mode) => {
                    e.custom(IMPINJ_INVENTORY_SEARCH_MODE, |e| e.u16(*mode as u16));
                }
                InventoryCustom::LowDutyCycle {
                    enabled,
                    empty_field_timeout_ms,
                    field_ping_interval_ms,
                } => e.custom(IMPINJ_LOW_DUTY_CYCLE, |e| {
                    e.u16(u16::from(*enabled));
                    e.u16(*empty_field_timeout_ms);
                    e.u16(*field_ping_interval_ms);
                }),
            }
        }
    });
}

fn encode_ro_report_spec(e: &mut Encoder, spec: &RoReportSpec) {
    e.tlv(P_RO_REPORT_SPEC, |e| {
        e.u8(spec.trigger as u8);
        e.u16(spec.n);
        e.tlv(P_TAG_REPORT_CONTENT_SELECTOR, |e| {
            e.u16(spec.content.flag_bits());
            if let Some(sel) = &spec.content.epc_memory {
                e.tlv(P_C1G2_EPC_MEMORY_SELECTOR, |e| {
                    let mut flags = 0u8;
                    if sel.enable_crc {
                        flags |= 0x80;
                    }
                    if sel.enable_pc_bits {
                        flags |= 0x40;
                    }
                    e.u8(flags);
                });
            }
        });
        if let Some(vendor) = &spec.vendor_content {
            e.custom(IMPINJ_TAG_REPORT_CONTENT_SELECTOR, |e| {
                e.custom(IMPINJ_ENABLE_SERIALIZED_TID, |e| e.u16(u16::from(vendor.serialized_tid)));
                e.custom(IMPINJ_ENABLE_RF_PHASE_ANGLE, |e| e.u16(u16::from(vendor.rf_phase_angle)));
                e.custom(IMPINJ_ENABLE_PEAK_RSSI, |e| e.u16(u16::from(vendor.peak_rssi)));
            });
        }
    });
}

fn encode_rospec(e: &mut Encoder, spec: &RoSpec) {
    e.tlv(P_ROSPEC, |e| {
        e.u32(spec.id);
        e.u8(spec.priority);
        e.u8(spec.current_state);
        e.tlv(P_RO_BOUNDARY_SPEC, |e| {
            e.tlv(P_ROSPEC_START_TRIGGER, |e| e.u8(spec.start_trigger));
            e.tlv(P_ROSPEC_STOP_TRIGGER, |e| {
                e.u8(spec.stop_trigger);
                e.u32(spec.stop_duration_ms);
            });
        });
        let ai = &spec.ai_spec;
        e.tlv(P_AI_SPEC, |e| {
            match u16::try_from(ai.antenna_ids.len()) {
                Ok(n) => e.u16(n),
                Err(_) => e.fail("too many antennas"),
            }
            for id in &ai.antenna_ids {
                e.u16(*id);
            }
            e.tlv(P_AI_SPEC_STOP_TRIGGER, |e| {
                e.u8(ai.stop_trigger);
                e.u32(ai.stop_duration_ms);
                if let Some(obs) = &ai.tag_observation {
                    e.tlv(P_TAG_OBSERVATION_TRIGGER, |e| {
                        e.u8(obs.trigger_type);
                        e.u8(0); // reserved
                        e.u16(obs.tag_count);
                        e.u16(obs.attempts);
                        e.u16(obs.t);
                        e.u32(obs.timeout_ms);
                    });
                }
            });
            for inv in &ai.inventory {
                e.tlv(P_INVENTORY_PARAMETER_SPEC, |e| {
                    e.u16(inv.id);
                    e.u8(inv.protocol);
                    for antenna in &inv.antenna_configurations {
                        encode_antenna_configuration(e, antenna);
                    }
                });
            }
        });
        if let Some(report) = &spec.report_spec {
            encode_ro_report_spec(e, report);
        }
    });
}

fn encode_access_spec(e: &mut Encoder, spec: &AccessSpec) {
    e.tlv(P_ACCESS_SPEC, |e| {
        e.u32(spec.id);
        e.u16(spec.antenna_id);
        e.u8(spec.protocol);
        e.u8(if spec.enabled { 0x80 } else { 0 });
        e.u32(spec.rospec_id);
        e.tlv(P_ACCESS_SPEC_STOP_TRIGGER, |e| {
            e.u8(spec.stop_trigger);
            e.u16(spec.operation_count);
        });
        e.tlv(P_ACCESS_COMMAND, |e| {
            e.tlv(P_C1G2_TAG_SPEC, |e| {
                for target in &spec.command.targets {
                    e.tlv(P_C1G2_TARGET_TAG, |e| {
                        let mut b = (target.memory_bank & 0x03) << 6;
                        if target.is_match {
                            b |= 0x20;
                        }
                        e.u8(b);
                        e.u16(target.pointer);
                        e.u1v(&target.mask);
                        e.u1v(&target.data);
                    });
                }
            });
            for op in &spec.command.op_specs {
                encode_op_spec(e, op);
            }
        });
        e.tlv(P_ACCESS_REPORT_SPEC, |e| e.u8(spec.report_trigger));
    });
}

fn encode_op_spec(e: &mut Encoder, op: &OpSpec) {
    match op {
        OpSpec::Read(r) => e.tlv(P_C1G2_READ, |e| {
            e.u16(r.op_spec_id);
            e.u32(r.access_password);
            e.u8((r.memory_bank & 0x03) << 6);
            e.u16(r.word_pointer);
            e.u16(r.word_count);
        }),
        OpSpec::Write(w) => e.tlv(P_C1G2_WRITE, |e| {
            e.u16(w.op_spec_id);
            e.u32(w.access_password);
            e.u8((w.memory_bank & 0x03) << 6);
            e.u16(w.word_pointer);
            e.u16v(&w.data);
        }),
        OpSpec::SetQtConfig(q) => e.custom(IMPINJ_SET_QT_CONFIG, |e| {
            e.u16(q.op_spec_id);
            e.u32(q.access_password);
            e.u8(q.data_profile as u8);
            e.u8(q.access_range as u8);
            e.u8(q.persistence as u8);
            e.u32(0);
        }),
        OpSpec::GetQtConfig(q) => e.custom(IMPINJ_GET_QT_CONFIG, |e| {
            e.u16(q.op_spec_id);
            e.u32(q.access_password);
        }),
    }
}

fn encode_tag_report(e: &mut Encoder, tag: &TagReportData) {
    e.tlv(P_TAG_REPORT_DATA, |e| {
        match &tag.epc {
            Some(Epc::Epc96(bytes)) => {
                e.tv(TV_EPC_96);
                e.bytes(bytes);
            }
            Some(Epc::Data { bits, bytes }) => {
                e.tlv(P_EPC_DATA, |e| e.u1v(&BitMask::new(*bits, bytes)));
            }
            Some(Epc::Unrecognized { type_code }) => {
                // An empty TLV of the given type takes the identifier slot.
                e.tlv(*type_code, |_| {});
            }
            None => {}
        }
        if let Some(id) = tag.rospec_id {
            e.tv(TV_ROSPEC_ID);
            e.u32(id);
        }
        if let Some(antenna) = tag.antenna_id {
            e.tv(TV_ANTENNA_ID);
            e.u16(antenna);
        }
        if let Some(rssi) = tag.peak_rssi {
            e.tv(TV_PEAK_RSSI);
            e.u8(rssi as u8);
        }
        if let Some(ts) = tag.first_seen_utc {
            e.tv(TV_FIRST_SEEN_UTC);
            e.u64(ts);
        }
        if let Some(ts) = tag.last_seen_utc {
            e.tv(TV_LAST_SEEN_UTC);
            e.u64(ts);
        }
        if let Some(count) = tag.seen_count {
            e.tv(TV_TAG_SEEN_COUNT);
            e.u16(count);
        }
        if let Some(id) = tag.access_spec_id {
            e.tv(TV_ACCESS_SPEC_ID);
            e.u32(id);
        }
        for result in &tag.op_spec_results {
            match result {
                OpSpecResult::Read { result, op_spec_id, data } => e.tlv(P_C1G2_READ_OP_SPEC_RESULT, |e| {
                    e.u8(*result);
                    e.u16(*op_spec_id);
                    e.u16v(data);
                }),
                OpSpecResult::Write {
                    result,
                    op_spec_id,
                    words_written,
                } => e.tlv(P_C1G2_WRITE_OP_SPEC_RESULT, |e| {
                    e.u8(*result);
                    e.u16(*op_spec_id);
                    e.u16(*words_written);
                }),
                OpSpecResult::SetQtConfig { result, op_spec_id } => {
                    e.custom(IMPINJ_SET_QT_CONFIG_OP_SPEC_RESULT, |e| {
                        e.u8(*result);
                        e.u16(*op_spec_id);
                    })
                }
                OpSpecResult::GetQtConfig {
                    result,
                    op_spec_id,
                    data_profile,
                    access_range,
                } => e.custom(IMPINJ_GET_QT_CONFIG_OP_SPEC_RESULT, |e| {
                    e.u8(*result);
                    e.u16(*op_spec_id);
                    e.u8(*data_profile);
                    e.u8(*access_range);
                    e.u32(0);
                }),
                OpSpecResult::Other { type_code } => e.tlv(*type_code, |_| {}),
            }
        }
        for custom in &tag.custom {
            match custom {
                TagCustom::SerializedTid(words) => e.custom(IMPINJ_SERIALIZED_TID, |e| e.u16v(words)),
                TagCustom::Other { vendor, subtype } => e.tlv(P_CUSTOM, |e| {
                    e.u32(*vendor);
                    e.u32(*subtype);
                }),
            }
        }
    });
}

fn encode_event_data(e: &mut Encoder, data: &ReaderEventNotificationData) {
    e.tlv(P_READER_EVENT_NOTIFICATION_DATA, |e| {
        e.tlv(P_UTC_TIMESTAMP, |e| e.u64(data.timestamp_us.unwrap_or(0)));
        for event in &data.events {
            match event {
                ReaderEvent::ConnectionAttempt { status } => e.tlv(P_CONNECTION_ATTEMPT_EVENT, |e| e.u16(*status)),
                ReaderEvent::ConnectionClose => e.tlv(P_CONNECTION_CLOSE_EVENT, |_| {}),
                ReaderEvent::Antenna { event_type, antenna_id } => e.tlv(P_ANTENNA_EVENT, |e| {
                    e.u8(*event_type);
                    e.u16(*antenna_id);
                }),
                ReaderEvent::ReaderException { message } => {
                    e.tlv(P_READER_EXCEPTION_EVENT, |e| e.utf8v(message.as_deref().unwrap_or("")))
                }
                ReaderEvent::Other { type_code } => e.tlv(*type_code, |_| {}),
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One raw parameter pulled off a cursor.
enum RawParam<'a> {
    Tv { tv_type: u8, value: &'a [u8] },
    Tlv { param_type: u16, body: &'a [u8] },
}

impl RawParam<'_> {
    fn code(&self) -> u16 {
        match self {
            Self::Tv { tv_type, .. } => u16::from(*tv_type),
            Self::Tlv { param_type, .. } => *param_type,
        }
    }
}

/// Bounds-checked big-endian reader over one parameter body.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], context: &'static str) -> Self {
        Self { buf, pos: 0, context }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ConnError::decode(
                format!("truncated: need {n} bytes, have {}", self.remaining()),
                self.context,
                Some(field),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64> {
        let b = self.take(8, field)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_be_bytes(raw))
    }

    fn utf8v(&mut self, field: &'static str) -> Result<String> {
        let n = self.u16(field)? as usize;
        let raw = self.take(n, field)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn u1v(&mut self, field: &'static str) -> Result<BitMask> {
        let bits = self.u16(field)?;
        let raw = self.take((bits as usize).div_ceil(8), field)?;
        Ok(BitMask::new(bits, raw))
    }

    fn u16v(&mut self, field: &'static str) -> Result<Vec<u16>> {
        let n = self.u16(field)? as usize;
        let raw = self.take(n * 2, field)?;
        Ok(raw.chunks_exact(2).map(|w| u16::from_be_bytes([w[0], w[1]])).collect())
    }

    fn next_param(&mut self) -> Result<Option<RawParam<'a>>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        let first = self.buf[self.pos];
        if first & 0x80 != 0 {
            let tv_type = first & 0x7F;
            let len = tv_value_len(tv_type).ok_or_else(|| {
                ConnError::decode(format!("unknown TV parameter type {tv_type}"), self.context, None)
            })?;
            self.pos += 1;
            let value = self.take(len, "tv value")?;
            return Ok(Some(RawParam::Tv { tv_type, value }));
        }
        let param_type = self.u16("parameter type")? & 0x03FF;
        let len = self.u16("parameter length")? as usize;
        if len < 4 {
            return Err(ConnError::decode(
                format!("parameter {param_type} has invalid length {len}"),
                self.context,
                Some("parameter length"),
            ));
        }
        let body = self.take(len - 4, "parameter body")?;
        Ok(Some(RawParam::Tlv { param_type, body }))
    }
}

fn tv_u16(value: &[u8]) -> u16 {
    u16::from_be_bytes([value[0], value[1]])
}

fn tv_u32(value: &[u8]) -> u32 {
    u32::from_be_bytes([value[0], value[1], value[2], value[3]])
}

fn tv_u64(value: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&value[..8]);
    u64::from_be_bytes(raw)
}

/// Type and id of a frame, without decoding the body.
pub fn peek_header(frame: &[u8]) -> Result<(MessageType, u32)> {
    let mut c = Cursor::new(frame, "message header");
    let type_word = c.u16("type")?;
    c.u32("length")?;
    let id = c.u32("message id")?;
    let code = type_word & 0x03FF;
    if code != MSG_CUSTOM_MESSAGE {
        return Ok((MessageType::from_code(code), id));
    }
    let vendor = c.u32("vendor")?;
    let subtype = c.u8("subtype")?;
    Ok((custom_message_type(vendor, subtype, code), id))
}

fn custom_message_type(vendor: u32, subtype: u8, code: u16) -> MessageType {
    match (vendor, subtype) {
        (IMPINJ_VENDOR_ID, IMPINJ_ENABLE_EXTENSIONS) => MessageType::ImpinjEnableExtensions,
        (IMPINJ_VENDOR_ID, IMPINJ_ENABLE_EXTENSIONS_RESPONSE) => MessageType::ImpinjEnableExtensionsResponse,
        _ => MessageType::Unknown(code),
    }
}

/// Decode one complete frame.
pub fn decode_message(frame: &[u8]) -> Result<Message> {
    let mut c = Cursor::new(frame, "message header");
    let type_word = c.u16("type")?;
    let version = (type_word >> 10) & 0x07;
    if version != PROTOCOL_VERSION {
        return Err(ConnError::decode(
            format!("unsupported protocol version {version}"),
            "message header",
            Some("version"),
        ));
    }
    let code = type_word & 0x03FF;
    let length = c.u32("length")? as usize;
    if length != frame.len() {
        return Err(ConnError::decode(
            format!("header length {length} does not match frame size {}", frame.len()),
            "message header",
            Some("length"),
        ));
    }
    let id = c.u32("message id")?;

    let kind = if code == MSG_CUSTOM_MESSAGE {
        let vendor = c.u32("vendor")?;
        let subtype = c.u8("subtype")?;
        custom_message_type(vendor, subtype, code)
    } else {
        MessageType::from_code(code)
    };

    let mut body = Cursor::new(&frame[c.pos..], kind.name());
    let body = decode_body(kind, &mut body)?;
    Ok(Message::new(id, body))
}

fn decode_body(kind: MessageType, c: &mut Cursor<'_>) -> Result<MessageBody> {
    let body = match kind {
        MessageType::GetReaderCapabilitiesResponse => {
            let mut status = None;
            let mut general = None;
            while let Some(p) = c.next_param()? {
                if let RawParam::Tlv { param_type, body } = p {
                    match param_type {
                        P_LLRP_STATUS => status = Some(decode_status(body)?),
                        P_GENERAL_DEVICE_CAPABILITIES => general = Some(decode_general_capabilities(body)?),
                        _ => {}
                    }
                }
            }
            MessageBody::Capabilities { status, general }
        }
        MessageType::ErrorMessage => MessageBody::ErrorMessage {
            status: find_status(c)?,
        },
        MessageType::RoAccessReport => {
            let mut tags = Vec::new();
            while let Some(p) = c.next_param()? {
                if let RawParam::Tlv {
                    param_type: P_TAG_REPORT_DATA,
                    body,
                } = p
                {
                    tags.push(decode_tag_report(body)?);
                }
            }
            MessageBody::RoAccessReport(tags)
        }
        MessageType::ReaderEventNotification => {
            let mut data = None;
            while let Some(p) = c.next_param()? {
                if let RawParam::Tlv {
                    param_type: P_READER_EVENT_NOTIFICATION_DATA,
                    body,
                } = p
                {
                    data = Some(decode_event_data(body)?);
                }
            }
            MessageBody::ReaderEventNotification(data)
        }
        MessageType::Keepalive => MessageBody::Keepalive,
        MessageType::GetReport => MessageBody::GetReport,
        MessageType::KeepaliveAck => MessageBody::KeepaliveAck,
        MessageType::CloseConnection => MessageBody::CloseConnection,
        MessageType::ImpinjEnableExtensions => MessageBody::ImpinjEnableExtensions,
        MessageType::GetReaderCapabilities => MessageBody::GetReaderCapabilities {
            requested_data: c.u8("requested data")?,
        },
        MessageType::EnableRoSpec => MessageBody::EnableRoSpec {
            rospec_id: c.u32("rospec id")?,
        },
        MessageType::StartRoSpec => MessageBody::StartRoSpec {
            rospec_id: c.u32("rospec id")?,
        },
        MessageType::StopRoSpec => MessageBody::StopRoSpec {
            rospec_id: c.u32("rospec id")?,
        },
        MessageType::EnableAccessSpec => MessageBody::EnableAccessSpec {
            access_spec_id: c.u32("access spec id")?,
        },
        MessageType::SetReaderConfig | MessageType::AddRoSpec | MessageType::AddAccessSpec => {
            // Configuration trees only travel client to reader.
            MessageBody::Unknown {
                type_code: kind.wire_code().0,
            }
        }
        MessageType::Unknown(type_code) => MessageBody::Unknown { type_code },
        response => MessageBody::Response {
            kind: response,
            status: find_status(c)?,
        },
    };
    Ok(body)
}

fn find_status(c: &mut Cursor<'_>) -> Result<Option<LlrpStatus>> {
    while let Some(p) = c.next_param()? {
        if let RawParam::Tlv {
            param_type: P_LLRP_STATUS,
            body,
        } = p
        {
            return Ok(Some(decode_status(body)?));
        }
    }
    Ok(None)
}

fn decode_status(body: &[u8]) -> Result<LlrpStatus> {
    let mut c = Cursor::new(body, "LLRPStatus");
    let code = c.u16("StatusCode")?;
    let description = c.utf8v("ErrorDescription")?;
    // Field and parameter error details are not surfaced.
    Ok(LlrpStatus {
        code,
        description: (!description.is_empty()).then_some(description),
    })
}

fn decode_general_capabilities(body: &[u8]) -> Result<GeneralDeviceCapabilities> {
    let mut c = Cursor::new(body, "GeneralDeviceCapabilities");
    let max_antennas = c.u16("MaxNumberOfAntennaSupported")?;
    let flags = c.u16("flags")?;
    Ok(GeneralDeviceCapabilities {
        max_antennas,
        can_set_antenna_properties: flags & 0x8000 != 0,
        has_utc_clock: flags & 0x4000 != 0,
        manufacturer: c.u32("DeviceManufacturerName")?,
        model: c.u32("ModelName")?,
        firmware_version: c.utf8v("ReaderFirmwareVersion")?,
    })
}

fn decode_tag_report(body: &[u8]) -> Result<TagReportData> {
    let mut c = Cursor::new(body, "TagReportData");
    let mut tag = TagReportData::default();
    let mut first = true;

    while let Some(p) = c.next_param()? {
        if first {
            first = false;
            match &p {
                RawParam::Tv {
                    tv_type: TV_EPC_96,
                    value,
                } => {
                    let mut epc = [0u8; 12];
                    epc.copy_from_slice(value);
                    tag.epc = Some(Epc::Epc96(epc));
                    continue;
                }
                RawParam::Tlv {
                    param_type: P_EPC_DATA,
                    body,
                } => {
                    let mask = Cursor::new(body, "EPCData").u1v("EPC")?;
                    tag.epc = Some(Epc::Data {
                        bits: mask.bits,
                        bytes: mask.bytes,
                    });
                    continue;
                }
                other => {
                    tag.epc = Some(Epc::Unrecognized { type_code: other.code() });
                }
            }
        }

        match p {
            RawParam::Tv { tv_type, value } => match tv_type {
                TV_ANTENNA_ID => tag.antenna_id = Some(tv_u16(value)),
                TV_PEAK_RSSI => tag.peak_rssi = Some(value[0] as i8),
                TV_FIRST_SEEN_UTC => tag.first_seen_utc = Some(tv_u64(value)),
                TV_LAST_SEEN_UTC => tag.last_seen_utc = Some(tv_u64(value)),
                TV_TAG_SEEN_COUNT => tag.seen_count = Some(tv_u16(value)),
                TV_ROSPEC_ID => tag.rospec_id = Some(tv_u32(value)),
                TV_ACCESS_SPEC_ID => tag.access_spec_id = Some(tv_u32(value)),
                _ => {}
            },
            RawParam::Tlv { param_type, body } => match param_type {
                P_C1G2_READ_OP_SPEC_RESULT => {
                    let mut r = Cursor::new(body, "C1G2ReadOpSpecResult");
                    tag.op_spec_results.push(OpSpecResult::Read {
                        result: r.u8("Result")?,
                        op_spec_id: r.u16("OpSpecID")?,
                        data: r.u16v("ReadData")?,
                    });
                }
                P_C1G2_WRITE_OP_SPEC_RESULT => {
                    let mut r = Cursor::new(body, "C1G2WriteOpSpecResult");
                    tag.op_spec_results.push(OpSpecResult::Write {
                        result: r.u8("Result")?,
                        op_spec_id: r.u16("OpSpecID")?,
                        words_written: r.u16("NumWordsWritten")?,
                    });
                }
                351..=357 => tag.op_spec_results.push(OpSpecResult::Other { type_code: param_type }),
                P_CUSTOM => decode_tag_custom(body, &mut tag)?,
                _ => {}
            },
        }
    }
    Ok(tag)
}

/// Vendor parameters inside a tag report: QT results join the op results, the rest stay custom.
fn decode_tag_custom(body: &[u8], tag: &mut TagReportData) -> Result<()> {
    let mut c = Cursor::new(body, "Custom");
    let vendor = c.u32("VendorIdentifier")?;
    let subtype = c.u32("ParameterSubtype")?;
    if vendor != IMPINJ_VENDOR_ID {
        tag.custom.push(TagCustom::Other { vendor, subtype });
        return Ok(());
    }
    match subtype {
        IMPINJ_SET_QT_CONFIG_OP_SPEC_RESULT => {
            tag.op_spec_results.push(OpSpecResult::SetQtConfig {
                result: c.u8("Result")?,
                op_spec_id: c.u16("OpSpecID")?,
            });
        }
        IMPINJ_GET_QT_CONFIG_OP_SPEC_RESULT => {
            tag.op_spec_results.push(OpSpecResult::GetQtConfig {
                result: c.u8("Result")?,
                op_spec_id: c.u16("OpSpecID")?,
                data_profile: c.u8("DataProfile")?,
                access_range: c.u8("AccessRange")?,
            });
        }
        IMPINJ_SERIALIZED_TID => tag.custom.push(TagCustom::SerializedTid(c.u16v("TID")?)),
        _ => tag.custom.push(TagCustom::Other { vendor, subtype }),
    }
    Ok(())
}

fn decode_event_data(body: &[u8]) -> Result<ReaderEventNotificationData> {
    let mut c = Cursor::new(body, "ReaderEventNotificationData");
    let mut data = ReaderEventNotificationData::default();

    while let Some(p) = c.next_param()? {
        let RawParam::Tlv { param_type, body } = p else {
            continue;
        };
        let mut b = Cursor::new(body, "ReaderEvent");
        match param_type {
            P_UTC_TIMESTAMP | P_UPTIME => data.timestamp_us = Some(b.u64("Microseconds")?),
            P_CONNECTION_ATTEMPT_EVENT => data.events.push(ReaderEvent::ConnectionAttempt {
                status: b.u16("Status")?,
            }),
            P_CONNECTION_CLOSE_EVENT => data.events.push(ReaderEvent::ConnectionClose),
            P_ANTENNA_EVENT => data.events.push(ReaderEvent::Antenna {
                event_type: b.u8("EventType")?,
                antenna_id: b.u16("AntennaID")?,
            }),
            P_READER_EXCEPTION_EVENT => {
                let message = b.utf8v("Message")?;
                data.events.push(ReaderEvent::ReaderException {
                    message: (!message.is_empty()).then_some(message),
                });
            }
            other => data.events.push(ReaderEvent::Other { type_code: other }),
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = encode_message(&Message::new(7, MessageBody::EnableRoSpec { rospec_id: 1111 })).unwrap();
        assert_eq!(frame.len(), HEADER_SIZE + 4);
        assert_eq!(u16::from_be_bytes([frame[0], frame[1]]), (1 << 10) | MSG_ENABLE_ROSPEC);
        assert_eq!(u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]), 14);
        assert_eq!(u32::from_be_bytes([frame[6], frame[7], frame[8], frame[9]]), 7);
        assert_eq!(&frame[10..], &1111u32.to_be_bytes());
    }

    #[test]
    fn test_custom_message_header() {
        let frame = encode_message(&Message::new(1, MessageBody::ImpinjEnableExtensions)).unwrap();
        assert_eq!(u16::from_be_bytes([frame[0], frame[1]]) & 0x03FF, MSG_CUSTOM_MESSAGE);
        assert_eq!(&frame[10..14], &IMPINJ_VENDOR_ID.to_be_bytes());
        assert_eq!(frame[14], IMPINJ_ENABLE_EXTENSIONS);
        let (kind, id) = peek_header(&frame).unwrap();
        assert_eq!(kind, MessageType::ImpinjEnableExtensions);
        assert_eq!(id, 1);
    }

    #[test]
    fn test_tlv_length_is_patched() {
        let mut e = Encoder::new();
        e.tlv(P_LLRP_STATUS, |e| {
            e.u16(0);
            e.u16(0);
        });
        let buf = e.finish().unwrap();
        assert_eq!(buf, vec![0x01, 0x1F, 0x00, 0x08, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_status_without_description() {
        let msg = Message::response(3, MessageType::AddRoSpecResponse, Some(LlrpStatus::success()));
        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert!(decoded.status().unwrap().description.is_none());
    }

    #[test]
    fn test_decode_response_missing_status() {
        let msg = Message::response(4, MessageType::StartRoSpecResponse, None);
        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert!(decoded.status().is_none());
        assert_eq!(decoded.message_type(), MessageType::StartRoSpecResponse);
    }

    #[test]
    fn test_decode_rejects_length_mismatch() {
        let mut frame = encode_message(&Message::new(1, MessageBody::GetReport)).unwrap();
        frame.push(0);
        let err = decode_message(&frame).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.ref_field, Some("length"));
    }

    #[test]
    fn test_decode_truncated_parameter() {
        let mut frame = encode_message(&Message::response(
            1,
            MessageType::AddRoSpecResponse,
            Some(LlrpStatus::failure(101, Some("bad"))),
        ))
        .unwrap();
        frame.truncate(frame.len() - 2);
        let len = frame.len() as u32;
        frame[2..6].copy_from_slice(&len.to_be_bytes());
        let err = decode_message(&frame).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
        assert_eq!(err.ref_type, Some("ADD_ROSPEC_RESPONSE"));
    }

    #[test]
    fn test_tag_report_first_parameter_not_epc() {
        let mut e = Encoder::new();
        e.tlv(P_TAG_REPORT_DATA, |e| {
            e.tv(TV_ANTENNA_ID);
            e.u16(2);
        });
        let buf = e.finish().unwrap();
        let mut c = Cursor::new(&buf, "test");
        let Some(RawParam::Tlv { body, .. }) = c.next_param().unwrap() else {
            panic!("expected TLV");
        };
        let tag = decode_tag_report(body).unwrap();
        assert_eq!(tag.epc, Some(Epc::Unrecognized { type_code: 1 }));
        assert_eq!(tag.antenna_id, Some(2));
    }

    #[test]
    fn test_tag_report_keeps_op_result_order() {
        let tag = TagReportData {
            epc: Some(Epc::Data {
                bits: 16,
                bytes: vec![0xAB, 0xCD],
            }),
            op_spec_results: vec![
                OpSpecResult::GetQtConfig {
                    result: 0,
                    op_spec_id: 1,
                    data_profile: 2,
                    access_range: 1,
                },
                OpSpecResult::Read {
                    result: 0,
                    op_spec_id: 2,
                    data: vec![0x1234],
                },
            ],
            custom: vec![TagCustom::SerializedTid(vec![0xE280, 0x1160])],
            ..Default::default()
        };
        let msg = Message::new(9, MessageBody::RoAccessReport(vec![tag.clone()]));
        let decoded = decode_message(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(decoded.body, MessageBody::RoAccessReport(vec![tag]));
    }

    #[test]
    fn test_unknown_tv_type_is_decode_error() {
        let buf = [0x80 | 0x7F, 0, 0];
        let mut c = Cursor::new(&buf, "test");
        assert!(c.next_param().is_err());
    }

    #[test]
    fn test_state_aware_inventory_command_layout() {
        let cmd = C1G2InventoryCommand {
            state_aware: true,
            filters: vec![C1G2Filter {
                truncate: 0,
                mask: C1G2TagInventoryMask {
                    memory_bank: 2,
                    pointer: 0,
                    mask: BitMask::new(8, &[0xAA]),
                },
                action: Some(FilterAction::StateAware {
                    target: SelectTarget::S0,
                    action: SELECT_ASSERT_SL_OR_A,
                }),
            }],
            singulation: Some(C1G2SingulationControl {
                session: 1,
                tag_population: 32,
                tag_transit_time: 0,
                state_aware_action: Some(StateAwareSingulation {
                    state_b: true,
                    not_sl: false,
                }),
            }),
            ..Default::default()
        };
        let mut e = Encoder::new();
        encode_inventory_command(&mut e, &cmd);
        let bytes = e.finish().unwrap();

        assert_eq!(bytes[4], 0x80);
        // type 333, length 6, target S0, action 0
        assert!(bytes.windows(6).any(|w| w == [0x01u8, 0x4D, 0x00, 0x06, 0x00, 0x00]));
        // type 337, length 5, I = state B, S = SL
        assert!(bytes.windows(5).any(|w| w == [0x01u8, 0x51, 0x00, 0x05, 0x80]));
    }

    #[test]
    fn test_tag_observation_stop_trigger_layout() {
        let spec = RoSpec {
            id: 1,
            priority: 0,
            current_state: 0,
            start_trigger: 1,
            stop_trigger: 0,
            stop_duration_ms: 0,
            ai_spec: AiSpec {
                antenna_ids: vec![1],
                stop_trigger: AI_STOP_TAG_OBSERVATION,
                stop_duration_ms: 0,
                tag_observation: Some(TagObservationTrigger {
                    trigger_type: 0,
                    tag_count: 100,
                    attempts: 0,
                    t: 0,
                    timeout_ms: 500,
                }),
                inventory: Vec::new(),
            },
            report_spec: None,
        };
        let mut e = Encoder::new();
        encode_rospec(&mut e, &spec);
        let bytes = e.finish().unwrap();
        let observation: [u8; 16] = [0x00, 0xB9, 0x00, 0x10, 0, 0, 0, 100, 0, 0, 0, 0, 0, 0, 0x01, 0xF4];
        assert!(bytes.windows(observation.len()).any(|w| w == observation));
    }

    #[test]
    fn test_bitmask_shorter_than_declared_fails_encode() {
        let mut e = Encoder::new();
        e.u1v(&BitMask::new(24, &[0x30, 0x00]));
        assert_eq!(e.finish().unwrap_err().kind, ErrorKind::Encode);
    }
}
