//! Tag report line formatting.
//!
//! Every formatter appends one labelled segment to a [`TextBuf`] and returns
//! the number of bytes it wrote. A full buffer truncates silently.

use std::fmt::{self, Write as _};
use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use super::Session;
use crate::llrp::{Connection, Epc, OpSpecResult, TagCustom, TagReportData};

/// Placeholder for a report entry without an EPC.
pub const EPC_NULL: &str = "--null epc---";

/// Placeholder for an EPC slot holding some other parameter.
pub const EPC_UNKNOWN: &str = "---unknown-epc-data-type---";

const READ_SUCCESS: u8 = 0;
const GET_QT_SUCCESS: u8 = 0;

const DATA_PROFILES: [&str; 3] = ["Unknown", "Private", "Public"];
const ACCESS_RANGES: [&str; 3] = ["Unknown", "Normal", "Short"];

/// Bounded text buffer.
///
/// `capacity` counts a reserved terminator slot, so at most `capacity - 1`
/// bytes of content are ever held.
#[derive(Debug, Clone)]
pub struct TextBuf {
    text: String,
    capacity: usize,
}

impl TextBuf {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Content bytes still free.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(1).saturating_sub(self.text.len())
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Append as much of `s` as fits, never splitting a character.
    pub fn push_str(&mut self, s: &str) -> usize {
        let room = self.remaining();
        let mut n = s.len().min(room);
        while !s.is_char_boundary(n) {
            n -= 1;
        }
        self.text.push_str(&s[..n]);
        n
    }
}

impl fmt::Write for TextBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

/// Append pre-formatted text; truncation is not an error.
fn put(buf: &mut TextBuf, args: fmt::Arguments<'_>) {
    let _ = buf.write_fmt(args);
}

/// Hex pairs with a '-' before every even index after the first.
///
/// The separator needs one free byte, a value two; otherwise it is skipped.
fn put_grouped_hex<T: fmt::UpperHex>(buf: &mut TextBuf, values: &[T]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 && i % 2 == 0 && buf.remaining() >= 1 {
            buf.push_str("-");
        }
        if buf.remaining() >= 2 {
            put(buf, format_args!("{v:02X}"));
        }
    }
}

pub fn format_epc(epc: Option<&Epc>, buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    match epc {
        Some(Epc::Epc96(bytes)) => put_grouped_hex(buf, bytes),
        Some(Epc::Data { bits, bytes }) => {
            let n = (*bits as usize).div_ceil(8).min(bytes.len());
            put_grouped_hex(buf, &bytes[..n]);
        }
        Some(Epc::Unrecognized { .. }) => {
            buf.push_str(EPC_UNKNOWN);
        }
        None => {
            buf.push_str(EPC_NULL);
        }
    }
    buf.len() - start
}

pub fn format_read_result(result: u8, data: &[u16], buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put(buf, format_args!("result={result}"));
    if result == READ_SUCCESS {
        buf.push_str(" Data=");
        for (i, word) in data.iter().enumerate() {
            if i > 0 {
                buf.push_str("-");
            }
            put(buf, format_args!("{word:04x}"));
        }
    }
    buf.len() - start
}

pub fn format_write_result(result: u8, buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put(buf, format_args!("result={result}"));
    buf.len() - start
}

pub fn format_set_qt_result(result: u8, buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put(buf, format_args!("result={result}"));
    buf.len() - start
}

/// Table entry for an ordinal; out-of-range ordinals render as `Unknown(n)`.
fn lookup(table: &[&'static str], ordinal: u8) -> std::borrow::Cow<'static, str> {
    match table.get(ordinal as usize) {
        Some(name) => (*name).into(),
        None => format!("Unknown({ordinal})").into(),
    }
}

pub fn format_get_qt_result(
    result: u8,
    data_profile: u8,
    access_range: u8,
    buf: &mut TextBuf,
    prefix: &str,
) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put(buf, format_args!("result={result} "));
    if result == GET_QT_SUCCESS {
        put(
            buf,
            format_args!(
                "data={} range={}",
                lookup(&DATA_PROFILES, data_profile),
                lookup(&ACCESS_RANGES, access_range)
            ),
        );
    }
    buf.len() - start
}

pub fn format_serialized_tid(tid: &[u16], buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put_grouped_hex(buf, tid);
    buf.len() - start
}

/// First- or last-seen time, microseconds since the epoch, as RFC 3339.
pub fn format_seen(seen_us: u64, buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    let micros = i64::try_from(seen_us).unwrap_or(i64::MAX);
    match DateTime::<Utc>::from_timestamp_micros(micros) {
        Some(ts) => put(buf, format_args!("{}", ts.to_rfc3339_opts(SecondsFormat::Micros, true))),
        None => put(buf, format_args!("{seen_us}us")),
    }
    buf.len() - start
}

pub fn format_antenna(antenna_id: u16, buf: &mut TextBuf, prefix: &str) -> usize {
    let start = buf.len();
    buf.push_str(prefix);
    put(buf, format_args!("{antenna_id}"));
    buf.len() - start
}

/// One report entry on one line: EPC, then whichever of antenna, peak
/// RSSI, seen count and first/last-seen the reader included, then
/// operation results and vendor records in arrival order.
pub fn format_tag_report(tag: &TagReportData, buf: &mut TextBuf) -> usize {
    let start = buf.len();
    format_epc(tag.epc.as_ref(), buf, "epc=");
    if let Some(antenna) = tag.antenna_id {
        format_antenna(antenna, buf, " ant=");
    }
    if let Some(rssi) = tag.peak_rssi {
        buf.push_str(" rssi=");
        put(buf, format_args!("{rssi}"));
    }
    if let Some(count) = tag.seen_count {
        buf.push_str(" count=");
        put(buf, format_args!("{count}"));
    }
    if let Some(seen) = tag.first_seen_utc {
        format_seen(seen, buf, " seen=");
    }
    if let Some(last) = tag.last_seen_utc {
        format_seen(last, buf, " last=");
    }

    for result in &tag.op_spec_results {
        match result {
            OpSpecResult::Read { result, data, .. } => {
                format_read_result(*result, data, buf, "\n    READ ");
            }
            OpSpecResult::Write { result, .. } => {
                format_write_result(*result, buf, "\n    WRITE ");
            }
            OpSpecResult::SetQtConfig { result, .. } => {
                format_set_qt_result(*result, buf, "\n    SETQT ");
            }
            OpSpecResult::GetQtConfig {
                result,
                data_profile,
                access_range,
                ..
            } => {
                format_get_qt_result(*result, *data_profile, *access_range, buf, "\n    GETQT ");
            }
            OpSpecResult::Other { .. } => {}
        }
    }

    for custom in &tag.custom {
        match custom {
            TagCustom::SerializedTid(tid) => {
                format_serialized_tid(tid, buf, "\n    SERIAL-TID ");
            }
            TagCustom::Other { .. } => {}
        }
    }
    buf.len() - start
}

impl<C: Connection, W: Write> Session<C, W> {
    /// Print every entry of one report, in list order.
    pub(crate) fn print_tag_reports(&mut self, tags: &[TagReportData]) {
        info!("{} tag report entries", tags.len());
        let mut line = TextBuf::with_capacity(self.config.session.line_capacity);
        for tag in tags {
            line.clear();
            format_tag_report(tag, &mut line);
            self.emit_line(line.as_str());
        }
    }
}
