//! LLRP message model.

use serde::Serialize;

use super::params::{
    AccessSpec, GeneralDeviceCapabilities, LlrpStatus, ReaderEventNotificationData, RoSpec, SetReaderConfig,
    TagReportData,
};
use super::types::*;

/// Broad role of a message in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Command,
    Response,
    Notification,
    ErrorReply,
}

/// Every message type this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageType {
    GetReaderCapabilities,
    GetReaderCapabilitiesResponse,
    SetReaderConfig,
    SetReaderConfigResponse,
    AddRoSpec,
    AddRoSpecResponse,
    StartRoSpec,
    StartRoSpecResponse,
    StopRoSpec,
    StopRoSpecResponse,
    EnableRoSpec,
    EnableRoSpecResponse,
    AddAccessSpec,
    AddAccessSpecResponse,
    EnableAccessSpec,
    EnableAccessSpecResponse,
    GetReport,
    RoAccessReport,
    Keepalive,
    KeepaliveAck,
    ReaderEventNotification,
    CloseConnection,
    CloseConnectionResponse,
    ErrorMessage,
    ImpinjEnableExtensions,
    ImpinjEnableExtensionsResponse,
    /// Anything else the reader sends.
    Unknown(u16),
}

impl MessageType {
    /// Canonical protocol name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetReaderCapabilities => "GET_READER_CAPABILITIES",
            Self::GetReaderCapabilitiesResponse => "GET_READER_CAPABILITIES_RESPONSE",
            Self::SetReaderConfig => "SET_READER_CONFIG",
            Self::SetReaderConfigResponse => "SET_READER_CONFIG_RESPONSE",
            Self::AddRoSpec => "ADD_ROSPEC",
            Self::AddRoSpecResponse => "ADD_ROSPEC_RESPONSE",
            Self::StartRoSpec => "START_ROSPEC",
            Self::StartRoSpecResponse => "START_ROSPEC_RESPONSE",
            Self::StopRoSpec => "STOP_ROSPEC",
            Self::StopRoSpecResponse => "STOP_ROSPEC_RESPONSE",
            Self::EnableRoSpec => "ENABLE_ROSPEC",
            Self::EnableRoSpecResponse => "ENABLE_ROSPEC_RESPONSE",
            Self::AddAccessSpec => "ADD_ACCESSSPEC",
            Self::AddAccessSpecResponse => "ADD_ACCESSSPEC_RESPONSE",
            Self::EnableAccessSpec => "ENABLE_ACCESSSPEC",
            Self::EnableAccessSpecResponse => "ENABLE_ACCESSSPEC_RESPONSE",
            Self::GetReport => "GET_REPORT",
            Self::RoAccessReport => "RO_ACCESS_REPORT",
            Self::Keepalive => "KEEPALIVE",
            Self::KeepaliveAck => "KEEPALIVE_ACK",
            Self::ReaderEventNotification => "READER_EVENT_NOTIFICATION",
            Self::CloseConnection => "CLOSE_CONNECTION",
            Self::CloseConnectionResponse => "CLOSE_CONNECTION_RESPONSE",
            Self::ErrorMessage => "ERROR_MESSAGE",
            Self::ImpinjEnableExtensions => "IMPINJ_ENABLE_EXTENSIONS",
            Self::ImpinjEnableExtensionsResponse => "IMPINJ_ENABLE_EXTENSIONS_RESPONSE",
            Self::Unknown(_) => "UNKNOWN_MESSAGE",
        }
    }

    /// Response type a command expects, `None` for non-commands.
    pub fn response_type(self) -> Option<MessageType> {
        let rsp = match self {
            Self::GetReaderCapabilities => Self::GetReaderCapabilitiesResponse,
            Self::SetReaderConfig => Self::SetReaderConfigResponse,
            Self::AddRoSpec => Self::AddRoSpecResponse,
            Self::StartRoSpec => Self::StartRoSpecResponse,
            Self::StopRoSpec => Self::StopRoSpecResponse,
            Self::EnableRoSpec => Self::EnableRoSpecResponse,
            Self::AddAccessSpec => Self::AddAccessSpecResponse,
            Self::EnableAccessSpec => Self::EnableAccessSpecResponse,
            Self::CloseConnection => Self::CloseConnectionResponse,
            Self::ImpinjEnableExtensions => Self::ImpinjEnableExtensionsResponse,
            _ => return None,
        };
        Some(rsp)
    }

    pub fn category(self) -> Category {
        match self {
            Self::ErrorMessage => Category::ErrorReply,
            Self::RoAccessReport | Self::Keepalive | Self::ReaderEventNotification | Self::Unknown(_) => {
                Category::Notification
            }
            t if t.response_type().is_some() || matches!(t, Self::GetReport | Self::KeepaliveAck) => {
                Category::Command
            }
            _ => Category::Response,
        }
    }

    /// Numeric type code and, for vendor messages, the subtype.
    pub(crate) fn wire_code(self) -> (u16, Option<u8>) {
        match self {
            Self::GetReaderCapabilities => (MSG_GET_READER_CAPABILITIES, None),
            Self::GetReaderCapabilitiesResponse => (MSG_GET_READER_CAPABILITIES_RESPONSE, None),
            Self::SetReaderConfig => (MSG_SET_READER_CONFIG, None),
            Self::SetReaderConfigResponse => (MSG_SET_READER_CONFIG_RESPONSE, None),
            Self::AddRoSpec => (MSG_ADD_ROSPEC, None),
            Self::AddRoSpecResponse => (MSG_ADD_ROSPEC_RESPONSE, None),
            Self::StartRoSpec => (MSG_START_ROSPEC, None),
            Self::StartRoSpecResponse => (MSG_START_ROSPEC_RESPONSE, None),
            Self::StopRoSpec => (MSG_STOP_ROSPEC, None),
            Self::StopRoSpecResponse => (MSG_STOP_ROSPEC_RESPONSE, None),
            Self::EnableRoSpec => (MSG_ENABLE_ROSPEC, None),
            Self::EnableRoSpecResponse => (MSG_ENABLE_ROSPEC_RESPONSE, None),
            Self::AddAccessSpec => (MSG_ADD_ACCESSSPEC, None),
            Self::AddAccessSpecResponse => (MSG_ADD_ACCESSSPEC_RESPONSE, None),
            Self::EnableAccessSpec => (MSG_ENABLE_ACCESSSPEC, None),
            Self::EnableAccessSpecResponse => (MSG_ENABLE_ACCESSSPEC_RESPONSE, None),
            Self::GetReport => (MSG_GET_REPORT, None),
            Self::RoAccessReport => (MSG_RO_ACCESS_REPORT, None),
            Self::Keepalive => (MSG_KEEPALIVE, None),
            Self::KeepaliveAck => (MSG_KEEPALIVE_ACK, None),
            Self::ReaderEventNotification => (MSG_READER_EVENT_NOTIFICATION, None),
            Self::CloseConnection => (MSG_CLOSE_CONNECTION, None),
            Self::CloseConnectionResponse => (MSG_CLOSE_CONNECTION_RESPONSE, None),
            Self::ErrorMessage => (MSG_ERROR_MESSAGE, None),
            Self::ImpinjEnableExtensions => (MSG_CUSTOM_MESSAGE, Some(IMPINJ_ENABLE_EXTENSIONS)),
            Self::ImpinjEnableExtensionsResponse => (MSG_CUSTOM_MESSAGE, Some(IMPINJ_ENABLE_EXTENSIONS_RESPONSE)),
            Self::Unknown(code) => (code, None),
        }
    }

    /// Map a standard type code back to its variant.
    pub(crate) fn from_code(code: u16) -> Self {
        match code {
            MSG_GET_READER_CAPABILITIES => Self::GetReaderCapabilities,
            MSG_GET_READER_CAPABILITIES_RESPONSE => Self::GetReaderCapabilitiesResponse,
            MSG_SET_READER_CONFIG => Self::SetReaderConfig,
            MSG_SET_READER_CONFIG_RESPONSE => Self::SetReaderConfigResponse,
            MSG_ADD_ROSPEC => Self::AddRoSpec,
            MSG_ADD_ROSPEC_RESPONSE => Self::AddRoSpecResponse,
            MSG_START_ROSPEC => Self::StartRoSpec,
            MSG_START_ROSPEC_RESPONSE => Self::StartRoSpecResponse,
            MSG_STOP_ROSPEC => Self::StopRoSpec,
            MSG_STOP_ROSPEC_RESPONSE => Self::StopRoSpecResponse,
            MSG_ENABLE_ROSPEC => Self::EnableRoSpec,
            MSG_ENABLE_ROSPEC_RESPONSE => Self::EnableRoSpecResponse,
            MSG_ADD_ACCESSSPEC => Self::AddAccessSpec,
            MSG_ADD_ACCESSSPEC_RESPONSE => Self::AddAccessSpecResponse,
            MSG_ENABLE_ACCESSSPEC => Self::EnableAccessSpec,
            MSG_ENABLE_ACCESSSPEC_RESPONSE => Self::EnableAccessSpecResponse,
            MSG_GET_REPORT => Self::GetReport,
            MSG_RO_ACCESS_REPORT => Self::RoAccessReport,
            MSG_KEEPALIVE => Self::Keepalive,
            MSG_KEEPALIVE_ACK => Self::KeepaliveAck,
            MSG_READER_EVENT_NOTIFICATION => Self::ReaderEventNotification,
            MSG_CLOSE_CONNECTION => Self::CloseConnection,
            MSG_CLOSE_CONNECTION_RESPONSE => Self::CloseConnectionResponse,
            MSG_ERROR_MESSAGE => Self::ErrorMessage,
            other => Self::Unknown(other),
        }
    }
}

/// A complete LLRP message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Correlation id, echoed by the reader in the matching response.
    pub id: u32,
    pub body: MessageBody,
}

/// Typed payload of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MessageBody {
    GetReaderCapabilities { requested_data: u8 },
    SetReaderConfig(Box<SetReaderConfig>),
    AddRoSpec(Box<RoSpec>),
    EnableRoSpec { rospec_id: u32 },
    StartRoSpec { rospec_id: u32 },
    StopRoSpec { rospec_id: u32 },
    AddAccessSpec(Box<AccessSpec>),
    EnableAccessSpec { access_spec_id: u32 },
    GetReport,
    KeepaliveAck,
    CloseConnection,
    ImpinjEnableExtensions,

    /// Any status-only response.
    Response { kind: MessageType, status: Option<LlrpStatus> },
    Capabilities {
        status: Option<LlrpStatus>,
        general: Option<GeneralDeviceCapabilities>,
    },
    RoAccessReport(Vec<TagReportData>),
    ReaderEventNotification(Option<ReaderEventNotificationData>),
    Keepalive,
    ErrorMessage { status: Option<LlrpStatus> },
    Unknown { type_code: u16 },
}

impl Message {
    pub fn new(id: u32, body: MessageBody) -> Self {
        Self { id, body }
    }

    pub fn message_type(&self) -> MessageType {
        match &self.body {
            MessageBody::GetReaderCapabilities { .. } => MessageType::GetReaderCapabilities,
            MessageBody::SetReaderConfig(_) => MessageType::SetReaderConfig,
            MessageBody::AddRoSpec(_) => MessageType::AddRoSpec,
            MessageBody::EnableRoSpec { .. } => MessageType::EnableRoSpec,
            MessageBody::StartRoSpec { .. } => MessageType::StartRoSpec,
            MessageBody::StopRoSpec { .. } => MessageType::StopRoSpec,
            MessageBody::AddAccessSpec(_) => MessageType::AddAccessSpec,
            MessageBody::EnableAccessSpec { .. } => MessageType::EnableAccessSpec,
            MessageBody::GetReport => MessageType::GetReport,
            MessageBody::KeepaliveAck => MessageType::KeepaliveAck,
            MessageBody::CloseConnection => MessageType::CloseConnection,
            MessageBody::ImpinjEnableExtensions => MessageType::ImpinjEnableExtensions,
            MessageBody::Response { kind, .. } => *kind,
            MessageBody::Capabilities { .. } => MessageType::GetReaderCapabilitiesResponse,
            MessageBody::RoAccessReport(_) => MessageType::RoAccessReport,
            MessageBody::ReaderEventNotification(_) => MessageType::ReaderEventNotification,
            MessageBody::Keepalive => MessageType::Keepalive,
            MessageBody::ErrorMessage { .. } => MessageType::ErrorMessage,
            MessageBody::Unknown { type_code } => MessageType::Unknown(*type_code),
        }
    }

    pub fn name(&self) -> &'static str {
        self.message_type().name()
    }

    /// Status parameter of a response or error reply.
    pub fn status(&self) -> Option<&LlrpStatus> {
        match &self.body {
            MessageBody::Response { status, .. }
            | MessageBody::Capabilities { status, .. }
            | MessageBody::ErrorMessage { status } => status.as_ref(),
            _ => None,
        }
    }

    /// Build a status-only response, mostly useful for scripted peers.
    pub fn response(id: u32, kind: MessageType, status: Option<LlrpStatus>) -> Self {
        Self::new(id, MessageBody::Response { kind, status })
    }
}
