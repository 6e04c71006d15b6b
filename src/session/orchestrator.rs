//! Session orchestrator: the fixed setup, run and teardown sequence.

use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::Session;
use super::commands::{ACCESS_SPEC_ID, ROSPEC_ID, Scenario, access_spec, reader_config, rospec};
use super::monitor::ReportMonitor;
use super::status::check_status;
use crate::config::{AppConfig, FirmwareCheck, PrerequisiteConfig};
use crate::error::{AppError, Result};
use crate::llrp::{
    CONNECTION_ATTEMPT_SUCCESS, Connection, GeneralDeviceCapabilities, Message, MessageBody, RecvWait,
    SetReaderConfig, TcpConnection,
};

pub const OUTCOME_SUCCESS: i32 = 0;
/// Options could not be validated.
pub const OUTCOME_INVALID_CONFIG: i32 = -1;
/// Reader address could not be resolved.
pub const OUTCOME_CONNECTION_SETUP_FAILED: i32 = -2;
pub const OUTCOME_CONNECT_FAILED: i32 = -3;

/// Forward steps in execution order. A failing step yields its position
/// (1-based) as the outcome code.
pub const STEP_NAMES: [&str; 12] = [
    "check_connection_status",
    "enable_impinj_extensions",
    "reset_to_factory_defaults",
    "get_reader_capabilities",
    "set_reader_config",
    "add_rospec",
    "add_access_spec",
    "enable_access_spec",
    "enable_rospec",
    "start_rospec",
    "await_reports",
    "stop_rospec",
];

/// Values fixed for the whole sequence.
struct Plan {
    scenario: Scenario,
    monitor: ReportMonitor,
}

type StepFn<C, W> = fn(&mut Session<C, W>, &Plan) -> Result<()>;

/// Connect to the configured reader and run the whole sequence.
///
/// Returns [`OUTCOME_SUCCESS`], the failing step's code, or a negative
/// code when no session could be established.
pub fn run(config: &AppConfig) -> i32 {
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return OUTCOME_INVALID_CONFIG;
    }
    let host = config.reader.host.trim();
    if host.is_empty() {
        error!("Invalid configuration: no reader host given");
        return OUTCOME_INVALID_CONFIG;
    }

    let mut conn = match TcpConnection::new(
        host,
        config.reader.port,
        Duration::from_secs(config.reader.connect_timeout_secs),
        config.reader.max_frame_bytes,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            error!("Error creating connection: {e}");
            return OUTCOME_CONNECTION_SETUP_FAILED;
        }
    };

    if let Err(e) = conn.open() {
        error!("Error connecting to {}: {e}", conn.addr());
        return OUTCOME_CONNECT_FAILED;
    }
    info!("Connected to {}", conn.addr());

    let mut session = Session::new(conn, config.clone(), io::stdout());
    session.execute()
}

/// Check the capabilities block against the configured requirements.
pub fn check_prerequisites(general: Option<&GeneralDeviceCapabilities>, prereq: &PrerequisiteConfig) -> Result<()> {
    let Some(general) = general else {
        error!("get_reader_capabilities missing general device capabilities");
        return Err(AppError::prerequisite("no general device capabilities"));
    };

    if general.manufacturer != prereq.manufacturer {
        error!(
            "Reader manufacturer {} is not {}",
            general.manufacturer, prereq.manufacturer
        );
        return Err(AppError::prerequisite(format!(
            "manufacturer {} is not {}",
            general.manufacturer, prereq.manufacturer
        )));
    }

    let firmware = general.firmware_version.as_str();
    if firmware.len() < 3 {
        error!("Could not understand firmware version '{firmware}'");
        return Err(AppError::prerequisite(format!("unreadable firmware version '{firmware}'")));
    }

    let (major, minor) = lenient_version(firmware);
    let (min_major, min_minor) = prereq.min_version();
    let below = (major, minor) < (min_major, min_minor);
    let rejected = match prereq.firmware_check {
        FirmwareCheck::Lenient => major < min_major && minor < min_minor,
        FirmwareCheck::Strict => below,
    };
    if rejected {
        error!("Must have firmware {} or later, reader has {firmware}", prereq.min_firmware);
        return Err(AppError::prerequisite(format!(
            "Must have firmware {} or later",
            prereq.min_firmware
        )));
    }
    if below {
        warn!(
            "Firmware {firmware} is older than {} but accepted by the lenient check",
            prereq.min_firmware
        );
    }

    debug!(
        "Reader manufacturer {} model {} firmware {firmware}",
        general.manufacturer, general.model
    );
    Ok(())
}

/// Leading digits of the first two dot-separated parts; missing parts are 0.
fn lenient_version(s: &str) -> (u32, u32) {
    let mut parts = s.split('.').map(|part| {
        let digits: String = part.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    });
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

impl<C: Connection, W: Write> Session<C, W> {
    /// Run every step in order, stop at the first failure, clean up and
    /// close. Returns the outcome code.
    pub fn execute(&mut self) -> i32 {
        let scenario = Scenario::from_number(self.config.operation.scenario);
        let plan = Plan {
            scenario,
            monitor: ReportMonitor::from_config(&self.config.monitor, scenario),
        };
        info!("Scenario {}: {}", scenario.number(), scenario.description());

        let mut outcome = OUTCOME_SUCCESS;
        let mut status_ok = false;
        for (index, step) in Self::steps().into_iter().enumerate() {
            let name = STEP_NAMES[index];
            debug!("Step {}: {name}", index + 1);
            if let Err(e) = step(self, &plan) {
                outcome = index as i32 + 1;
                error!("Step {outcome} {name} failed: {e}");
                break;
            }
            if index == 0 {
                status_ok = true;
            }
        }

        if status_ok {
            info!("Clean up reader configuration...");
            let _ = self.reset_to_factory_defaults(&plan);
            let _ = self.close_connection();
        }

        self.close();
        info!("Finished");
        outcome
    }

    fn steps() -> [StepFn<C, W>; 12] {
        [
            Self::check_connection_status,
            Self::enable_impinj_extensions,
            Self::reset_to_factory_defaults,
            Self::get_reader_capabilities,
            Self::set_reader_config,
            Self::add_rospec,
            Self::add_access_spec,
            Self::enable_access_spec,
            Self::enable_rospec,
            Self::start_rospec,
            Self::await_reports,
            Self::stop_rospec,
        ]
    }

    /// Transact and require a success status in the reply.
    fn command(&mut self, body: MessageBody, context: &str) -> Result<Message> {
        let reply = self.transact(body)?;
        check_status(reply.status(), context)?;
        Ok(reply)
    }

    fn check_connection_status(&mut self, _plan: &Plan) -> Result<()> {
        let wait = RecvWait::Millis(self.config.session.connection_status_wait_ms);
        let msg = match self.recv_message(wait) {
            Ok(msg) => msg,
            Err(e) => {
                error!("check_connection_status failed, no connection event received");
                return Err(e);
            }
        };

        let attempt = match &msg.body {
            MessageBody::ReaderEventNotification(Some(data)) => data.connection_attempt(),
            _ => None,
        };
        if attempt != Some(CONNECTION_ATTEMPT_SUCCESS) {
            error!("check_connection_status failed, got {} without a successful connection attempt", msg.name());
            return Err(AppError::Protocol {
                context: "check_connection_status".to_string(),
                description: "no successful connection attempt event".to_string(),
            });
        }

        info!("Connection status OK");
        Ok(())
    }

    fn enable_impinj_extensions(&mut self, _plan: &Plan) -> Result<()> {
        self.command(MessageBody::ImpinjEnableExtensions, "enable_impinj_extensions")?;
        info!("Impinj extensions are enabled");
        Ok(())
    }

    fn reset_to_factory_defaults(&mut self, _plan: &Plan) -> Result<()> {
        let body = MessageBody::SetReaderConfig(Box::new(SetReaderConfig::factory_reset()));
        self.command(body, "reset_to_factory_defaults")?;
        info!("Configuration reset to factory defaults");
        Ok(())
    }

    fn get_reader_capabilities(&mut self, _plan: &Plan) -> Result<()> {
        let reply = self.transact(MessageBody::GetReaderCapabilities { requested_data: 0 })?;
        check_status(reply.status(), "get_reader_capabilities")?;

        let general = match &reply.body {
            MessageBody::Capabilities { general, .. } => general.as_ref(),
            _ => None,
        };
        check_prerequisites(general, &self.config.prerequisites)?;
        info!("Reader capabilities meet prerequisites");
        Ok(())
    }

    fn set_reader_config(&mut self, plan: &Plan) -> Result<()> {
        let polled = plan.monitor.poll_interval().is_some();
        let config = reader_config(&self.config.operation, polled);
        self.command(MessageBody::SetReaderConfig(Box::new(config)), "set_reader_config")?;
        info!("Reader configured");
        Ok(())
    }

    fn add_rospec(&mut self, plan: &Plan) -> Result<()> {
        let spec = rospec(plan.scenario);
        self.command(MessageBody::AddRoSpec(Box::new(spec)), "add_rospec")?;
        info!("ROSpec added");
        Ok(())
    }

    fn add_access_spec(&mut self, plan: &Plan) -> Result<()> {
        let spec = access_spec(plan.scenario, &self.config.operation, &mut rand::thread_rng());
        self.command(MessageBody::AddAccessSpec(Box::new(spec)), "add_access_spec")?;
        info!("AccessSpec added");
        Ok(())
    }

    fn enable_access_spec(&mut self, _plan: &Plan) -> Result<()> {
        let body = MessageBody::EnableAccessSpec {
            access_spec_id: ACCESS_SPEC_ID,
        };
        self.command(body, "enable_access_spec")?;
        info!("AccessSpec enabled");
        Ok(())
    }

    fn enable_rospec(&mut self, _plan: &Plan) -> Result<()> {
        self.command(MessageBody::EnableRoSpec { rospec_id: ROSPEC_ID }, "enable_rospec")?;
        info!("ROSpec enabled");
        Ok(())
    }

    fn start_rospec(&mut self, _plan: &Plan) -> Result<()> {
        self.command(MessageBody::StartRoSpec { rospec_id: ROSPEC_ID }, "start_rospec")?;
        info!("ROSpec started");
        Ok(())
    }

    fn await_reports(&mut self, plan: &Plan) -> Result<()> {
        let summary = plan.monitor.run(self);
        info!(
            "Collected {} tag entries from {} reports in {}s",
            summary.tag_entries,
            summary.reports,
            plan.monitor.duration().as_secs()
        );
        Ok(())
    }

    fn stop_rospec(&mut self, _plan: &Plan) -> Result<()> {
        self.command(MessageBody::StopRoSpec { rospec_id: ROSPEC_ID }, "stop_rospec")?;
        info!("ROSpec stopped");
        Ok(())
    }

    /// Ask the reader to end the LLRP session before the socket goes away.
    fn close_connection(&mut self) -> Result<()> {
        self.command(MessageBody::CloseConnection, "close_connection")?;
        debug!("Reader acknowledged CLOSE_CONNECTION");
        Ok(())
    }
}
