//! Connect to a reader, confirm the connection event and print its
//! general capabilities.
//!
//! ```text
//! cargo run --example probe_reader -- speedway-00-11-22
//! ```

use std::io;
use std::time::Duration;

use anyhow::{Context, bail};
use llrp_inventory::config::AppConfig;
use llrp_inventory::llrp::{CONNECTION_ATTEMPT_SUCCESS, Connection, MessageBody, RecvWait, TcpConnection};
use llrp_inventory::session::{Session, check_status};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let host = std::env::args().nth(1).context("usage: probe_reader <host>")?;
    let mut config = AppConfig::default();
    config.reader.host = host.clone();

    let mut conn = TcpConnection::new(
        &host,
        config.reader.port,
        Duration::from_secs(config.reader.connect_timeout_secs),
        config.reader.max_frame_bytes,
    )?;
    conn.open().with_context(|| format!("connecting to {}", conn.addr()))?;
    tracing::info!("Connected to {}", conn.addr());

    let mut session = Session::new(conn, config, io::stdout());

    let event = session.recv_message(RecvWait::Millis(10_000))?;
    let attempt = match &event.body {
        MessageBody::ReaderEventNotification(Some(data)) => data.connection_attempt(),
        _ => None,
    };
    if attempt != Some(CONNECTION_ATTEMPT_SUCCESS) {
        bail!("reader did not accept the connection ({})", event.name());
    }

    let reply = session.transact(MessageBody::GetReaderCapabilities { requested_data: 0 })?;
    check_status(reply.status(), "get_reader_capabilities")?;
    match &reply.body {
        MessageBody::Capabilities {
            general: Some(general), ..
        } => {
            println!("manufacturer: {}", general.manufacturer);
            println!("model:        {}", general.model);
            println!("firmware:     {}", general.firmware_version);
            println!("antennas:     {}", general.max_antennas);
            println!("utc clock:    {}", general.has_utc_clock);
        }
        _ => bail!("capabilities response without general device capabilities"),
    }

    session.close();
    Ok(())
}
