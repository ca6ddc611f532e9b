//! Read commands.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use bluetemp_core::{Outcome, Session, SessionConfig};
use bluetemp_store::Store;
use bluetemp_types::{Climate, Reading, Role};
use tracing::{info, warn};

use super::Status;
use crate::cli::OutputFormat;
use crate::format::{format_climate, format_reading};

/// Arguments for the read command.
pub struct ReadArgs {
    pub session: SessionConfig,
    pub format: OutputFormat,
    /// Database to persist the reading in, if any.
    pub store: Option<PathBuf>,
}

pub async fn cmd_read(args: ReadArgs) -> Result<Status> {
    let session = super::platform_session(args.session).await?;
    read_climate(
        &session,
        bluetemp_core::interrupt(),
        args.format,
        args.store,
        &mut io::stdout(),
    )
    .await
}

/// Read one role and print it.
pub async fn cmd_single(config: SessionConfig, role: Role, format: OutputFormat) -> Result<Status> {
    let session = super::platform_session(config).await?;
    read_single(
        &session,
        bluetemp_core::interrupt(),
        role,
        format,
        &mut io::stdout(),
    )
    .await
}

async fn read_climate<S, W>(
    session: &Session,
    signal: S,
    format: OutputFormat,
    store: Option<PathBuf>,
    out: &mut W,
) -> Result<Status>
where
    S: Future<Output = ()>,
    W: Write,
{
    let outcome = session
        .lifecycle()
        .run_until(session.read_climate(), signal)
        .await;
    let climate = match outcome {
        Outcome::Interrupted => return Ok(Status::Interrupted),
        Outcome::Completed(result) => result.context("Failed to read temperature and humidity")?,
    };

    out.write_all(format_climate(&climate, format)?.as_bytes())?;
    out.flush()?;

    if let Some(path) = store {
        persist(path, climate).await;
    }
    Ok(Status::Done)
}

async fn read_single<S, W>(
    session: &Session,
    signal: S,
    role: Role,
    format: OutputFormat,
    out: &mut W,
) -> Result<Status>
where
    S: Future<Output = ()>,
    W: Write,
{
    let read = async {
        match role {
            Role::Temperature => session.read_temperature().await,
            Role::Humidity => session.read_humidity().await,
            Role::Battery => session.read_battery().await,
        }
    };
    let value = match session.lifecycle().run_until(read, signal).await {
        Outcome::Interrupted => return Ok(Status::Interrupted),
        Outcome::Completed(result) => result.with_context(|| format!("Failed to read {role}"))?,
    };

    out.write_all(format_reading(&Reading::new(role, value), format)?.as_bytes())?;
    out.flush()?;
    Ok(Status::Done)
}

/// Hand a climate record to the store. Failures are only logged.
async fn persist(path: PathBuf, climate: Climate) {
    let result = tokio::task::spawn_blocking(move || {
        let store = Store::open(&path)?;
        store.store(&climate)
    })
    .await;

    match result {
        Ok(Ok(record)) => info!(id = record.id, "Reading stored"),
        Ok(Err(e)) => warn!(error = %e, "Failed to store reading"),
        Err(e) => warn!(error = %e, "Store task failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bluetemp_core::{MockPeripheral, MockTransport};

    use super::*;

    fn mock_session(peripheral: MockPeripheral) -> (Session, Arc<MockPeripheral>) {
        let transport = Arc::new(MockTransport::powered_on());
        let peripheral = transport.add_peripheral(peripheral);
        let session = Session::new(transport, SessionConfig::new("sensor-1")).unwrap();
        (session, peripheral)
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_read_prints_climate() {
        let (session, peripheral) = mock_session(
            MockPeripheral::builder()
                .id("sensor-1")
                .value(Role::Temperature, 21.5)
                .value(Role::Humidity, 40.0)
                .build(),
        );
        let mut out = Vec::new();

        let status = read_climate(&session, never(), OutputFormat::Text, None, &mut out)
            .await
            .unwrap();

        assert_eq!(status, Status::Done);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("21.50 °C"));
        assert!(text.contains("40.00 %"));
        assert_eq!(peripheral.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_read_stores_record() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("records.db");
        let (session, _peripheral) = mock_session(
            MockPeripheral::builder()
                .id("sensor-1")
                .value(Role::Temperature, 19.0)
                .build(),
        );
        let mut out = Vec::new();

        read_climate(
            &session,
            never(),
            OutputFormat::Json,
            Some(db.clone()),
            &mut out,
        )
        .await
        .unwrap();

        let records = Store::open(&db).unwrap().recent(10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].temperature, 19.0);
    }

    #[tokio::test]
    async fn test_store_failure_still_prints() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database.
        let (session, _peripheral) =
            mock_session(MockPeripheral::builder().id("sensor-1").build());
        let mut out = Vec::new();

        let status = read_climate(
            &session,
            never(),
            OutputFormat::Text,
            Some(dir.path().to_path_buf()),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(status, Status::Done);
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn test_failed_read_is_error() {
        let (session, peripheral) = mock_session(
            MockPeripheral::builder()
                .id("sensor-1")
                .empty_value(Role::Humidity)
                .build(),
        );
        let mut out = Vec::new();

        let err = read_climate(&session, never(), OutputFormat::Text, None, &mut out)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("Unreadable response"));
        assert!(out.is_empty());
        assert_eq!(peripheral.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_is_not_an_error() {
        let (session, peripheral) = mock_session(
            MockPeripheral::builder()
                .id("sensor-1")
                .read_latency(Duration::from_secs(60))
                .build(),
        );
        let mut out = Vec::new();

        let status = read_single(
            &session,
            tokio::time::sleep(Duration::from_secs(1)),
            Role::Battery,
            OutputFormat::Text,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(status, Status::Interrupted);
        assert!(out.is_empty());
        assert!(!peripheral.is_connected_sync());
    }

    #[tokio::test]
    async fn test_single_battery_json() {
        let (session, _peripheral) = mock_session(
            MockPeripheral::builder()
                .id("sensor-1")
                .value(Role::Battery, 87.0)
                .build(),
        );
        let mut out = Vec::new();

        read_single(&session, never(), Role::Battery, OutputFormat::Json, &mut out)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["role"], "battery");
        assert_eq!(value["value"], 87.0);
    }
}
