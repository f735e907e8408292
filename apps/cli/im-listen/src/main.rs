use im_listen::error::ListenError;
use im_listen::logger::initialize as LoggerInitialize;
use im_listen::settings::ListenSettings;

use im_transport::session::{ImSession, Registration};
use im_transport::{ConnectOptions, EventKind, TransportClient, TransportConfig, TransportEvent};

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ListenError> {
    // A missing .env is fine; variables may come from the shell.
    let _ = dotenvy::dotenv();

    let settings = ListenSettings::from_env()?;

    create_dir_all(&settings.log_dir).map_err(|e| ListenError::Listen {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    LoggerInitialize(&settings.log_dir, settings.log_level)?;

    info!("im-listen starting");
    info!("Log directory: {}", settings.log_dir.display());

    let mut config = TransportConfig::load(&settings.config_dir)?;
    if let Some(url) = &settings.ws_url {
        config.ws_url = url.clone();
    }

    let client = TransportClient::new(config)?;
    let session = ImSession::new(client.clone());
    let registration = Registration::new()
        .with_token(settings.token.clone())
        .with_device_id(settings.device_id.clone());

    client.on_formatted_message(|message| match serde_json::to_string(&message) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("Failed to serialize message: {e}"),
    });

    client.on(EventKind::Close, |event| {
        if let TransportEvent::Close { code, reason } = event {
            warn!("Connection closed ({code}) {reason}");
        }
    });

    // A fresh socket is unregistered; repeat the handshake after every reconnect.
    let reconnect_session = session.clone();
    let reconnect_registration = registration.clone();
    client.on(EventKind::Reconnect, move |_| {
        let session = reconnect_session.clone();
        let registration = reconnect_registration.clone();
        tokio::spawn(async move {
            if let Err(e) = session.register(&registration).await {
                error!("Re-registration failed: {e}");
            }
        });
    });

    let gave_up = Arc::new(Notify::new());
    let notify = Arc::clone(&gave_up);
    client.on(EventKind::ReconnectFailed, move |_| notify.notify_one());

    client.connect(None, ConnectOptions::default()).await?;
    session.register(&registration).await?;
    info!("Registered as device {}; listening for messages", settings.device_id);

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for ctrl-c: {e}");
            }
            info!("Shutting down");
            client.disconnect();
            Ok(())
        }
        _ = gave_up.notified() => Err(ListenError::Transport {
            message: "Gave up reconnecting".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
