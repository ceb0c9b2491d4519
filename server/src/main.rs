//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Mudlark telnet server binary

use clap::Parser;
use mudlark_server::{
    Authenticator, ControlHandle, Controller, LoopControl, MemoryStore, MudConfig, World,
};
use mudlark_service::{ConnectionConfig, ServerConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Multi-user telnet game server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = mudlark_service::DEFAULT_PORT)]
    port: u16,

    /// Seconds between world ticks
    #[arg(short, long, default_value_t = 5)]
    tick_interval: u64,

    /// Maximum characters kept from one line of input
    #[arg(long, default_value_t = 512)]
    max_input_length: usize,

    /// Characters of outbound text shown in trace logs
    #[arg(long, default_value_t = 80)]
    preview_length: usize,

    /// Seconds a login may take before the connection is dropped
    #[arg(long)]
    auth_timeout: Option<u64>,

    /// Directory of *.txt text fixtures (LOGIN, MOTD, ...)
    #[arg(short, long)]
    fixtures: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> MudConfig {
        let connection = ConnectionConfig::default()
            .with_max_input_length(self.max_input_length)
            .with_output_preview_length(self.preview_length);
        let server =
            ServerConfig::new(SocketAddr::new(self.bind, self.port)).with_connection(connection);
        MudConfig::new(server)
            .with_tick_interval(Duration::from_secs(self.tick_interval))
            .with_auth_timeout(self.auth_timeout.map(Duration::from_secs))
    }
}

/// Restart the main loop on SIGHUP
#[cfg(unix)]
fn watch_hangup(handle: ControlHandle) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        if hangup.recv().await.is_some() {
            info!("SIGHUP received");
            handle.restart();
        }
    }))
}

#[cfg(not(unix))]
fn watch_hangup(_handle: ControlHandle) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(std::future::pending()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    info!("== Mudlark ==");
    let store = Arc::new(MemoryStore::new());
    if let Some(dir) = &args.fixtures {
        store.load_fixtures(dir).await?;
    }

    loop {
        let authenticator = Authenticator::new(store.clone(), store.clone());
        let controller = Controller::new(config.clone(), authenticator, Box::new(World::new()));
        controller.start().await?;
        let hangup = watch_hangup(controller.control_handle())?;

        let outcome = tokio::select! {
            outcome = controller.run() => outcome,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupt received");
                Ok(LoopControl::Shutdown)
            }
        };
        hangup.abort();
        controller.shutdown().await?;

        match outcome? {
            LoopControl::Restart => info!("Restarting"),
            LoopControl::Shutdown | LoopControl::Continue => break,
        }
    }

    info!("Shut down");
    Ok(())
}
