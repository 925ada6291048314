//! Common test utilities for thermogate integration tests.
//!
//! Provides `TestEnv` for isolated configuration files and helpers to run
//! the router on an ephemeral port.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
pub use tempfile::TempDir;

/// Configuration shared by most tests.
///
/// `admin` is privileged: it sees circuit 1 and the tank, and gets the
/// "Service" mode. Everybody else sees circuit 0 only.
pub const SAMPLE_CONFIG: &str = r#"
version 1
adminName "admin"
appTitle "Boiler room"

standardModes {
    choice 1 "Auto"
    choice 2 "Eco"
}
privilegedModes {
    choice 1 "Auto"
    choice 2 "Eco"
    choice 5 "Service"
}

standardCircuits 0
privilegedCircuits 0 1
standardCircuitRunModes {
    choice 1 "Auto"
    choice 3 "Comfort"
}
privilegedTanks 0

standardOutdoorSensors 0
privilegedIndoorSensors 1
"#;

/// A test environment with an isolated configuration directory.
///
/// The `tg()` method returns a `Command` with `TG_CONFIG` pointing into the
/// environment, so tests never read the user's own configuration.
pub struct TestEnv {
    pub config_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with no configuration file yet.
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a test environment holding `SAMPLE_CONFIG`.
    pub fn sample() -> Self {
        let env = Self::new();
        env.write_config(SAMPLE_CONFIG);
        env
    }

    /// Path of the configuration file (may not exist yet).
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.path().join("config.kdl")
    }

    /// Write the configuration file.
    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.config_path();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Get a Command for the thermogate binary using this environment's config.
    pub fn tg(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_thermogate"));
        cmd.current_dir(self.config_dir.path());
        cmd.env("TG_CONFIG", self.config_path());
        cmd.env("RUST_LOG", "warn");
        for var in ["TG_HOST", "TG_PORT", "TG_GATEWAY_URL", "TG_NOTIFY_URL", "TG_LOG_JSON"] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn path(&self) -> &Path {
        self.config_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_app(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
