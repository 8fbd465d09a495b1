use std::time::Duration;

use crate::config::DeviceConfig;
use crate::device::adb::{locate_aapt, run_adb, AdbBridge};
use crate::errors::{DroidClawError, DroidClawResult};

/// Discovers and connects a device over USB or TCP/IP.
pub struct AdbConnection {
    adb_path: String,
    timeout: Duration,
    wireless: Option<String>,
    serial: Option<String>,
    aapt_path: Option<String>,
}

impl AdbConnection {
    pub fn from_config(cfg: &DeviceConfig) -> Self {
        let wireless = if cfg.use_usb {
            None
        } else {
            cfg.ip.as_ref().map(|ip| format!("{ip}:{}", cfg.port))
        };
        Self {
            adb_path: cfg.adb_path.clone(),
            timeout: Duration::from_secs(cfg.command_timeout_secs),
            wireless,
            serial: cfg.serial.clone(),
            aapt_path: locate_aapt(cfg.aapt_path.as_deref()),
        }
    }

    /// Resolves the target serial and returns a bridge bound to it.
    pub async fn connect(&mut self) -> DroidClawResult<AdbBridge> {
        let serial = match (&self.serial, &self.wireless) {
            (Some(serial), _) => serial.clone(),
            (None, Some(address)) => {
                let address = address.clone();
                self.connect_wireless(&address).await?;
                address
            }
            (None, None) => self.find_usb_device().await?,
        };
        tracing::info!(serial = %serial, "device connected");
        self.serial = Some(serial.clone());
        if self.aapt_path.is_none() {
            tracing::debug!("no aapt found; app labels fall back to package-derived names");
        }
        Ok(AdbBridge::new(self.adb_path.clone(), serial, self.timeout).with_aapt(self.aapt_path.clone()))
    }

    async fn find_usb_device(&self) -> DroidClawResult<String> {
        let out = run_adb(&self.adb_path, &["devices"], self.timeout).await?;
        let listing = out.combined();
        first_ready_device(&listing)
            .ok_or_else(|| DroidClawError::Device(format!("no USB device found: {listing}")))
    }

    async fn connect_wireless(&self, address: &str) -> DroidClawResult<()> {
        // Drop any stale session first; failure here is expected when none exists.
        let _ = run_adb(&self.adb_path, &["disconnect", address], self.timeout).await;

        let out = run_adb(&self.adb_path, &["connect", address], self.timeout).await?;
        let text = out.combined();
        if connect_succeeded(&text) {
            Ok(())
        } else {
            Err(DroidClawError::Device(format!("failed to connect to {address}: {text}")))
        }
    }

    /// Switches a USB-attached device into TCP/IP mode on `port`.
    pub async fn setup_tcpip(&self, port: u16) -> DroidClawResult<()> {
        let port = port.to_string();
        let out = run_adb(&self.adb_path, &["tcpip", &port], self.timeout).await?;
        if !out.success {
            return Err(DroidClawError::Device(format!("failed to enable TCP/IP: {}", out.combined())));
        }
        tracing::info!(port = %port, "TCP/IP mode enabled");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(address) = self.wireless.as_deref() {
            if let Err(e) = run_adb(&self.adb_path, &["disconnect", address], self.timeout).await {
                tracing::warn!(error = %e, "adb disconnect failed");
            }
        }
        self.serial = None;
        tracing::info!("disconnected");
    }
}

/// First serial in `adb devices` output whose state is `device`.
pub fn first_ready_device(listing: &str) -> Option<String> {
    listing
        .lines()
        .skip_while(|l| !l.starts_with("List of devices"))
        .skip(1)
        .filter_map(|l| {
            let mut cols = l.split_whitespace();
            match (cols.next(), cols.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .next()
}

pub fn connect_succeeded(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("connected") && !lower.contains("cannot") && !lower.contains("failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_authorized_device() {
        let listing = "* daemon started successfully\nList of devices attached\nR58M123\tunauthorized\nemulator-5554\tdevice\n";
        assert_eq!(first_ready_device(listing).as_deref(), Some("emulator-5554"));
        assert_eq!(first_ready_device("List of devices attached\n"), None);
    }

    #[test]
    fn wireless_connect_output() {
        assert!(connect_succeeded("connected to 192.168.1.20:5555"));
        assert!(connect_succeeded("already connected to 192.168.1.20:5555"));
        assert!(!connect_succeeded("cannot connect to 192.168.1.20:5555: Connection refused"));
        assert!(!connect_succeeded("failed to connect to '192.168.1.20:5555': timed out"));
    }
}
