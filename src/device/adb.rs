//! `adb`-backed implementation of [`DeviceBridge`].
//!
//! Every command is a child process of the host `adb` binary, bounded by a
//! per-call timeout. Output parsing is kept in small pure helpers so it can be
//! tested without a device.
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::device::traits::{Button, DeviceBridge, PackageFilter};
use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::text_input;

const DUMP_PATH: &str = "/sdcard/window_dump.xml";

/// Delete presses sent after moving the cursor to the end of a field.
const CLEAR_DELETE_PRESSES: usize = 64;

static RESUMED_ACTIVITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:mResumedActivity|topResumedActivity|ResumedActivity)[^\n]*?\s([A-Za-z][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)+)/")
        .expect("resumed activity regex")
});

static WM_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").expect("wm size regex")
});

/// Raw result of one `adb` invocation.
#[derive(Debug)]
pub struct AdbOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl AdbOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }

    /// stdout and stderr joined, the way `adb` users read it.
    pub fn combined(&self) -> String {
        let out = self.stdout_text();
        let err = self.stderr.trim();
        match (out.is_empty(), err.is_empty()) {
            (_, true) => out,
            (true, false) => err.to_string(),
            (false, false) => format!("{out}\n{err}"),
        }
    }
}

/// Runs `adb <args>` with a timeout. Spawn failures and timeouts become `Device` errors.
pub async fn run_adb(adb_path: &str, args: &[&str], timeout: Duration) -> DroidClawResult<AdbOutput> {
    tracing::trace!(args = ?args, "adb");
    run_host_tool(adb_path, args, timeout, "Please install Android SDK Platform Tools.").await
}

async fn run_host_tool(program: &str, args: &[&str], timeout: Duration, install_hint: &str) -> DroidClawResult<AdbOutput> {
    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => Ok(AdbOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DroidClawError::Device(format!("'{program}' not found. {install_hint}")))
        }
        Ok(Err(e)) => Err(DroidClawError::Device(format!("failed to execute {program}: {e}"))),
        Err(_) => Err(DroidClawError::Device(format!(
            "{program} {} timed out after {}s",
            args.first().copied().unwrap_or_default(),
            timeout.as_secs()
        ))),
    }
}

/// Finds a host `aapt`: the configured path, then `PATH`, then the newest
/// build-tools of an SDK under `ANDROID_HOME`, `ANDROID_SDK_ROOT` or the
/// usual per-user install locations.
pub fn locate_aapt(configured: Option<&str>) -> Option<String> {
    if let Some(path) = configured.filter(|p| !p.trim().is_empty()) {
        return Some(path.to_string());
    }

    if let Some(found) = std::env::var_os("PATH")
        .iter()
        .flat_map(std::env::split_paths)
        .map(|dir| dir.join("aapt"))
        .find(|candidate| candidate.is_file())
    {
        return Some(found.to_string_lossy().into_owned());
    }

    let mut sdk_roots: Vec<PathBuf> = ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    if let Some(home) = dirs::home_dir() {
        sdk_roots.push(home.join("Library/Android/sdk"));
        sdk_roots.push(home.join("Android/Sdk"));
    }
    sdk_roots.push(PathBuf::from("/opt/homebrew/share/android-commandlinetools"));

    sdk_roots
        .iter()
        .find_map(|root| newest_build_tools_aapt(root))
        .map(|p| p.to_string_lossy().into_owned())
}

fn newest_build_tools_aapt(sdk_root: &Path) -> Option<PathBuf> {
    let mut versions: Vec<PathBuf> = std::fs::read_dir(sdk_root.join("build-tools"))
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    versions.sort();
    versions
        .into_iter()
        .rev()
        .map(|dir| dir.join("aapt"))
        .find(|candidate| candidate.is_file())
}

pub struct AdbBridge {
    adb_path: String,
    serial: String,
    timeout: Duration,
    /// Host `aapt`, needed to read launcher labels out of pulled APKs.
    aapt_path: Option<String>,
}

impl AdbBridge {
    pub fn new(adb_path: impl Into<String>, serial: impl Into<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.into(),
            timeout,
            aapt_path: None,
        }
    }

    pub fn with_aapt(mut self, aapt_path: Option<String>) -> Self {
        self.aapt_path = aapt_path;
        self
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    async fn exec(&self, args: &[&str]) -> DroidClawResult<Vec<u8>> {
        let mut full = vec!["-s", self.serial.as_str()];
        full.extend_from_slice(args);
        let output = run_adb(&self.adb_path, &full, self.timeout).await?;
        if !output.success {
            return Err(DroidClawError::Device(format!(
                "adb {} failed: {}",
                args.join(" "),
                output.combined()
            )));
        }
        Ok(output.stdout)
    }

    async fn shell(&self, args: &[&str]) -> DroidClawResult<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        let stdout = self.exec(&full).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    async fn badging_label(&self, aapt: &str, apk: &Path) -> DroidClawResult<Option<String>> {
        let apk = apk.to_string_lossy();
        let out = run_host_tool(aapt, &["dump", "badging", &apk], self.timeout, "Install the Android SDK build-tools.").await?;
        if !out.success {
            return Err(DroidClawError::Device(format!("aapt dump badging failed: {}", out.combined())));
        }
        Ok(parse_badging_label(&out.stdout_text()))
    }
}

#[async_trait]
impl DeviceBridge for AdbBridge {
    async fn dump_hierarchy(&self) -> DroidClawResult<String> {
        let out = self.shell(&["uiautomator", "dump", DUMP_PATH]).await?;
        if out.contains("ERROR") {
            return Err(DroidClawError::Device(format!("uiautomator dump failed: {out}")));
        }
        self.shell(&["cat", DUMP_PATH]).await
    }

    async fn window_dump(&self) -> DroidClawResult<String> {
        self.shell(&["dumpsys", "window", "windows"]).await
    }

    async fn current_package(&self) -> DroidClawResult<String> {
        let out = self.shell(&["dumpsys", "activity", "activities"]).await?;
        parse_resumed_package(&out)
            .ok_or_else(|| DroidClawError::Device("no resumed activity reported".into()))
    }

    async fn tap(&self, x: i32, y: i32) -> DroidClawResult<()> {
        let (x, y) = (x.to_string(), y.to_string());
        self.shell(&["input", "tap", &x, &y]).await.map(|_| ())
    }

    async fn swipe(&self, from: (i32, i32), to: (i32, i32), duration: Duration) -> DroidClawResult<()> {
        let coords = [from.0, from.1, to.0, to.1].map(|v| v.to_string());
        let ms = duration.as_millis().to_string();
        self.shell(&["input", "swipe", &coords[0], &coords[1], &coords[2], &coords[3], &ms])
            .await
            .map(|_| ())
    }

    async fn clear_text(&self) -> DroidClawResult<()> {
        self.shell(&["input", "keyevent", "KEYCODE_MOVE_END"]).await?;
        let mut args = vec!["input", "keyevent"];
        args.extend(std::iter::repeat("KEYCODE_DEL").take(CLEAR_DELETE_PRESSES));
        self.shell(&args).await.map(|_| ())
    }

    async fn send_text(&self, text: &str) -> DroidClawResult<()> {
        if text_input::needs_ime(text) {
            // `input text` only handles ASCII; route everything else through the ADB keyboard.
            let quoted = text_input::shell_quote(text);
            let out = self
                .shell(&["am", "broadcast", "-a", "ADB_INPUT_TEXT", "--es", "msg", &quoted])
                .await?;
            tracing::debug!(output = %out, "ime text broadcast");
            return Ok(());
        }
        let encoded = text_input::encode_input_text(text);
        self.shell(&["input", "text", &encoded]).await.map(|_| ())
    }

    async fn press(&self, button: Button) -> DroidClawResult<()> {
        self.shell(&["input", "keyevent", button.keycode()]).await.map(|_| ())
    }

    async fn launch_app(&self, package: &str) -> DroidClawResult<()> {
        let out = self
            .shell(&["monkey", "-p", package, "-c", "android.intent.category.LAUNCHER", "1"])
            .await?;
        if out.contains("No activities found") || out.contains("monkey aborted") {
            return Err(DroidClawError::Device(format!("no launchable activity in {package}")));
        }
        Ok(())
    }

    async fn screen_size(&self) -> DroidClawResult<(i32, i32)> {
        let out = self.shell(&["wm", "size"]).await?;
        parse_wm_size(&out).ok_or_else(|| DroidClawError::Device(format!("unexpected wm size output: {out}")))
    }

    async fn screenshot(&self) -> DroidClawResult<Vec<u8>> {
        self.exec(&["exec-out", "screencap", "-p"]).await
    }

    async fn list_packages(&self, filter: PackageFilter) -> DroidClawResult<Vec<String>> {
        let flag = match filter {
            PackageFilter::ThirdParty => "-3",
            PackageFilter::System => "-s",
        };
        let out = self.shell(&["cmd", "package", "list", "packages", flag]).await?;
        Ok(parse_package_list(&out))
    }

    async fn app_label(&self, package: &str) -> DroidClawResult<Option<String>> {
        let Some(aapt) = self.aapt_path.as_deref() else {
            return Ok(None);
        };
        let paths = self.shell(&["pm", "path", package]).await?;
        let Some(remote) = parse_package_list(&paths).into_iter().next() else {
            return Ok(None);
        };

        let local = std::env::temp_dir().join(format!("droidclaw-{}.apk", uuid::Uuid::new_v4()));
        let local_arg = local.to_string_lossy().into_owned();
        let label = match self.exec(&["pull", &remote, &local_arg]).await {
            Ok(_) => self.badging_label(aapt, &local).await,
            Err(e) => Err(e),
        };
        if let Err(e) = tokio::fs::remove_file(&local).await {
            tracing::trace!(path = %local.display(), "temporary apk not removed: {e}");
        }
        label
    }
}

/// Pulls the value of the `application-label:'…'` line out of `aapt dump badging`.
pub fn parse_badging_label(badging: &str) -> Option<String> {
    badging
        .lines()
        .find_map(|line| line.strip_prefix("application-label:"))
        .map(|raw| raw.trim().trim_matches(|c| c == '\'' || c == '"').to_string())
        .filter(|label| !label.is_empty())
}

/// Extracts the package of the resumed activity from `dumpsys activity activities`.
pub fn parse_resumed_package(dump: &str) -> Option<String> {
    RESUMED_ACTIVITY
        .captures(dump)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parses `wm size`; an override size wins over the physical one.
pub fn parse_wm_size(out: &str) -> Option<(i32, i32)> {
    let mut physical = None;
    let mut overridden = None;
    for caps in WM_SIZE.captures_iter(out) {
        let w = caps[2].parse().ok()?;
        let h = caps[3].parse().ok()?;
        if &caps[1] == "Override" {
            overridden = Some((w, h));
        } else {
            physical = Some((w, h));
        }
    }
    overridden.or(physical)
}

/// Parses `package:<name>` lines.
pub fn parse_package_list(out: &str) -> Vec<String> {
    out.lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}
