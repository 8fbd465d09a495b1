use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tokio::sync::RwLock;

use crate::apps::fuzzy::partial_ratio;
use crate::apps::traits::{AppDirectory, AppInfo};
use crate::device::{DeviceBridge, PackageFilter};
use crate::errors::DroidClawResult;

/// Vendor and platform packages that are never worth offering to the oracle.
const IGNORED_PREFIXES: &[&str] = &[
    "com.android.",
    "com.google.android.inputmethod",
    "com.google.android.gms",
    "com.google.android.gsf",
    "com.google.android.providers",
    "com.google.android.ext.",
    "com.google.android.onetimeinitializer",
    "com.google.android.configupdater",
    "com.google.android.partnersetup",
    "com.google.android.printservice",
    "com.google.android.syncadapters",
    "com.google.android.feedback",
    "com.google.android.backuptransport",
    "com.samsung.",
    "com.sec.",
    "com.qualcomm.",
    "com.mediatek.",
    "org.codeaurora.",
];

/// System packages that users do open by name.
const USEFUL_SYSTEM_APPS: &[&str] = &[
    "com.google.android.youtube",
    "com.google.android.apps.maps",
    "com.google.android.apps.photos",
    "com.google.android.gm",
    "com.google.android.apps.docs",
    "com.google.android.calendar",
    "com.google.android.contacts",
    "com.google.android.dialer",
    "com.google.android.apps.messaging",
];

const KNOWN_APPS: &[(&str, &str)] = &[
    ("com.whatsapp", "WhatsApp"),
    ("com.instagram.android", "Instagram"),
    ("com.facebook.katana", "Facebook"),
    ("com.facebook.orca", "Messenger"),
    ("com.twitter.android", "Twitter"),
    ("com.spotify.music", "Spotify"),
    ("com.netflix.mediaclient", "Netflix"),
    ("com.google.android.youtube", "YouTube"),
    ("com.snapchat.android", "Snapchat"),
    ("com.zhiliaoapp.musically", "TikTok"),
    ("com.reddit.frontpage", "Reddit"),
    ("com.linkedin.android", "LinkedIn"),
    ("com.pinterest", "Pinterest"),
    ("com.discord", "Discord"),
    ("com.slack", "Slack"),
    ("org.telegram.messenger", "Telegram"),
    ("com.viber.voip", "Viber"),
    ("com.skype.raider", "Skype"),
    ("com.amazon.mShop.android.shopping", "Amazon"),
    ("com.ebay.mobile", "eBay"),
    ("com.ubercab", "Uber"),
    ("com.lyft.android", "Lyft"),
    ("com.airbnb.android", "Airbnb"),
    ("com.booking", "Booking.com"),
    ("com.google.android.apps.maps", "Google Maps"),
    ("com.waze", "Waze"),
    ("com.google.android.apps.photos", "Google Photos"),
    ("com.google.android.gm", "Gmail"),
    ("com.google.android.apps.docs", "Google Drive"),
    ("com.microsoft.office.outlook", "Outlook"),
    ("com.microsoft.teams", "Microsoft Teams"),
    ("com.dropbox.android", "Dropbox"),
    ("com.evernote", "Evernote"),
    ("com.todoist", "Todoist"),
    ("com.notion.id", "Notion"),
    ("com.duolingo", "Duolingo"),
    ("com.calm.android", "Calm"),
    ("com.headspace.android", "Headspace"),
    ("com.strava", "Strava"),
    ("com.nike.plusgps", "Nike Run Club"),
    ("com.fitbit.FitbitMobile", "Fitbit"),
    ("com.paypal.android.p2pmobile", "PayPal"),
    ("com.venmo", "Venmo"),
    ("com.robinhood.android", "Robinhood"),
    ("com.coinbase.android", "Coinbase"),
];

const GENERIC_SEGMENTS: &[&str] = &["android", "app", "apps", "mobile", "client"];

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("camel-case regex"));

/// Cached, searchable list of the device's launchable apps.
pub struct AppLibrary {
    device: Arc<dyn DeviceBridge>,
    apps: RwLock<Vec<AppInfo>>,
    /// package → launcher label. Grows as labels are fetched from the device.
    labels: RwLock<HashMap<String, String>>,
    /// Where `labels` is persisted between sessions.
    cache_path: Option<PathBuf>,
}

impl AppLibrary {
    pub fn new(device: Arc<dyn DeviceBridge>) -> Self {
        Self {
            device,
            apps: RwLock::new(Vec::new()),
            labels: RwLock::new(HashMap::new()),
            cache_path: None,
        }
    }

    /// Keeps launcher labels in `<cache_dir>/droidclaw/app_labels.json`.
    pub fn with_label_cache(self) -> Self {
        match label_cache_path() {
            Some(path) => self.with_label_cache_at(path),
            None => self,
        }
    }

    /// Loads labels already cached at `path` and saves newly fetched ones there.
    pub fn with_label_cache_at(mut self, path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(labels) => {
                    tracing::debug!(path = %path.display(), labels = labels.len(), "app label cache loaded");
                    self.labels = RwLock::new(labels);
                }
                Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable app label cache: {e}"),
            },
            Err(_) => tracing::trace!(path = %path.display(), "no app label cache"),
        }
        self.cache_path = Some(path);
        self
    }

    /// Re-reads installed packages from the device, fetching labels for
    /// packages not seen before. Returns the number of apps kept.
    pub async fn refresh(&self) -> DroidClawResult<usize> {
        let mut packages: Vec<String> = self
            .device
            .list_packages(PackageFilter::ThirdParty)
            .await?
            .into_iter()
            .filter(|p| !should_ignore(p))
            .collect();

        match self.device.list_packages(PackageFilter::System).await {
            Ok(system) => {
                for pkg in system {
                    if USEFUL_SYSTEM_APPS.contains(&pkg.as_str()) && !packages.contains(&pkg) {
                        packages.push(pkg);
                    }
                }
            }
            Err(e) => tracing::warn!("system package listing failed: {e}"),
        }

        self.fetch_missing_labels(&packages).await;

        let labels = self.labels.read().await;
        let apps: Vec<AppInfo> = packages
            .into_iter()
            .map(|package| AppInfo {
                common_name: common_name(&package),
                display_name: labels.get(&package).cloned(),
                package,
            })
            .collect();
        drop(labels);

        let count = apps.len();
        *self.apps.write().await = apps;
        tracing::info!(apps = count, "app library refreshed");
        Ok(count)
    }

    async fn fetch_missing_labels(&self, packages: &[String]) {
        let missing: Vec<&String> = {
            let labels = self.labels.read().await;
            packages.iter().filter(|p| !labels.contains_key(*p)).collect()
        };
        if missing.is_empty() {
            return;
        }
        tracing::info!(new = missing.len(), cached = packages.len() - missing.len(), "fetching app labels");

        let mut fetched = 0usize;
        for package in missing {
            match self.device.app_label(package).await {
                Ok(Some(label)) => {
                    self.labels.write().await.insert(package.clone(), label);
                    fetched += 1;
                }
                Ok(None) => {}
                Err(e) => tracing::debug!(package = %package, "label lookup failed: {e}"),
            }
        }

        if fetched > 0 {
            tracing::info!(fetched, "app labels fetched");
            if let Err(e) = self.save_labels().await {
                tracing::warn!("app label cache not saved: {e}");
            }
        }
    }

    async fn save_labels(&self) -> DroidClawResult<()> {
        let Some(path) = self.cache_path.as_deref() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let raw = serde_json::to_string_pretty(&*self.labels.read().await)?;
        tokio::fs::write(path, raw).await?;
        tracing::debug!(path = %path.display(), "app label cache saved");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.apps.read().await.len()
    }

    pub async fn find_by_package(&self, package: &str) -> Option<AppInfo> {
        self.apps.read().await.iter().find(|a| a.package == package).cloned()
    }
}

#[async_trait]
impl AppDirectory for AppLibrary {
    async fn launch(&self, package: &str) -> bool {
        match self.device.launch_app(package).await {
            Ok(()) => {
                tracing::info!(package, "app launched");
                true
            }
            Err(e) => {
                tracing::warn!(package, "app launch failed: {e}");
                false
            }
        }
    }

    async fn fuzzy_search(&self, query: &str, threshold: u8) -> Vec<AppInfo> {
        let query = query.to_lowercase();
        let apps = self.apps.read().await;

        let mut scored: Vec<(u8, &AppInfo)> = apps
            .iter()
            .filter_map(|app| {
                let display = app
                    .display_name
                    .as_deref()
                    .map(|d| partial_ratio(&query, &d.to_lowercase()))
                    .unwrap_or(0);
                let common = partial_ratio(&query, &app.common_name.to_lowercase());
                let package = partial_ratio(&query, &app.package.to_lowercase());
                let best = display.max(common).max(package);
                (best >= threshold).then_some((best, app))
            })
            .collect();

        // Stable sort keeps library order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, app)| app.clone()).collect()
    }

    async fn summary(&self, max: usize) -> String {
        let apps = self.apps.read().await;
        if apps.is_empty() {
            return "No apps cached. The app library has not been refreshed yet.".to_string();
        }
        let mut lines: Vec<String> = apps
            .iter()
            .take(max)
            .map(|app| format!("- {}: {}", app.best_name(), app.package))
            .collect();
        if apps.len() > max {
            lines.push(format!("... and {} more apps", apps.len() - max));
        }
        lines.join("\n")
    }
}

fn should_ignore(package: &str) -> bool {
    IGNORED_PREFIXES.iter().any(|prefix| package.starts_with(prefix))
}

fn label_cache_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("droidclaw").join("app_labels.json"))
}

/// Human-readable name derived from a package id.
pub fn common_name(package: &str) -> String {
    if let Some((_, name)) = KNOWN_APPS.iter().find(|(p, _)| *p == package) {
        return (*name).to_string();
    }

    let parts: Vec<&str> = package.split('.').collect();
    if parts.len() >= 2 {
        let meaningful: Vec<&str> = parts[1..]
            .iter()
            .copied()
            .filter(|p| !GENERIC_SEGMENTS.contains(p))
            .collect();
        let picked = match meaningful.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => Some(*first),
        };
        if let Some(name) = picked {
            let spaced = CAMEL_BOUNDARY.replace_all(name, "$1 $2");
            return title_case(&spaced.replace(['_', '-'], " "));
        }
    }

    parts.last().map(|p| title_case(p)).unwrap_or_else(|| package.to_string())
}

/// Upper-cases the first letter of every alphabetic run, lower-cases the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    fn device_with_packages() -> Arc<FakeDevice> {
        Arc::new(FakeDevice::new().with_packages(
            &[
                "com.spotify.music",
                "com.android.chrome",
                "com.samsung.android.bixby",
                "org.example.weatherNow",
            ],
            &["com.google.android.gm", "com.android.settings"],
        ))
    }

    #[test]
    fn common_names() {
        assert_eq!(common_name("com.spotify.music"), "Spotify");
        assert_eq!(common_name("org.example.weatherNow"), "Example");
        assert_eq!(common_name("com.weatherNow.android"), "Weather Now");
        assert_eq!(common_name("net.my_tool"), "My Tool");
        assert_eq!(common_name("com.app"), "App");
        assert_eq!(common_name("single"), "Single");
    }

    #[tokio::test]
    async fn refresh_filters_and_adds_useful_system_apps() {
        let library = AppLibrary::new(device_with_packages());
        assert_eq!(library.refresh().await.unwrap(), 3);

        let gmail = library.find_by_package("com.google.android.gm").await.unwrap();
        assert_eq!(gmail.best_name(), "Gmail");
        assert!(library.find_by_package("com.android.chrome").await.is_none());
        assert!(library.find_by_package("com.samsung.android.bixby").await.is_none());
    }

    #[tokio::test]
    async fn fuzzy_search_ranks_best_first() {
        let library = AppLibrary::new(device_with_packages());
        library.refresh().await.unwrap();

        let hits = library.fuzzy_search("Spotify", 60).await;
        assert_eq!(hits[0].package, "com.spotify.music");

        assert!(library.fuzzy_search("zzzzqq", 60).await.is_empty());
    }

    #[tokio::test]
    async fn summary_truncates_with_trailer() {
        let library = AppLibrary::new(device_with_packages());
        assert!(library.summary(10).await.starts_with("No apps cached"));

        library.refresh().await.unwrap();
        let summary = library.summary(2).await;
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "- Spotify: com.spotify.music");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "... and 1 more apps");
    }

    #[tokio::test]
    async fn labels_are_fetched_once_and_cached_on_disk() {
        let cache = std::env::temp_dir()
            .join(format!("droidclaw-labels-{}", uuid::Uuid::new_v4()))
            .join("app_labels.json");
        let device = Arc::new(
            FakeDevice::new()
                .with_packages(&["com.spotify.music", "org.example.weatherNow"], &[])
                .with_labels(&[("org.example.weatherNow", "Weather Now Pro")]),
        );

        let library = AppLibrary::new(device.clone()).with_label_cache_at(cache.clone());
        library.refresh().await.unwrap();
        let weather = library.find_by_package("org.example.weatherNow").await.unwrap();
        assert_eq!(weather.display_name.as_deref(), Some("Weather Now Pro"));
        assert_eq!(library.fuzzy_search("weather now pro", 60).await[0].package, "org.example.weatherNow");

        let saved: HashMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&cache).unwrap()).unwrap();
        assert_eq!(saved.get("org.example.weatherNow").map(String::as_str), Some("Weather Now Pro"));

        // A later session reads the cache and only asks about unlabelled packages.
        let quiet = Arc::new(FakeDevice::new().with_packages(&["com.spotify.music", "org.example.weatherNow"], &[]));
        let reloaded = AppLibrary::new(quiet.clone()).with_label_cache_at(cache.clone());
        reloaded.refresh().await.unwrap();
        assert_eq!(quiet.label_lookups(), vec!["com.spotify.music".to_string()]);
        assert_eq!(
            reloaded.find_by_package("org.example.weatherNow").await.unwrap().best_name(),
            "Weather Now Pro"
        );

        std::fs::remove_dir_all(cache.parent().unwrap()).unwrap();
    }

    #[tokio::test]
    async fn launch_reports_device_outcome() {
        let device = device_with_packages();
        let library = AppLibrary::new(device.clone());
        assert!(library.launch("com.spotify.music").await);
        assert_eq!(device.commands(), vec!["launch com.spotify.music".to_string()]);

        let broken = AppLibrary::new(Arc::new(FakeDevice::new().with_failing_input()));
        assert!(!broken.launch("com.spotify.music").await);
    }
}
