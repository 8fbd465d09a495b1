use std::path::Path;

use crate::device::DeviceBridge;
use crate::errors::{DroidClawError, DroidClawResult};

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Captures the device screen and writes it as PNG to `path`. Returns the byte count.
pub async fn save_screenshot(device: &dyn DeviceBridge, path: &Path) -> DroidClawResult<usize> {
    let bytes = device.screenshot().await?;
    if !bytes.starts_with(PNG_MAGIC) {
        return Err(DroidClawError::Device("screencap did not return a PNG image".into()));
    }
    tokio::fs::write(path, &bytes).await?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "screenshot saved");
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDevice;

    #[tokio::test]
    async fn rejects_non_png_payload() {
        let device = FakeDevice::new().with_screenshot(b"not an image".to_vec());
        let path = std::env::temp_dir().join(format!("droidclaw-shot-{}.png", uuid::Uuid::new_v4()));
        let err = save_screenshot(&device, &path).await.unwrap_err();
        assert!(matches!(err, DroidClawError::Device(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn writes_png_bytes() {
        let mut png = PNG_MAGIC.to_vec();
        png.extend_from_slice(&[0u8; 16]);
        let device = FakeDevice::new().with_screenshot(png.clone());
        let path = std::env::temp_dir().join(format!("droidclaw-shot-{}.png", uuid::Uuid::new_v4()));
        assert_eq!(save_screenshot(&device, &path).await.unwrap(), png.len());
        assert_eq!(std::fs::read(&path).unwrap(), png);
        let _ = std::fs::remove_file(&path);
    }
}
