//! Feature: kernel and initramfs selection.

use super::names;
use crate::config::BootOptions;
use crate::manifest::FetchManifest;
use crate::pipeline::{Feature, FeatureCtx};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vdlaunch_shared::errors::{VdError, VdResult};

/// Boot images the hypervisor is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImages {
    pub kernel: PathBuf,
    pub initrd: Option<PathBuf>,
}

/// Picks boot images from the build-artifact manifest, or from an explicit
/// kernel path in the configuration.
pub struct BootImagesFeature {
    options: BootOptions,
    manifest: Arc<FetchManifest>,
}

impl BootImagesFeature {
    pub fn new(options: BootOptions, manifest: Arc<FetchManifest>) -> Self {
        Self { options, manifest }
    }

    fn select_kernel(&self) -> VdResult<PathBuf> {
        if let Some(path) = &self.options.kernel_path {
            return Ok(path.clone());
        }
        let tracked = self.manifest.find_by_suffix(&self.options.kernel_suffix)?;
        Ok(self.manifest.resolve(tracked))
    }

    fn select_initrd(&self) -> VdResult<Option<PathBuf>> {
        let Some(suffix) = &self.options.initrd_suffix else {
            return Ok(None);
        };

        match self.manifest.find_by_suffix(suffix) {
            Ok(tracked) => Ok(Some(self.manifest.resolve(tracked))),
            Err(VdError::NotFound(_)) => {
                tracing::debug!(suffix = %suffix, "No initramfs tracked, booting without one");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

async fn ensure_file(path: &Path, what: &str) -> VdResult<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        VdError::NotFound(format!("{} {}: {}", what, path.display(), e))
    })?;

    if !metadata.is_file() {
        return Err(VdError::Feature(format!(
            "{} {} is not a regular file",
            what,
            path.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl Feature for BootImagesFeature {
    fn name(&self) -> &str {
        names::BOOT_IMAGES
    }

    fn enabled(&self) -> bool {
        self.options.enabled
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        let kernel = self.select_kernel()?;
        ensure_file(&kernel, "kernel").await?;

        let initrd = self.select_initrd()?;
        if let Some(initrd) = &initrd {
            ensure_file(initrd, "initramfs").await?;
        }

        tracing::info!(
            kernel = %kernel.display(),
            initrd = ?initrd.as_ref().map(|p| p.display().to_string()),
            "Selected boot images"
        );

        ctx.publish(names::BOOT_IMAGES, BootImages { kernel, initrd })?;
        Ok(())
    }
}
