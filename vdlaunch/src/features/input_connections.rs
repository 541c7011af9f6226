//! Feature: virtual input device connections.
//!
//! Each configured device gets a connected socket pair: the host end stays
//! with the launcher (events are injected through it), the guest end is
//! handed to the hypervisor by descriptor number. An optional status socket
//! in the instance socket directory lets the guest report device state.

use super::display::DisplayConfig;
use super::names;
use crate::config::{InputDeviceKind, InputOptions};
use crate::layout::InstanceLayout;
use crate::pipeline::{Dependency, Feature, FeatureCtx};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use vdlaunch_shared::errors::{VdError, VdResult};

const STATUS_SOCKET: &str = "input_status.sock";

/// Guest-facing end of one input device connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEndpoint {
    pub kind: InputDeviceKind,
    pub guest_fd: RawFd,
    /// Touch surface size, for touchscreens when a display is configured.
    pub geometry: Option<(u32, u32)>,
}

/// Connection endpoints published for the hypervisor command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConnections {
    pub endpoints: Vec<InputEndpoint>,
    pub status_socket: Option<PathBuf>,
}

impl InputConnections {
    /// First endpoint of `kind`; use [`Self::all`] for touch surfaces.
    pub fn endpoint(&self, kind: InputDeviceKind) -> Option<&InputEndpoint> {
        self.endpoints.iter().find(|e| e.kind == kind)
    }

    /// Every endpoint of `kind`, in configuration order.
    pub fn all(&self, kind: InputDeviceKind) -> Vec<&InputEndpoint> {
        self.endpoints.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn touchscreens(&self) -> Vec<&InputEndpoint> {
        self.all(InputDeviceKind::Touchscreen)
    }

    pub fn touchpads(&self) -> Vec<&InputEndpoint> {
        self.all(InputDeviceKind::Touchpad)
    }
}

struct DeviceConnection {
    kind: InputDeviceKind,
    host: UnixStream,
    // Kept open until teardown; the hypervisor inherits it by descriptor.
    _guest: UnixStream,
}

struct HeldConnections {
    devices: Vec<DeviceConnection>,
    status: Option<(UnixListener, PathBuf)>,
}

pub struct InputConnectionsFeature {
    options: InputOptions,
    held: Mutex<Option<HeldConnections>>,
}

impl InputConnectionsFeature {
    pub fn new(options: InputOptions) -> Self {
        Self {
            options,
            held: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Feature for InputConnectionsFeature {
    fn name(&self) -> &str {
        names::INPUT_CONNECTIONS
    }

    fn enabled(&self) -> bool {
        self.options.enabled
    }

    fn dependencies(&self) -> Vec<Dependency> {
        vec![
            Dependency::required(names::INSTANCE_DIRS),
            Dependency::optional(names::DISPLAY),
        ]
    }

    async fn setup(&self, ctx: &FeatureCtx) -> VdResult<()> {
        let layout = ctx.lookup::<InstanceLayout>(names::INSTANCE_DIRS)?;
        let display = ctx.lookup_optional::<DisplayConfig>(names::DISPLAY)?;

        let mut devices = Vec::with_capacity(self.options.devices.len());
        let mut endpoints = Vec::with_capacity(self.options.devices.len());
        for &kind in &self.options.devices {
            let (host, guest) = UnixStream::pair().map_err(|e| {
                VdError::Feature(format!("Failed to create {} connection: {}", kind, e))
            })?;

            let geometry = match (kind, display.as_deref()) {
                (InputDeviceKind::Touchscreen, Some(display)) => {
                    Some((display.width, display.height))
                }
                _ => None,
            };

            endpoints.push(InputEndpoint {
                kind,
                guest_fd: guest.as_raw_fd(),
                geometry,
            });
            devices.push(DeviceConnection {
                kind,
                host,
                _guest: guest,
            });
        }

        let status = if self.options.status_channel {
            let path = layout.sockets_dir().join(STATUS_SOCKET);
            if path.exists() {
                return Err(VdError::Feature(format!(
                    "input status socket {} is already in use",
                    path.display()
                )));
            }
            let listener = UnixListener::bind(&path).map_err(|e| {
                VdError::Feature(format!(
                    "Failed to bind input status socket {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Some((listener, path))
        } else {
            None
        };

        let connections = InputConnections {
            endpoints,
            status_socket: status.as_ref().map(|(_, path)| path.clone()),
        };

        tracing::info!(
            devices = ?self.options.devices,
            status_socket = connections.status_socket.is_some(),
            "Created input connections"
        );

        if let Err(e) = ctx.publish(names::INPUT_CONNECTIONS, connections) {
            if let Some((_, path)) = &status {
                let _ = std::fs::remove_file(path);
            }
            return Err(e.into());
        }

        *self.held.lock() = Some(HeldConnections { devices, status });
        Ok(())
    }

    async fn teardown(&self) -> VdResult<()> {
        let Some(held) = self.held.lock().take() else {
            return Ok(());
        };

        let mut first_error = None;
        for device in &held.devices {
            if let Err(e) = device.host.shutdown(Shutdown::Both)
                && e.kind() != std::io::ErrorKind::NotConnected
            {
                tracing::warn!(device = %device.kind, error = %e, "Failed to close input connection");
                first_error.get_or_insert(VdError::Feature(format!(
                    "Failed to close {} connection: {}",
                    device.kind, e
                )));
            }
        }

        if let Some((listener, path)) = held.status {
            drop(listener);
            if let Err(e) = std::fs::remove_file(&path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                first_error.get_or_insert(VdError::Storage(format!(
                    "Failed to remove {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ProviderRegistry;
    use std::io::Read;
    use tempfile::TempDir;

    fn registry_with_layout(temp: &TempDir) -> (ProviderRegistry, InstanceLayout) {
        let layout = InstanceLayout::new(temp.path().join("cvd"));
        layout.prepare().unwrap();
        let registry = ProviderRegistry::new();
        registry
            .publish(names::INSTANCE_DIRS, names::INSTANCE_DIRS, layout.clone())
            .unwrap();
        (registry, layout)
    }

    #[tokio::test]
    async fn test_setup_publishes_endpoints() {
        let temp = TempDir::new().unwrap();
        let (registry, layout) = registry_with_layout(&temp);
        registry
            .publish(
                names::DISPLAY,
                names::DISPLAY,
                DisplayConfig {
                    width: 1080,
                    height: 1920,
                    dpi: 480,
                    refresh_rate_hz: 60,
                },
            )
            .unwrap();

        let feature = InputConnectionsFeature::new(InputOptions::default());
        let ctx = FeatureCtx::new(names::INPUT_CONNECTIONS, registry.clone());
        feature.setup(&ctx).await.unwrap();

        let connections = registry
            .lookup::<InputConnections>(names::INPUT_CONNECTIONS)
            .unwrap();
        assert_eq!(connections.endpoints.len(), 2);
        assert_eq!(
            connections
                .endpoint(InputDeviceKind::Touchscreen)
                .unwrap()
                .geometry,
            Some((1080, 1920))
        );
        assert_eq!(
            connections.endpoint(InputDeviceKind::Keyboard).unwrap().geometry,
            None
        );
        let status = connections.status_socket.clone().unwrap();
        assert_eq!(status, layout.sockets_dir().join(STATUS_SOCKET));
        assert!(status.exists());

        feature.teardown().await.unwrap();
        assert!(!status.exists());
    }

    #[tokio::test]
    async fn test_teardown_closes_host_end() {
        let temp = TempDir::new().unwrap();
        let (registry, _layout) = registry_with_layout(&temp);

        let feature = InputConnectionsFeature::new(InputOptions {
            enabled: true,
            devices: vec![InputDeviceKind::Rotary],
            status_channel: false,
        });
        let ctx = FeatureCtx::new(names::INPUT_CONNECTIONS, registry);
        feature.setup(&ctx).await.unwrap();

        let mut guest = {
            let held = feature.held.lock();
            held.as_ref().unwrap().devices[0]._guest.try_clone().unwrap()
        };

        feature.teardown().await.unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(guest.read(&mut buf).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_occupied_status_socket_fails_cleanly() {
        let temp = TempDir::new().unwrap();
        let (registry, layout) = registry_with_layout(&temp);
        std::fs::write(layout.sockets_dir().join(STATUS_SOCKET), b"").unwrap();

        let feature = InputConnectionsFeature::new(InputOptions::default());
        let ctx = FeatureCtx::new(names::INPUT_CONNECTIONS, registry.clone());

        let err = feature.setup(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
        assert!(feature.held.lock().is_none());
        assert!(!registry.contains(names::INPUT_CONNECTIONS));
    }

    #[tokio::test]
    async fn test_multiple_touch_surfaces() {
        let temp = TempDir::new().unwrap();
        let (registry, _layout) = registry_with_layout(&temp);

        let feature = InputConnectionsFeature::new(InputOptions {
            enabled: true,
            devices: vec![
                InputDeviceKind::Touchscreen,
                InputDeviceKind::Touchpad,
                InputDeviceKind::Touchscreen,
                InputDeviceKind::Switches,
                InputDeviceKind::Touchpad,
            ],
            status_channel: false,
        });
        let ctx = FeatureCtx::new(names::INPUT_CONNECTIONS, registry.clone());
        feature.setup(&ctx).await.unwrap();

        let connections = registry
            .lookup::<InputConnections>(names::INPUT_CONNECTIONS)
            .unwrap();
        let touchscreens = connections.touchscreens();
        assert_eq!(touchscreens.len(), 2);
        assert_ne!(touchscreens[0].guest_fd, touchscreens[1].guest_fd);
        assert_eq!(connections.touchpads().len(), 2);
        assert!(connections.touchpads().iter().all(|e| e.geometry.is_none()));
        assert!(connections.endpoint(InputDeviceKind::Switches).is_some());
        assert!(connections.endpoint(InputDeviceKind::Mouse).is_none());

        feature.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_without_setup_is_noop() {
        let feature = InputConnectionsFeature::new(InputOptions::default());
        feature.teardown().await.unwrap();
    }
}
