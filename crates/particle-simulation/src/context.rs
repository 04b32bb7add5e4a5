//! Device acquisition and device-loss tracking

use crate::SimulationError;
use std::sync::{Arc, Mutex};

/// Latches the first device-lost report so the frame loop can observe it.
#[derive(Clone, Debug, Default)]
pub struct DeviceLostFlag(Arc<Mutex<Option<String>>>);

impl DeviceLostFlag {
    fn set(&self, reason: String) {
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(reason);
        }
    }

    pub fn reason(&self) -> Option<String> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }

    /// `Err(DeviceLost)` once the device has been reported lost.
    pub fn check(&self) -> Result<(), SimulationError> {
        match self.reason() {
            Some(reason) => Err(SimulationError::DeviceLost { reason }),
            None => Ok(()),
        }
    }
}

/// Device, queue and loss flag shared by the simulation and whoever draws.
#[derive(Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    lost: DeviceLostFlag,
}

impl GpuContext {
    /// Acquire a device without a surface (tests, offline runs).
    pub async fn headless() -> Result<Self, SimulationError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;

        Self::from_adapter(&adapter).await
    }

    pub async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, SimulationError> {
        let adapter_info = adapter.get_info();
        log::info!("✓ Using GPU: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Simulation Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let lost = DeviceLostFlag::default();
        let flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                log::debug!("Device destroyed: {message}");
            } else {
                log::error!("Device lost ({reason:?}): {message}");
            }
            flag.set(format!("{reason:?}: {message}"));
        });

        Ok(Self {
            device,
            queue,
            adapter_info,
            lost,
        })
    }

    pub fn device_lost(&self) -> &DeviceLostFlag {
        &self.lost
    }
}
