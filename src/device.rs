//! # Device Detection
//!
//! Selects the compute device (CPU/GPU) for model inference, with fallback
//! to CPU when no accelerator is available. Detection runs once and is
//! cached for the life of the process.

use candle_core::Device;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Cached best available device
static BEST_DEVICE: OnceLock<Device> = OnceLock::new();

/// Device preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Pick the best available device
    #[default]
    Auto,
    /// Force CPU
    Cpu,
    /// CUDA GPU, falling back to CPU if unavailable
    Cuda,
    /// Metal GPU, falling back to CPU if unavailable
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            other => Err(format!("Unknown device preference: {}", other)),
        }
    }
}

/// Resolve a device from a preference.
pub fn get_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Auto => get_best_device(),
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => cuda_device().unwrap_or(Device::Cpu),
        DevicePreference::Metal => metal_device().unwrap_or(Device::Cpu),
    }
}

/// Resolve a device from a configuration string, defaulting to auto.
pub fn device_from_config(device_str: &str) -> Device {
    match device_str.parse::<DevicePreference>() {
        Ok(preference) => get_device(preference),
        Err(_) => {
            warn!("Invalid device preference '{}', using auto", device_str);
            get_best_device()
        }
    }
}

/// Best available device, detected once and cached.
pub fn get_best_device() -> Device {
    BEST_DEVICE.get_or_init(detect_best_device).clone()
}

fn detect_best_device() -> Device {
    if let Some(device) = cuda_device() {
        info!("Selected CUDA GPU for ML inference");
        return device;
    }

    if let Some(device) = metal_device() {
        info!("Selected Metal GPU for ML inference");
        return device;
    }

    info!("Using CPU for ML inference (no GPU acceleration available)");
    Device::Cpu
}

fn cuda_device() -> Option<Device> {
    match Device::new_cuda(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("CUDA not available: {}", e);
            None
        }
    }
}

fn metal_device() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("Metal not available: {}", e);
            None
        }
    }
}

/// Human-readable device label for health reporting.
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}
