//! Device discovery, selection and context management.
//!
//! Enumeration is turned into plain [`DeviceCandidate`] records so the
//! selection policy ([`DeviceSelector`]) can be exercised without a GPU.
//! A wgpu backend (Vulkan, Metal, DX12, GL) plays the role of a platform.

use std::sync::Arc;
use tracing::{debug, error, info, trace};
use wgpu::{Adapter, DeviceDescriptor, Features, Instance};

use crate::{ConverterConfig, DeviceError, DeviceResult};

/// Device class as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    DiscreteGpu,
    IntegratedGpu,
    VirtualGpu,
    Cpu,
    Other,
}

impl DeviceKind {
    /// True for the GPU-class kinds.
    pub fn is_gpu(self) -> bool {
        self.gpu_rank().is_some()
    }

    /// Lower is better; `None` for non-GPU devices.
    fn gpu_rank(self) -> Option<u8> {
        match self {
            Self::DiscreteGpu => Some(0),
            Self::IntegratedGpu => Some(1),
            Self::VirtualGpu => Some(2),
            Self::Cpu | Self::Other => None,
        }
    }
}

impl From<wgpu::DeviceType> for DeviceKind {
    fn from(ty: wgpu::DeviceType) -> Self {
        match ty {
            wgpu::DeviceType::DiscreteGpu => Self::DiscreteGpu,
            wgpu::DeviceType::IntegratedGpu => Self::IntegratedGpu,
            wgpu::DeviceType::VirtualGpu => Self::VirtualGpu,
            wgpu::DeviceType::Cpu => Self::Cpu,
            wgpu::DeviceType::Other => Self::Other,
        }
    }
}

/// One enumerated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    /// Position in enumeration order.
    pub index: usize,
    /// Driver-reported name.
    pub name: String,
    pub kind: DeviceKind,
    /// Platform the device was found on (wgpu backend name).
    pub platform: String,
}

impl DeviceCandidate {
    fn from_adapter(index: usize, adapter: &Adapter) -> Self {
        let info = adapter.get_info();
        Self {
            index,
            name: info.name,
            kind: info.device_type.into(),
            platform: format!("{:?}", info.backend),
        }
    }
}

/// Device selection policy.
pub trait DeviceSelector {
    /// Returns the `index` of the chosen candidate.
    fn select(&self, candidates: &[DeviceCandidate]) -> Option<usize>;

    /// Policy description for error messages.
    fn describe(&self) -> String;
}

/// Picks the best GPU on the first platform that has one.
///
/// Discrete beats integrated beats virtual; ties go to the lower index.
/// With `allow_fallback`, a machine without any GPU gets its first device.
#[derive(Debug, Clone, Copy)]
pub struct PreferGpu {
    pub allow_fallback: bool,
}

impl Default for PreferGpu {
    fn default() -> Self {
        Self { allow_fallback: true }
    }
}

impl DeviceSelector for PreferGpu {
    fn select(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        let mut platforms: Vec<&str> = Vec::new();
        for c in candidates {
            if !platforms.contains(&c.platform.as_str()) {
                platforms.push(&c.platform);
            }
        }

        for platform in platforms {
            let best = candidates
                .iter()
                .filter(|c| c.platform == platform)
                .filter_map(|c| c.kind.gpu_rank().map(|rank| (rank, c.index)))
                .min();
            if let Some((_, index)) = best {
                return Some(index);
            }
        }

        if self.allow_fallback {
            candidates.first().map(|c| c.index)
        } else {
            None
        }
    }

    fn describe(&self) -> String {
        if self.allow_fallback {
            "prefer GPU, fall back to any device".into()
        } else {
            "GPU only".into()
        }
    }
}

/// Picks the device at a fixed enumeration index.
#[derive(Debug, Clone, Copy)]
pub struct ExactIndex(pub usize);

impl DeviceSelector for ExactIndex {
    fn select(&self, candidates: &[DeviceCandidate]) -> Option<usize> {
        candidates.iter().find(|c| c.index == self.0).map(|c| c.index)
    }

    fn describe(&self) -> String {
        format!("device index {}", self.0)
    }
}

/// Builds the selector implied by a config.
pub fn selector_for(config: &ConverterConfig) -> Box<dyn DeviceSelector> {
    match config.device_index {
        Some(index) => Box::new(ExactIndex(index)),
        None => Box::new(PreferGpu {
            allow_fallback: config.allow_fallback,
        }),
    }
}

/// Applies a selector to an enumeration.
pub fn choose_device(
    candidates: &[DeviceCandidate],
    selector: &dyn DeviceSelector,
) -> DeviceResult<usize> {
    if candidates.is_empty() {
        return Err(DeviceError::NoPlatformFound);
    }
    selector
        .select(candidates)
        .ok_or_else(|| DeviceError::NoDeviceFound(selector.describe()))
}

fn create_instance() -> Instance {
    Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    })
}

/// Enumerates all devices on all platforms.
pub fn list_devices() -> Vec<DeviceCandidate> {
    let instance = create_instance();
    instance
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .enumerate()
        .map(|(i, adapter)| DeviceCandidate::from_adapter(i, adapter))
        .collect()
}

/// Selected device with its queue.
///
/// Driver resources are released when the context drops.
pub struct GpuContext {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl GpuContext {
    /// Create a context using the selection policy from `config`.
    pub fn create(config: &ConverterConfig) -> DeviceResult<Self> {
        let selector = selector_for(config);
        Self::with_selector(selector.as_ref())
    }

    /// Create a context with an explicit selector.
    pub fn with_selector(selector: &dyn DeviceSelector) -> DeviceResult<Self> {
        pollster::block_on(Self::new_async(selector))
    }

    async fn new_async(selector: &dyn DeviceSelector) -> DeviceResult<Self> {
        let instance = create_instance();
        let adapters = instance.enumerate_adapters(wgpu::Backends::all());

        let candidates: Vec<DeviceCandidate> = adapters
            .iter()
            .enumerate()
            .map(|(i, adapter)| DeviceCandidate::from_adapter(i, adapter))
            .collect();
        for c in &candidates {
            debug!(index = c.index, name = %c.name, kind = ?c.kind, platform = %c.platform, "Found device");
        }

        let chosen = choose_device(&candidates, selector)?;
        let adapter = adapters
            .into_iter()
            .nth(chosen)
            .ok_or_else(|| DeviceError::NoDeviceFound(selector.describe()))?;

        let adapter_info = adapter.get_info();
        let adapter_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("luma-gpu"),
                    required_features: Features::empty(),
                    required_limits: adapter_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| DeviceError::ContextCreationFailed(e.to_string()))?;

        // Errors outside an error scope must not panic mid-batch.
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            error!(error = %err, "Uncaptured device error");
        }));

        info!(
            device = %adapter_info.name,
            backend = ?adapter_info.backend,
            kind = ?adapter_info.device_type,
            "Device context created"
        );

        let limits = device.limits();
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            limits,
        })
    }

    /// Get adapter info (GPU name, vendor, etc.)
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Get device name
    pub fn device_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Device class.
    pub fn kind(&self) -> DeviceKind {
        self.adapter_info.device_type.into()
    }

    /// Limits granted to the device.
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        trace!(device = %self.adapter_info.name, "Releasing device context");
    }
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext")
            .field("device", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .finish()
    }
}

/// Runs `f` inside out-of-memory and validation error scopes and returns the
/// first captured error instead of letting it reach the uncaptured handler.
pub(crate) fn capture_errors<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> Result<T, wgpu::Error> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match oom.or(validation) {
        Some(err) => Err(err),
        None => Ok(value),
    }
}
