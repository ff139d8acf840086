use std::fmt;

/// Errors that can occur during GPU context initialization.
#[derive(Debug)]
pub enum RenderContextError {
    /// No compatible GPU adapter found.
    AdapterRequest(wgpu::RequestAdapterError),
    /// GPU device request failed (limits or features not met).
    DeviceRequest(wgpu::RequestDeviceError),
}

impl fmt::Display for RenderContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdapterRequest(e) => {
                write!(f, "no compatible GPU adapter found: {e}")
            }
            Self::DeviceRequest(e) => write!(f, "device request failed: {e}"),
        }
    }
}

impl std::error::Error for RenderContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AdapterRequest(e) => Some(e),
            Self::DeviceRequest(e) => Some(e),
        }
    }
}

/// Owns the core wgpu resources: device and queue.
///
/// Effects render off-screen, so there is no presentation surface; the host
/// either lets [`headless`](Self::headless) pick an adapter or hands over the
/// device it already renders with.
#[derive(Debug)]
pub struct RenderContext {
    /// The wgpu logical device.
    pub device: wgpu::Device,
    /// The wgpu command queue.
    pub queue: wgpu::Queue,
    adapter: Option<wgpu::Adapter>,
}

impl RenderContext {
    /// Acquire a device and queue without a surface.
    ///
    /// # Errors
    ///
    /// Returns `RenderContextError` if the adapter or device request fails.
    pub async fn headless() -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                ..Default::default()
            })
            .await
            .map_err(RenderContextError::AdapterRequest)?;
        log::info!("using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("motionfx Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(RenderContextError::DeviceRequest)?;

        Ok(Self {
            device,
            queue,
            adapter: Some(adapter),
        })
    }

    /// Create a render context from an externally-owned device and queue.
    ///
    /// Without the adapter, format support is taken from the WebGPU
    /// guarantees; prefer [`from_adapter`](Self::from_adapter) on downlevel
    /// hardware.
    #[must_use]
    pub const fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            adapter: None,
        }
    }

    /// Create a render context from an externally-owned adapter, device and
    /// queue.
    #[must_use]
    pub const fn from_adapter(
        adapter: wgpu::Adapter,
        device: wgpu::Device,
        queue: wgpu::Queue,
    ) -> Self {
        Self {
            device,
            queue,
            adapter: Some(adapter),
        }
    }

    /// Usages and capabilities `format` supports on this device.
    #[must_use]
    pub fn format_features(
        &self,
        format: wgpu::TextureFormat,
    ) -> wgpu::TextureFormatFeatures {
        self.adapter.as_ref().map_or_else(
            || format.guaranteed_format_features(self.device.features()),
            |adapter| adapter.get_texture_format_features(format),
        )
    }

    /// Largest 2D texture dimension the device supports.
    #[must_use]
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Create a new command encoder for recording GPU commands.
    #[must_use]
    pub fn create_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Effect Encoder"),
            })
    }

    /// Finish the encoder and submit its command buffer to the GPU queue.
    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        let _ = self.queue.submit(std::iter::once(encoder.finish()));
    }
}
