use candle_core::Device;
use signet_config::DeviceKind;
use tracing::{info, warn};

/// Resolve a configured device, falling back to CPU when CUDA is unavailable.
pub fn select_device(kind: DeviceKind) -> Device {
    match kind {
        DeviceKind::Cpu => Device::Cpu,
        DeviceKind::Cuda => match Device::cuda_if_available(0) {
            Ok(device) if device.is_cuda() => {
                info!("Using CUDA device 0");
                device
            }
            Ok(device) => {
                warn!("CUDA requested but not available, using CPU");
                device
            }
            Err(e) => {
                warn!(error = %e, "CUDA initialisation failed, using CPU");
                Device::Cpu
            }
        },
    }
}
