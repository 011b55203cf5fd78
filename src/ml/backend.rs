// ============================================================
// Layer 5 — Backend Selection
// ============================================================
// `device.kind` picks the burn backend once, at startup:
//
//   cpu → Autodiff<NdArray>
//   gpu → Autodiff<Wgpu>
//
// Work that must run on the chosen backend implements
// `BackendTask`; `DeviceSettings::dispatch` monomorphises it.
//
// Key insight: model.valid() returns the model on
// B::InnerBackend with the same device, so inference never
// needs a second dispatch.

use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

pub type CpuBackend = Autodiff<NdArray>;
pub type GpuBackend = Autodiff<Wgpu>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// The resolved `device` group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub kind:  DeviceKind,
    #[serde(default)]
    pub index: usize,
}

pub trait BackendTask {
    type Output;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Self::Output;
}

impl DeviceSettings {
    pub fn dispatch<T: BackendTask>(&self, task: T) -> T::Output {
        match self.kind {
            DeviceKind::Cpu => {
                tracing::info!("Using NdArray CPU backend");
                task.run::<CpuBackend>(NdArrayDevice::Cpu)
            }
            DeviceKind::Gpu => {
                let device = self.wgpu_device();
                tracing::info!("Using WGPU device: {:?}", device);
                task.run::<GpuBackend>(device)
            }
        }
    }

    fn wgpu_device(&self) -> WgpuDevice {
        match self.index {
            0 => WgpuDevice::default(),
            i => WgpuDevice::DiscreteGpu(i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::backend::Backend;

    struct Name;

    impl BackendTask for Name {
        type Output = String;

        fn run<B: AutodiffBackend>(self, _device: B::Device) -> String {
            B::name()
        }
    }

    #[test]
    fn test_cpu_dispatch() {
        let settings: DeviceSettings = serde_json::from_value(serde_json::json!({"kind": "cpu"})).unwrap();
        assert_eq!(settings.kind, DeviceKind::Cpu);
        assert_eq!(settings.dispatch(Name), CpuBackend::name());
    }
}
