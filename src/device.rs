//! Narrow collaborator interfaces a payload type may optionally
//! implement so the buffer can copy it to a device or pin its host
//! memory before handing it to the caller. Types that implement
//! neither trait simply pass through unchanged, mirroring the
//! `hasattr(output, "pin_memory")` duck-typing check in the reference
//! implementation.

/// A logical device identifier a payload may report it lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Device {
    /// Host memory.
    Cpu,
    /// An accelerator device, identified by an opaque index.
    Other(u32),
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

/// Implemented by payloads that know which device they live on.
pub trait HasDevice {
    /// The device this value currently lives on.
    fn device(&self) -> Device;
}

/// Implemented by payloads that can allocate a pinned (page-locked)
/// host-memory copy of themselves for faster device transfer.
///
/// The default blanket behavior for types that don't implement this
/// trait is a no-op pass-through; callers opt in by implementing it.
pub trait Pinnable: Sized {
    /// Return a pinned copy of `self`. Fails with
    /// [`crate::error::ReplayError::BackendFailure`] if the underlying
    /// allocator cannot satisfy the pinning request.
    fn pin_memory(self) -> crate::error::Result<Self>;
}

/// Applies [`Pinnable::pin_memory`] when `pin` is set and the payload
/// lives on [`Device::Cpu`] (pinning a device-resident value is a
/// no-op, matching `_pin_memory`'s `device == torch.device("cpu")`
/// guard in the reference implementation); otherwise returns the value
/// unchanged.
pub fn maybe_pin<T>(value: T, pin: bool) -> crate::error::Result<T>
where
    T: Pinnable + HasDevice,
{
    if pin && value.device() == Device::Cpu {
        value.pin_memory()
    } else {
        Ok(value)
    }
}

// Importance-sampling weights always live on the host; pinning them is
// a cheap no-op since this crate has no real accelerator backend of its
// own — downstream tensor wrappers implement these traits themselves
// for their own device-resident types.
impl HasDevice for Vec<f64> {
    fn device(&self) -> Device {
        Device::Cpu
    }
}

impl Pinnable for Vec<f64> {
    fn pin_memory(self) -> crate::error::Result<Self> {
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cpu32(Vec<f32>);

    impl HasDevice for Cpu32 {
        fn device(&self) -> Device {
            Device::Cpu
        }
    }

    impl Pinnable for Cpu32 {
        fn pin_memory(mut self) -> crate::error::Result<Self> {
            self.0.push(f32::NAN); // marker so tests can observe pinning ran
            Ok(self)
        }
    }

    #[test]
    fn maybe_pin_runs_pinning_when_requested() {
        let v = Cpu32(vec![1.0, 2.0]);
        let pinned = maybe_pin(v, true).unwrap();
        assert_eq!(pinned.0.len(), 3);
    }

    #[test]
    fn maybe_pin_is_noop_when_disabled() {
        let v = Cpu32(vec![1.0, 2.0]);
        let same = maybe_pin(v, false).unwrap();
        assert_eq!(same.0.len(), 2);
    }
}
