use std::marker::PhantomData;

use log::warn;

/// Tags a [`Guard`] with the slice it restores, purely for log messages.
pub trait GuardKind {
    const LABEL: &'static str;
}

pub struct TopologyKind;
impl GuardKind for TopologyKind {
    const LABEL: &'static str = "topology";
}

pub struct HdrKind;
impl GuardKind for HdrKind {
    const LABEL: &'static str = "HDR state";
}

pub struct DisplayModeKind;
impl GuardKind for DisplayModeKind {
    const LABEL: &'static str = "display mode";
}

pub struct PrimaryKind;
impl GuardKind for PrimaryKind {
    const LABEL: &'static str = "primary device";
}

pub struct AudioKind;
impl GuardKind for AudioKind {
    const LABEL: &'static str = "audio context";
}

/// A value that owns an undo operation and runs it on scope exit unless
/// [`Guard::dismiss`] is called first. The restore closure reports whether it
/// succeeded; failure is logged but never propagated, since destructors are
/// infallible by contract.
pub struct Guard<K: GuardKind> {
    restore: Option<Box<dyn FnOnce() -> bool + Send>>,
    _kind: PhantomData<K>,
}

impl<K: GuardKind> Guard<K> {
    pub fn new(restore: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self { restore: Some(Box::new(restore)), _kind: PhantomData }
    }

    /// Cancels the undo — called once the transaction reaches its commit point.
    pub fn dismiss(mut self) {
        self.restore = None;
    }
}

impl<K: GuardKind> Drop for Guard<K> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            if !restore() {
                warn!("failed to restore {} while unwinding a transaction", K::LABEL);
            }
        }
    }
}

pub type TopologyGuard = Guard<TopologyKind>;
pub type HdrStateGuard = Guard<HdrKind>;
pub type DisplayModeGuard = Guard<DisplayModeKind>;
pub type PrimaryDeviceGuard = Guard<PrimaryKind>;
pub type AudioContextGuard = Guard<AudioKind>;
