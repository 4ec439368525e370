use std::sync::Arc;

use crate::comp::DdpCompId;
use crate::error::HwError;

/// Raw hardware operations on one display mutex instance.
///
/// The mutex gates synchronized start of every component registered to it. `acquire`/`release`
/// bracket a shadow-register update so the whole chain latches it atomically.
pub trait DispMutexHw: Send + Sync {
    fn pipe(&self) -> u32;

    /// Ungates the mutex block's own clock.
    fn prepare(&self) -> Result<(), HwError>;

    fn unprepare(&self);

    fn add_comp(&self, comp: DdpCompId);

    fn remove_comp(&self, comp: DdpCompId);

    fn enable(&self);

    fn disable(&self);

    fn acquire(&self);

    fn release(&self);
}

pub trait DispMutexProvider: Send + Sync {
    fn get(&self, pipe: u32) -> Result<Arc<dyn DispMutexHw>, HwError>;

    fn put(&self, mutex: Arc<dyn DispMutexHw>);
}
