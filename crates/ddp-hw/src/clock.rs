use crate::comp::DdpCompId;
use crate::error::HwError;

/// Runtime power domains a pipeline holds references on while enabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PowerDomain {
    /// The display subsystem (mmsys) domain.
    Mmsys,
    /// The local arbiter (larb) serving a component's memory port.
    Larb(DdpCompId),
}

/// Clock and runtime-power provider.
///
/// Clocks are prepared once per pipeline lifetime and enabled per bring-up; power references are
/// counted. Every `*_get`/`prepare`/`enable` that succeeds must be balanced by its release.
pub trait ClockPower: Send + Sync {
    fn prepare(&self, comp: DdpCompId) -> Result<(), HwError>;

    fn unprepare(&self, comp: DdpCompId);

    fn enable(&self, comp: DdpCompId) -> Result<(), HwError>;

    fn disable(&self, comp: DdpCompId);

    fn runtime_get(&self, domain: PowerDomain) -> Result<(), HwError>;

    fn runtime_put(&self, domain: PowerDomain);
}
