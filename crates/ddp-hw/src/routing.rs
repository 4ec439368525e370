use crate::comp::DdpCompId;

/// Inter-component routing links in the display subsystem's config block.
pub trait PathRouting: Send + Sync {
    fn add_comp_to_path(&self, cur: DdpCompId, next: DdpCompId);

    fn remove_comp_from_path(&self, cur: DdpCompId, next: DdpCompId);
}
