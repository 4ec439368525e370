//! Layer-slot routing across the overlay components of a chain.
//!
//! Planes are numbered globally per pipeline. The first component of the chain owns the first
//! `layer_nr` slots, and every overlay component that directly follows it owns the next block.
//! Lookup is a prefix-sum search rather than per-component special casing.

use std::sync::Arc;

use ddp_hw::{DdpCompId, DdpCompType, DdpComponent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerRoute {
    pub comp: DdpCompId,
    /// Slot index within `comp`.
    pub local: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerRouting {
    comps: Vec<DdpCompId>,
    /// Exclusive end of each component's global slot range.
    ends: Vec<u32>,
}

impl LayerRouting {
    pub fn new(entries: impl IntoIterator<Item = (DdpCompId, u32)>) -> Self {
        let mut comps = Vec::new();
        let mut ends = Vec::new();
        let mut total = 0u32;
        for (comp, capacity) in entries {
            total += capacity;
            comps.push(comp);
            ends.push(total);
        }
        Self { comps, ends }
    }

    /// Builds the routing for a component chain: the head component plus the run of overlay
    /// components immediately after it.
    pub fn from_chain(chain: &[Arc<dyn DdpComponent>]) -> Self {
        let Some((head, rest)) = chain.split_first() else {
            return Self::default();
        };
        let overlays = rest
            .iter()
            .take_while(|comp| comp.id().comp_type() == DdpCompType::Ovl);
        Self::new(
            std::iter::once(head)
                .chain(overlays)
                .map(|comp| (comp.id(), comp.layer_nr())),
        )
    }

    pub fn layer_nr(&self) -> u32 {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn route(&self, layer: u32) -> Option<LayerRoute> {
        let idx = self.ends.partition_point(|&end| end <= layer);
        let comp = *self.comps.get(idx)?;
        let start = idx.checked_sub(1).map_or(0, |prev| self.ends[prev]);
        Some(LayerRoute {
            comp,
            local: layer - start,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaneType {
    Primary,
    Cursor,
    Overlay,
}

impl PlaneType {
    pub fn for_zpos(zpos: u32) -> Self {
        match zpos {
            0 => PlaneType::Primary,
            1 => PlaneType::Cursor,
            _ => PlaneType::Overlay,
        }
    }
}
