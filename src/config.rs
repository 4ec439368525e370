use std::collections::BTreeSet;

use ddp_crtc::{DdpCrtc, PlatformData};
use ddp_hw::{DdpCompId, DdpComponents, DdpResources};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Display description for one SoC: platform quirks plus the component path of every pipe.
///
/// ```json
/// {
///   "platform": { "shadow_register": true },
///   "pipes": [
///     { "pipe": 0, "path": ["ovl0", "rdma0", "color0", "aal0", "gamma", "dither", "dsi0"] },
///     { "pipe": 1, "path": ["ovl1", "rdma1", "dpi0"] }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayConfig {
    #[serde(default)]
    pub platform: PlatformData,
    #[serde(default)]
    pub pipes: Vec<PipeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipeConfig {
    pub pipe: u32,
    pub path: Vec<DdpCompId>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("pipe {0} is described more than once")]
    DuplicatePipe(u32),
    #[error("component {comp} is used by pipe {pipe} and pipe {other}")]
    SharedComponent { comp: DdpCompId, pipe: u32, other: u32 },
    #[error("pipe {pipe} lists {comp} more than once")]
    RepeatedComponent { pipe: u32, comp: DdpCompId },
}

impl DisplayConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// A component drives at most one position in one pipe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut pipes = BTreeSet::new();
        let mut owners: Vec<(DdpCompId, u32)> = Vec::new();
        for pipe in &self.pipes {
            if !pipes.insert(pipe.pipe) {
                return Err(ConfigError::DuplicatePipe(pipe.pipe));
            }
            let mut seen = BTreeSet::new();
            for &comp in &pipe.path {
                if !seen.insert(comp) {
                    return Err(ConfigError::RepeatedComponent {
                        pipe: pipe.pipe,
                        comp,
                    });
                }
                if let Some(&(_, other)) = owners.iter().find(|(c, _)| *c == comp) {
                    return Err(ConfigError::SharedComponent {
                        comp,
                        pipe: pipe.pipe,
                        other,
                    });
                }
                owners.push((comp, pipe.pipe));
            }
        }
        Ok(())
    }

    pub fn path(&self, pipe: u32) -> Option<&[DdpCompId]> {
        self.pipes
            .iter()
            .find(|p| p.pipe == pipe)
            .map(|p| p.path.as_slice())
    }

    /// Creates a pipeline for every described pipe whose components were all probed.
    ///
    /// Pipes with an empty or partially probed path are skipped. The first creation error aborts;
    /// pipelines created before it are dropped and release what they took.
    pub fn create_crtcs(
        &self,
        res: &DdpResources,
        comps: &DdpComponents,
    ) -> ddp_crtc::Result<Vec<DdpCrtc>> {
        let mut crtcs = Vec::with_capacity(self.pipes.len());
        for pipe in &self.pipes {
            match DdpCrtc::create(res, comps, &pipe.path, pipe.pipe, self.platform.clone())? {
                Some(crtc) => crtcs.push(crtc),
                None => debug!(pipe = pipe.pipe, "pipe skipped"),
            }
        }
        info!(
            described = self.pipes.len(),
            created = crtcs.len(),
            "display pipelines created"
        );
        Ok(crtcs)
    }
}
