//! Telemetry façade
//!
//! [`Platform`] owns one shared channel and the per-subsystem caches. Build
//! one per process and hand out references; there are no global singletons.

use std::sync::Arc;
use wedgebmc_core::{BoardConfig, CacheConfig, DefaultBoard, FanStatus, PsuStatus, Result, ThermalStatus};

use crate::channel::ShellChannel;
use crate::fan::FanTrays;
use crate::psu::Psus;
use crate::thermal::Thermals;

/// Everything the BMC reports for one board
pub struct Platform<C: ShellChannel + ?Sized = dyn ShellChannel, B: BoardConfig = DefaultBoard> {
    channel: Arc<C>,
    fans: FanTrays<C, B>,
    thermals: Thermals<C, B>,
    psus: Psus<C, B>,
}

/// Point-in-time view of every subsystem
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PlatformSnapshot {
    pub board: &'static str,
    pub fans: Vec<FanStatus>,
    pub thermals: Vec<ThermalStatus>,
    pub psus: Vec<PsuStatus>,
}

impl<C: ShellChannel + ?Sized, B: BoardConfig> Platform<C, B> {
    pub fn new(channel: Arc<C>, cache: &CacheConfig) -> Self {
        Self {
            fans: FanTrays::new(channel.clone(), cache.fan_ttl()),
            thermals: Thermals::new(channel.clone()),
            psus: Psus::new(channel.clone(), cache.psu_ttl()),
            channel,
        }
    }

    pub fn name(&self) -> &'static str {
        B::NAME
    }

    /// The shared command channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn fans(&self) -> &FanTrays<C, B> {
        &self.fans
    }

    pub fn thermals(&self) -> &Thermals<C, B> {
        &self.thermals
    }

    pub fn psus(&self) -> &Psus<C, B> {
        &self.psus
    }

    pub fn snapshot(&self) -> Result<PlatformSnapshot> {
        Ok(PlatformSnapshot {
            board: B::NAME,
            fans: self.fans.statuses()?,
            thermals: self.thermals.statuses()?,
            psus: self.psus.statuses()?,
        })
    }
}
