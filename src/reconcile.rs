//! Translating submitted requests into the minimal set of gateway mutations.
//!
//! Entity overrides follow a two-state machine, re-derived from the gateway on
//! every request:
//!
//! ```text
//! Standard      --set v != standing-->  Overridden(v)
//! Overridden(v) --set standing------->  Standard
//! Overridden(v) --disable------------>  Standard
//! Standard      --disable------------>  Standard   (no-op)
//! ```
//!
//! Requesting the standing mode as an override clears instead of setting, so
//! the "overridden" indicator never disagrees with the effective mode.
//!
//! The global system mode is a composite byte: primary mode in bits 0..=6 and
//! a suppression flag in bit 7. The gateway writes the two halves separately.

use crate::entity::EntityRef;
use crate::gateway::{EntityGateway, GatewayError};
use crate::{Error, Result};

/// Bits holding the primary system mode.
pub const PRIMARY_MASK: u8 = 0x7F;

/// Bit holding the suppression flag.
pub const SUPPRESS_BIT: u8 = 0x80;

/// Override part of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideRequest {
    pub requested_mode: i64,
    pub override_requested: bool,
}

/// The single override call to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePlan {
    Set(i64),
    Clear,
}

impl OverridePlan {
    fn operation(&self) -> &'static str {
        match self {
            OverridePlan::Set(_) => "set_override",
            OverridePlan::Clear => "clear_override",
        }
    }
}

/// Decide the override call for an entity whose standing mode is `standing_mode`.
pub fn reconcile_entity(standing_mode: i64, request: &OverrideRequest) -> OverridePlan {
    if !request.override_requested || request.requested_mode == standing_mode {
        OverridePlan::Clear
    } else {
        OverridePlan::Set(request.requested_mode)
    }
}

/// All mutations for one entity submission, in application order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationPlan {
    pub entity: EntityRef,
    /// Applied first, whenever the offset field validated.
    pub offset: Option<f64>,
    /// Applied second; `None` when overrides are disabled for the caller.
    pub override_plan: Option<OverridePlan>,
}

impl MutationPlan {
    /// Build the plan, reading the standing mode live when an override
    /// request is present.
    pub fn build(
        gateway: &dyn EntityGateway,
        entity: EntityRef,
        offset: Option<f64>,
        request: Option<OverrideRequest>,
    ) -> std::result::Result<Self, GatewayError> {
        let override_plan = match request {
            Some(request) if request.override_requested => {
                let standing = gateway.standing_mode(entity)?;
                Some(reconcile_entity(standing, &request))
            }
            // Disabling clears without consulting the standing mode.
            Some(_) => Some(OverridePlan::Clear),
            None => None,
        };
        Ok(Self {
            entity,
            offset,
            override_plan,
        })
    }

    /// Issue the mutations in order: offset, then the override call.
    ///
    /// A failure after the offset was written is a partial failure; nothing
    /// is rolled back.
    pub fn apply(&self, gateway: &dyn EntityGateway) -> Result<()> {
        if let Some(offset) = self.offset {
            gateway.set_offset(self.entity, offset)?;
        }

        let Some(plan) = self.override_plan else {
            return Ok(());
        };
        let outcome = match plan {
            OverridePlan::Set(mode) => gateway.set_override(self.entity, mode),
            OverridePlan::Clear => gateway.clear_override(self.entity),
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(source) if self.offset.is_some() => Err(Error::PartialMutationFailure {
                applied: "set_offset".to_string(),
                failed: plan.operation().to_string(),
                source,
            }),
            Err(source) => Err(source.into()),
        }
    }
}

/// Pack a primary mode and the suppression flag.
pub fn compose(primary: u8, suppress: bool) -> u8 {
    (primary & PRIMARY_MASK) | if suppress { SUPPRESS_BIT } else { 0 }
}

/// Split a composite into primary mode and suppression flag.
pub fn decompose(composite: u8) -> (u8, bool) {
    (composite & PRIMARY_MASK, composite & SUPPRESS_BIT != 0)
}

/// Validated system-mode submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemModeRequest {
    pub primary: u8,
    pub suppress: bool,
}

impl SystemModeRequest {
    /// Primary codes must fit in the low seven bits.
    pub fn new(code: i64, suppress: bool) -> Result<Self> {
        u8::try_from(code)
            .ok()
            .filter(|primary| *primary <= PRIMARY_MASK)
            .map(|primary| Self { primary, suppress })
            .ok_or_else(|| {
                Error::Validation(crate::forms::FormErrors::single(
                    "sysmode",
                    "mode code out of range",
                ))
            })
    }

    pub fn composite(&self) -> u8 {
        compose(self.primary, self.suppress)
    }

    /// Write the primary mode, then the suppress flag.
    ///
    /// Returns the composite on success. A failing second write after a
    /// successful first one is reported as a partial failure.
    pub fn apply(&self, gateway: &dyn EntityGateway) -> Result<u8> {
        gateway.set_system_mode(self.primary)?;
        gateway
            .set_suppress_flag(self.suppress)
            .map_err(|source| Error::PartialMutationFailure {
                applied: "set_system_mode".to_string(),
                failed: "set_suppress_flag".to_string(),
                source,
            })?;
        Ok(self.composite())
    }
}

/// Read the current composite system mode.
pub fn read_system_mode(gateway: &dyn EntityGateway) -> std::result::Result<u8, GatewayError> {
    let primary = gateway.system_mode()?;
    let suppress = gateway.suppress_flag()?;
    Ok(compose(primary, suppress))
}
