//! In-process gateway holding entity state in memory.
//!
//! Behaves like the control daemon for the properties this crate touches:
//! overrides change the effective mode, clearing restores the standing mode,
//! unknown mode codes are rejected. Mutating calls are recorded so tests can
//! assert exactly what was issued, and individual operations can be made to
//! fail to exercise error paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{
    EntityGateway, FailureKind, GatewayError, GatewayResult, GatewayTarget, Setpoints,
};
use crate::entity::{EntityKind, EntityRef};

/// Highest run-mode code the simulated daemon accepts (manual).
const MAX_RUN_MODE: i64 = 6;

/// Highest primary system-mode code the simulated daemon accepts.
const MAX_SYSTEM_MODE: u8 = 6;

/// A mutating call, as recorded by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetOverride(EntityRef, i64),
    ClearOverride(EntityRef),
    SetOffset(EntityRef, f64),
    SetSystemMode(u8),
    SetSuppressFlag(bool),
}

#[derive(Debug, Clone)]
struct EntityState {
    name: String,
    standing_mode: i64,
    override_mode: Option<i64>,
    offset: f64,
    setpoints: Setpoints,
    has_ambient_sensor: bool,
}

#[derive(Debug, Default)]
struct State {
    entities: HashMap<EntityRef, EntityState>,
    system_mode: u8,
    suppress: bool,
    temperatures: BTreeMap<i64, f64>,
    failing: HashSet<&'static str>,
    calls: Vec<Call>,
}

/// Gateway backed by in-memory state.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<State>,
}

impl MemoryGateway {
    /// Create an empty gateway: no entities, system mode 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A small plant: two circuits, one tank, outdoor sensor 0, indoor sensor 1.
    pub fn demo() -> Self {
        let gateway = Self::new()
            .with_entity(EntityRef::new(EntityKind::Circuit, 0), "Ground floor", 1)
            .with_entity(EntityRef::new(EntityKind::Circuit, 1), "First floor", 1)
            .with_entity(EntityRef::new(EntityKind::Tank, 0), "Hot water", 1)
            .with_temperature(0, 7.5)
            .with_temperature(1, 20.5);
        {
            let mut state = gateway.lock();
            state.system_mode = 1;
            if let Some(tank) = state.entities.get_mut(&EntityRef::new(EntityKind::Tank, 0)) {
                tank.has_ambient_sensor = false;
                tank.setpoints = Setpoints {
                    comfort: 55.0,
                    eco: 45.0,
                    frost: 10.0,
                    target: 55.0,
                    current: 52.0,
                };
            }
        }
        gateway
    }

    /// Add an entity with the given standing mode and no override.
    pub fn with_entity(self, entity: EntityRef, name: &str, standing_mode: i64) -> Self {
        self.lock().entities.insert(
            entity,
            EntityState {
                name: name.to_string(),
                standing_mode,
                override_mode: None,
                offset: 0.0,
                setpoints: Setpoints {
                    comfort: 20.0,
                    eco: 17.0,
                    frost: 7.0,
                    target: 20.0,
                    current: 19.5,
                },
                has_ambient_sensor: entity.kind == EntityKind::Circuit,
            },
        );
        self
    }

    pub fn with_temperature(self, sensor: i64, value: f64) -> Self {
        self.lock().temperatures.insert(sensor, value);
        self
    }

    pub fn with_system_mode(self, primary: u8, suppress: bool) -> Self {
        {
            let mut state = self.lock();
            state.system_mode = primary;
            state.suppress = suppress;
        }
        self
    }

    /// Make every call to `operation` fail as unavailable.
    pub fn fail_on(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    /// Let `operation` succeed again.
    pub fn recover(&self, operation: &'static str) {
        self.lock().failing.remove(operation);
    }

    /// Change the standing mode, as a schedule change on the daemon would.
    pub fn set_standing_mode(&self, entity: EntityRef, mode: i64) {
        if let Some(state) = self.lock().entities.get_mut(&entity) {
            state.standing_mode = mode;
        }
    }

    /// Mutating calls issued so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(
        state: &State,
        operation: &'static str,
        target: GatewayTarget,
    ) -> GatewayResult<()> {
        if state.failing.contains(operation) {
            return Err(GatewayError::new(
                operation,
                target,
                FailureKind::Unavailable("injected failure".to_string()),
            ));
        }
        Ok(())
    }

    fn read<T>(
        &self,
        operation: &'static str,
        entity: EntityRef,
        f: impl FnOnce(&EntityState) -> T,
    ) -> GatewayResult<T> {
        let state = self.lock();
        let target = GatewayTarget::Entity(entity);
        Self::check(&state, operation, target)?;
        state
            .entities
            .get(&entity)
            .map(f)
            .ok_or_else(|| no_such_entity(operation, entity))
    }

    fn write(
        &self,
        operation: &'static str,
        entity: EntityRef,
        call: Call,
        f: impl FnOnce(&mut EntityState) -> GatewayResult<()>,
    ) -> GatewayResult<()> {
        let mut state = self.lock();
        let target = GatewayTarget::Entity(entity);
        Self::check(&state, operation, target)?;
        let entity_state = state
            .entities
            .get_mut(&entity)
            .ok_or_else(|| no_such_entity(operation, entity))?;
        f(entity_state)?;
        state.calls.push(call);
        Ok(())
    }
}

fn no_such_entity(operation: &'static str, entity: EntityRef) -> GatewayError {
    GatewayError::new(
        operation,
        GatewayTarget::Entity(entity),
        FailureKind::Rejected("no such entity".to_string()),
    )
}

impl EntityGateway for MemoryGateway {
    fn name(&self, entity: EntityRef) -> GatewayResult<String> {
        self.read("name", entity, |e| e.name.clone())
    }

    fn standing_mode(&self, entity: EntityRef) -> GatewayResult<i64> {
        self.read("standing_mode", entity, |e| e.standing_mode)
    }

    fn current_mode(&self, entity: EntityRef) -> GatewayResult<i64> {
        self.read("current_mode", entity, |e| {
            e.override_mode.unwrap_or(e.standing_mode)
        })
    }

    fn override_active(&self, entity: EntityRef) -> GatewayResult<bool> {
        self.read("override_active", entity, |e| e.override_mode.is_some())
    }

    fn set_override(&self, entity: EntityRef, mode: i64) -> GatewayResult<()> {
        self.write(
            "set_override",
            entity,
            Call::SetOverride(entity, mode),
            |e| {
                if !(0..=MAX_RUN_MODE).contains(&mode) {
                    return Err(GatewayError::new(
                        "set_override",
                        GatewayTarget::Entity(entity),
                        FailureKind::Rejected(format!("invalid run mode {}", mode)),
                    ));
                }
                e.override_mode = Some(mode);
                Ok(())
            },
        )
    }

    fn clear_override(&self, entity: EntityRef) -> GatewayResult<()> {
        self.write("clear_override", entity, Call::ClearOverride(entity), |e| {
            e.override_mode = None;
            Ok(())
        })
    }

    fn offset(&self, entity: EntityRef) -> GatewayResult<f64> {
        self.read("offset", entity, |e| e.offset)
    }

    fn set_offset(&self, entity: EntityRef, offset: f64) -> GatewayResult<()> {
        self.write("set_offset", entity, Call::SetOffset(entity, offset), |e| {
            e.offset = offset;
            Ok(())
        })
    }

    fn setpoints(&self, entity: EntityRef) -> GatewayResult<Setpoints> {
        self.read("setpoints", entity, |e| e.setpoints)
    }

    fn has_ambient_sensor(&self, entity: EntityRef) -> GatewayResult<bool> {
        self.read("has_ambient_sensor", entity, |e| e.has_ambient_sensor)
    }

    fn system_mode(&self) -> GatewayResult<u8> {
        let state = self.lock();
        Self::check(&state, "system_mode", GatewayTarget::Runtime)?;
        Ok(state.system_mode)
    }

    fn set_system_mode(&self, primary: u8) -> GatewayResult<()> {
        let mut state = self.lock();
        Self::check(&state, "set_system_mode", GatewayTarget::Runtime)?;
        if primary > MAX_SYSTEM_MODE {
            return Err(GatewayError::new(
                "set_system_mode",
                GatewayTarget::Runtime,
                FailureKind::Rejected(format!("invalid system mode {}", primary)),
            ));
        }
        state.system_mode = primary;
        state.calls.push(Call::SetSystemMode(primary));
        Ok(())
    }

    fn suppress_flag(&self) -> GatewayResult<bool> {
        let state = self.lock();
        Self::check(&state, "suppress_flag", GatewayTarget::Runtime)?;
        Ok(state.suppress)
    }

    fn set_suppress_flag(&self, suppress: bool) -> GatewayResult<()> {
        let mut state = self.lock();
        Self::check(&state, "set_suppress_flag", GatewayTarget::Runtime)?;
        state.suppress = suppress;
        state.calls.push(Call::SetSuppressFlag(suppress));
        Ok(())
    }

    fn temperature(&self, sensor: i64) -> GatewayResult<f64> {
        let state = self.lock();
        let target = GatewayTarget::Sensor(sensor);
        Self::check(&state, "temperature", target)?;
        state.temperatures.get(&sensor).copied().ok_or_else(|| {
            GatewayError::new(
                "temperature",
                target,
                FailureKind::Rejected("no such sensor".to_string()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circuit() -> EntityRef {
        EntityRef::new(EntityKind::Circuit, 0)
    }

    #[test]
    fn test_override_changes_current_mode() {
        let gateway = MemoryGateway::new().with_entity(circuit(), "Living", 2);
        gateway.set_override(circuit(), 3).unwrap();
        assert_eq!(gateway.current_mode(circuit()).unwrap(), 3);
        assert!(gateway.override_active(circuit()).unwrap());
        assert_eq!(gateway.standing_mode(circuit()).unwrap(), 2);
    }

    #[test]
    fn test_clear_restores_standing_mode() {
        let gateway = MemoryGateway::new().with_entity(circuit(), "Living", 2);
        gateway.set_override(circuit(), 4).unwrap();
        gateway.clear_override(circuit()).unwrap();
        assert_eq!(gateway.current_mode(circuit()).unwrap(), 2);
        assert!(!gateway.override_active(circuit()).unwrap());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let gateway = MemoryGateway::new().with_entity(circuit(), "Living", 2);
        gateway.clear_override(circuit()).unwrap();
        gateway.clear_override(circuit()).unwrap();
        assert!(!gateway.override_active(circuit()).unwrap());
        assert_eq!(gateway.calls().len(), 2);
    }

    #[test]
    fn test_invalid_mode_rejected_and_not_recorded() {
        let gateway = MemoryGateway::new().with_entity(circuit(), "Living", 2);
        let err = gateway.set_override(circuit(), 42).unwrap_err();
        assert!(matches!(err.kind, FailureKind::Rejected(_)));
        assert!(gateway.calls().is_empty());
        assert!(!gateway.override_active(circuit()).unwrap());
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let gateway = MemoryGateway::new();
        let err = gateway.name(circuit()).unwrap_err();
        assert_eq!(err.operation, "name");
        assert_eq!(err.target, GatewayTarget::Entity(circuit()));
    }

    #[test]
    fn test_injected_failure_and_recovery() {
        let gateway = MemoryGateway::new().with_system_mode(2, false);
        gateway.fail_on("system_mode");
        let err = gateway.system_mode().unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(err.to_string(), "system_mode on runtime: service unavailable: injected failure");

        gateway.recover("system_mode");
        assert_eq!(gateway.system_mode().unwrap(), 2);
    }

    #[test]
    fn test_calls_recorded_in_order() {
        let gateway = MemoryGateway::new().with_entity(circuit(), "Living", 2);
        gateway.set_offset(circuit(), -1.5).unwrap();
        gateway.set_override(circuit(), 3).unwrap();
        gateway.set_system_mode(4).unwrap();
        gateway.set_suppress_flag(true).unwrap();
        assert_eq!(
            gateway.calls(),
            vec![
                Call::SetOffset(circuit(), -1.5),
                Call::SetOverride(circuit(), 3),
                Call::SetSystemMode(4),
                Call::SetSuppressFlag(true),
            ]
        );
    }

    #[test]
    fn test_demo_plant() {
        let gateway = MemoryGateway::demo();
        assert_eq!(gateway.temperature(0).unwrap(), 7.5);
        assert!(gateway.temperature(9).is_err());
        let tank = EntityRef::new(EntityKind::Tank, 0);
        assert!(!gateway.has_ambient_sensor(tank).unwrap());
        assert_eq!(gateway.setpoints(tank).unwrap().comfort, 55.0);
    }
}
