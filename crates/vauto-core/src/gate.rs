//! The capability gate guarding every world mutation.
//!
//! Nothing in the engine applies a mutation except inside a closure handed
//! to [`Gate::execute`]. The gate decides whether the closure runs at all
//! and passes it the capability it was granted; closures check
//! [`Capability::is_mutating`] before applying anything.
//!
//! [`PolicyGate`] is the default implementation. Hosts with their own
//! approval workflow implement [`Gate`] themselves.

use tracing::{info, warn};
use vauto_types::{AutomationResult, CallerId, Capability, CombatState, GateResult, Plan, PlanId, Zone};

/// Per-call context handed to the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateContext {
    /// Plan being executed.
    pub plan_id: PlanId,
    /// Who asked for the execution.
    pub caller: CallerId,
    /// Whether the plan runs with administrator privileges.
    pub is_admin: bool,
    /// Live combat state of the plan's region.
    pub combat_state: CombatState,
    /// Whether the plan is restricted to read-only execution.
    pub is_test_only: bool,
}

impl GateContext {
    /// Build a context from a plan's current live state.
    pub fn for_plan(plan: &Plan, caller: CallerId) -> Self {
        Self {
            plan_id: plan.plan_id.clone(),
            caller,
            is_admin: plan.live.is_admin,
            combat_state: plan.live.combat_state,
            is_test_only: plan.is_test_only,
        }
    }
}

/// Capability checkpoint consulted before any zone setup or mutation.
pub trait Gate: Send + Sync {
    /// Whether a zone's permission requirements are met for a plan.
    fn check_zone_gates(&self, zone: &Zone, plan: &Plan) -> GateResult;

    /// Run `action` under `capability` if the context allows it.
    ///
    /// A denied call returns a failed [`AutomationResult`] without running
    /// the closure.
    fn execute(
        &self,
        context: &GateContext,
        capability: Capability,
        action: &mut dyn FnMut(Capability) -> AutomationResult,
    ) -> AutomationResult;
}

/// Default gate policy.
///
/// Zone checks:
/// - developer approval requires an administrator
/// - snapshot zones require the combat state to be `Outside` or `Active`
/// - admin-only zones require an administrator
///
/// Execution checks:
/// - the caller id must be present and the plan id non-empty
/// - nothing runs while a snapshot is taken or restored
/// - test-only plans never receive a mutating capability
/// - in strict mode, mutating capabilities require an administrator
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyGate {
    strict: bool,
}

impl PolicyGate {
    /// The default, permissive policy.
    pub const fn new() -> Self {
        Self { strict: false }
    }

    /// A policy that also requires administrators for mutating capabilities.
    pub const fn strict() -> Self {
        Self { strict: true }
    }

    fn denial(&self, context: &GateContext, capability: Capability) -> Option<String> {
        if !context.caller.is_present() {
            return Some(String::from("Invalid caller id"));
        }
        if context.plan_id.is_blank() {
            return Some(String::from("Missing plan id"));
        }
        if context.combat_state.is_transitional() {
            return Some(String::from("Automation blocked during snapshot/restore"));
        }
        if context.is_test_only && capability.is_mutating() {
            return Some(format!(
                "Plan '{}' is test-only and cannot acquire {capability}",
                context.plan_id
            ));
        }
        if self.strict && capability.is_mutating() && !context.is_admin {
            return Some(format!("{capability} requires administrator privileges"));
        }
        None
    }
}

impl Gate for PolicyGate {
    fn check_zone_gates(&self, zone: &Zone, plan: &Plan) -> GateResult {
        let mut result = GateResult::pass();
        let name = zone.display_name();
        let permissions = zone.permissions;

        if permissions.requires_dev_approval && !plan.live.is_admin {
            result.passed = false;
            result.requires_dev_approval = true;
            result
                .messages
                .push(format!("Zone {name} requires developer approval"));
        }

        if permissions.requires_snapshot && !plan.live.combat_state.allows_snapshot_zones() {
            result.passed = false;
            result.requires_snapshot = true;
            result.messages.push(format!(
                "Zone {name} requires a snapshot but combat state is {:?}",
                plan.live.combat_state
            ));
        }

        if permissions.requires_admin && !plan.live.is_admin {
            result.passed = false;
            result
                .messages
                .push(format!("Zone {name} requires administrator privileges"));
        }

        result
    }

    fn execute(
        &self,
        context: &GateContext,
        capability: Capability,
        action: &mut dyn FnMut(Capability) -> AutomationResult,
    ) -> AutomationResult {
        if let Some(reason) = self.denial(context, capability) {
            warn!(
                plan_id = %context.plan_id,
                caller = %context.caller,
                %capability,
                reason = %reason,
                "Automation DENIED"
            );
            return AutomationResult::failed(capability, reason, None);
        }

        info!(
            plan_id = %context.plan_id,
            caller = %context.caller,
            %capability,
            "Automation ALLOWED"
        );
        action(capability)
    }
}

#[cfg(test)]
mod tests {
    use vauto_types::{ExecutionData, Permissions, RespawnReport};

    use super::*;

    fn make_plan(is_admin: bool, combat_state: CombatState) -> Plan {
        let mut plan = Plan::new("p1");
        plan.live.is_admin = is_admin;
        plan.live.combat_state = combat_state;
        plan
    }

    fn make_zone(permissions: Permissions) -> Zone {
        let mut zone = Zone::new("z1");
        zone.name = String::from("Arena");
        zone.permissions = permissions;
        zone
    }

    fn succeed(capability: Capability) -> AutomationResult {
        AutomationResult::ok(capability, ExecutionData::Respawn(RespawnReport::default()))
    }

    #[test]
    fn unrestricted_zone_passes() {
        let gate = PolicyGate::new();
        let result = gate.check_zone_gates(
            &make_zone(Permissions::default()),
            &make_plan(false, CombatState::Outside),
        );
        assert!(result.passed);
        assert!(result.messages.is_empty());
    }

    #[test]
    fn dev_approval_requires_admin() {
        let gate = PolicyGate::new();
        let zone = make_zone(Permissions {
            requires_dev_approval: true,
            ..Permissions::default()
        });
        let denied = gate.check_zone_gates(&zone, &make_plan(false, CombatState::Outside));
        assert!(!denied.passed);
        assert!(denied.requires_dev_approval);
        assert!(!denied.requires_snapshot);
        assert_eq!(denied.messages, vec!["Zone Arena requires developer approval"]);

        let allowed = gate.check_zone_gates(&zone, &make_plan(true, CombatState::Outside));
        assert!(allowed.passed);
    }

    #[test]
    fn snapshot_zones_blocked_during_transitions() {
        let gate = PolicyGate::new();
        let zone = make_zone(Permissions {
            requires_snapshot: true,
            ..Permissions::default()
        });
        for state in [CombatState::Snapshot, CombatState::Restoring] {
            let result = gate.check_zone_gates(&zone, &make_plan(true, state));
            assert!(!result.passed);
            assert!(result.requires_snapshot);
        }
        assert!(
            gate.check_zone_gates(&zone, &make_plan(false, CombatState::Active))
                .passed
        );
    }

    #[test]
    fn admin_zone_requires_admin() {
        let gate = PolicyGate::new();
        let zone = make_zone(Permissions {
            requires_admin: true,
            ..Permissions::default()
        });
        let result = gate.check_zone_gates(&zone, &make_plan(false, CombatState::Outside));
        assert!(!result.passed);
        assert!(!result.requires_dev_approval);
    }

    #[test]
    fn execute_runs_closure_with_granted_capability() {
        let gate = PolicyGate::new();
        let context = GateContext::for_plan(&make_plan(false, CombatState::Active), CallerId(5));
        let mut seen = None;
        let result = gate.execute(&context, Capability::PvPVirtualMutation, &mut |cap| {
            seen = Some(cap);
            succeed(cap)
        });
        assert!(result.success);
        assert_eq!(seen, Some(Capability::PvPVirtualMutation));
    }

    #[test]
    fn execute_denies_missing_caller_and_transitions() {
        let gate = PolicyGate::new();
        let mut ran = false;
        let context = GateContext::for_plan(&make_plan(true, CombatState::Outside), CallerId::NONE);
        let result = gate.execute(&context, Capability::ReadOnlyAnalytics, &mut |cap| {
            ran = true;
            succeed(cap)
        });
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Invalid caller id"));

        let context = GateContext::for_plan(&make_plan(true, CombatState::Restoring), CallerId(1));
        let result = gate.execute(&context, Capability::ReadOnlyAnalytics, &mut |cap| {
            ran = true;
            succeed(cap)
        });
        assert!(!result.success);
        assert!(!ran);
    }

    #[test]
    fn test_only_plans_never_mutate() {
        let gate = PolicyGate::new();
        let mut plan = make_plan(true, CombatState::Active);
        plan.is_test_only = true;
        let context = GateContext::for_plan(&plan, CallerId(1));
        let result = gate.execute(&context, Capability::PvPVirtualMutation, &mut succeed);
        assert!(!result.success);
        let result = gate.execute(&context, Capability::ReadOnlyAnalytics, &mut succeed);
        assert!(result.success);
    }

    #[test]
    fn strict_policy_requires_admin_for_mutation() {
        let gate = PolicyGate::strict();
        let context = GateContext::for_plan(&make_plan(false, CombatState::Active), CallerId(1));
        assert!(!gate.execute(&context, Capability::CastleBuilding, &mut succeed).success);
        assert!(gate.execute(&context, Capability::ReadOnlyAnalytics, &mut succeed).success);
    }
}
