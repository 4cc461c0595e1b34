//! Logistics execution: transfers, refills, repairs and balancing.
//!
//! Operations run in a fixed order (every transfer, then refills, repairs
//! and balances) and each one is gated separately with its kind's
//! capability. A failing or denied operation is recorded and the rest still
//! run.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info};
use vauto_types::{
    AutomationResult, BalanceOp, Capability, LogisticsAutomation, LogisticsExecution,
    LogisticsOperation, OperationExecution, PrefabGuid, RefillOp, RepairOp, StageStatus,
    TransferOp,
};
use vauto_world::{InventorySink, PrefabCategory, PrefabResolver, WorldError};

use crate::gate::{Gate, GateContext};

/// Runs a plan's logistics operations.
pub struct LogisticsExecutor {
    gate: Arc<dyn Gate>,
    resolver: Arc<dyn PrefabResolver>,
    inventory: Arc<dyn InventorySink>,
}

impl LogisticsExecutor {
    /// Create an executor.
    pub fn new(
        gate: Arc<dyn Gate>,
        resolver: Arc<dyn PrefabResolver>,
        inventory: Arc<dyn InventorySink>,
    ) -> Self {
        Self {
            gate,
            resolver,
            inventory,
        }
    }

    /// The operations a run would perform.
    pub fn simulate(&self, logistics: &LogisticsAutomation) -> Vec<String> {
        logistics
            .operations()
            .map(|(_, operation)| match operation {
                LogisticsOperation::Transfer(op) => format!(
                    "Would transfer {} {} from {} to {}",
                    op.amount, op.item, op.from, op.to
                ),
                LogisticsOperation::Refill(op) => format!(
                    "Would keep {} in {} between {} and {}",
                    op.item, op.castle, op.min, op.max
                ),
                LogisticsOperation::Repair(op) => format!(
                    "Would repair {} in {} below {}%",
                    op.equipment_id, op.castle, op.repair_threshold
                ),
                LogisticsOperation::Balance(op) => format!(
                    "Would balance {} between {} and {}",
                    op.item, op.source_castle, op.target_castle
                ),
            })
            .collect()
    }

    /// Run every operation, continuing past failures.
    ///
    /// `granted` is the capability of the enclosing run. A read-only run
    /// records every operation as simulated.
    pub fn execute(
        &self,
        context: &GateContext,
        granted: Capability,
        logistics: &LogisticsAutomation,
    ) -> LogisticsExecution {
        let simulated = self.simulate(logistics);
        let mut operations = Vec::with_capacity(logistics.len());

        for ((index, operation), description) in logistics.operations().zip(simulated) {
            let kind = operation.kind();
            let label = operation.label(index);
            let outcome = if granted.is_mutating() {
                self.gated(context, operation)
            } else {
                Ok(description)
            };
            debug!(%kind, label = %label, ok = outcome.is_ok(), "Logistics operation finished");
            let (success, detail) = match outcome {
                Ok(detail) => (true, detail),
                Err(error) => (false, error),
            };
            operations.push(OperationExecution {
                kind,
                index: u32::try_from(index).unwrap_or(u32::MAX),
                label,
                success,
                detail,
            });
        }

        let failed = operations.iter().filter(|o| !o.success).count();
        let succeeded = operations.len().saturating_sub(failed);
        let status = StageStatus::from_counts(succeeded, failed);
        info!(succeeded, failed, ?status, "Logistics automation finished");
        LogisticsExecution { status, operations }
    }

    fn gated(
        &self,
        context: &GateContext,
        operation: LogisticsOperation<'_>,
    ) -> Result<String, String> {
        let mut outcome = Err(String::new());
        let result = self
            .gate
            .execute(context, operation.kind().capability(), &mut |capability| {
                outcome = self.apply(operation).map_err(|e| e.to_string());
                AutomationResult::completed(capability)
            });
        if result.success {
            outcome
        } else {
            Err(result
                .error
                .unwrap_or_else(|| String::from("Operation denied")))
        }
    }

    fn apply(&self, operation: LogisticsOperation<'_>) -> Result<String, WorldError> {
        match operation {
            LogisticsOperation::Transfer(op) => self.transfer(op),
            LogisticsOperation::Refill(op) => self.refill(op),
            LogisticsOperation::Repair(op) => self.repair(op),
            LogisticsOperation::Balance(op) => self.balance(op),
        }
    }

    fn transfer(&self, op: &TransferOp) -> Result<String, WorldError> {
        let item = self.item(&op.item)?;
        let amount = u32::try_from(op.amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or_else(|| {
                WorldError::Rejected(String::from("Transfer amount must be greater than 0"))
            })?;
        self.inventory.transfer(&op.from, &op.to, item, amount)?;
        Ok(format!("Moved {amount} {} from {} to {}", op.item, op.from, op.to))
    }

    fn refill(&self, op: &RefillOp) -> Result<String, WorldError> {
        let item = self.item(&op.item)?;
        let current = i64::from(self.inventory.stock(&op.castle, item)?);
        if current >= i64::from(op.min) {
            return Ok(format!(
                "{} holds {current} {}, no refill needed",
                op.castle, op.item
            ));
        }
        let needed = i64::from(op.max)
            .checked_sub(current)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(WorldError::ArithmeticOverflow)?;
        let moved = self.inventory.restock(&op.castle, item, needed)?;
        if moved == 0 {
            return Err(WorldError::Rejected(format!(
                "no {} in reserve for {}",
                op.item, op.castle
            )));
        }
        Ok(format!("Refilled {moved} {} in {}", op.item, op.castle))
    }

    fn repair(&self, op: &RepairOp) -> Result<String, WorldError> {
        let repaired = self
            .inventory
            .repair(&op.castle, &op.equipment_id, op.repair_threshold)?;
        Ok(if repaired {
            format!("Repaired {} in {}", op.equipment_id, op.castle)
        } else {
            format!("No repair needed for {} in {}", op.equipment_id, op.castle)
        })
    }

    /// Move `trunc((source - target) * ratio)` from the fuller castle to the
    /// emptier one.
    fn balance(&self, op: &BalanceOp) -> Result<String, WorldError> {
        let item = self.item(&op.item)?;
        let source = self.inventory.stock(&op.source_castle, item)?;
        let target = self.inventory.stock(&op.target_castle, item)?;
        let amount = balance_amount(source, target, op.balance_ratio)?;

        if amount == 0 {
            return Ok(format!(
                "{} already balanced between {} and {}",
                op.item, op.source_castle, op.target_castle
            ));
        }
        let magnitude = u32::try_from(amount.unsigned_abs())
            .ok()
            .ok_or(WorldError::ArithmeticOverflow)?;
        if i64::from(magnitude) < i64::from(op.min_transfer_amount) {
            return Err(WorldError::Rejected(String::from(
                "Transfer amount below minimum threshold",
            )));
        }

        let (from, to) = if amount > 0 {
            (&op.source_castle, &op.target_castle)
        } else {
            (&op.target_castle, &op.source_castle)
        };
        self.inventory.transfer(from, to, item, magnitude)?;
        Ok(format!("Balanced {magnitude} {} from {from} to {to}", op.item))
    }

    fn item(&self, name: &str) -> Result<PrefabGuid, WorldError> {
        self.resolver
            .resolve(PrefabCategory::Item, name)
            .ok_or_else(|| WorldError::UnknownPrefab(name.to_owned()))
    }
}

impl std::fmt::Debug for LogisticsExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogisticsExecutor").finish_non_exhaustive()
    }
}

/// Signed amount to move from source to target. Negative moves the other
/// way.
fn balance_amount(source: u32, target: u32, ratio: Decimal) -> Result<i64, WorldError> {
    let difference = i64::from(source)
        .checked_sub(i64::from(target))
        .ok_or(WorldError::ArithmeticOverflow)?;
    Decimal::from(difference)
        .checked_mul(ratio)
        .and_then(|share| share.trunc().to_i64())
        .ok_or(WorldError::ArithmeticOverflow)
}
