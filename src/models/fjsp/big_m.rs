use std::{collections::BTreeMap, str::FromStr};

use derive_more::Display;

use crate::problem::{Instance, MachineIndex};

/// How the relaxation constant of the disjunctive constraints is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum BigMPolicy {
    /// One constant for every machine: `1 + sum of each operation's longest processing time`.
    /// No schedule without idle time can be longer, so no feasible schedule is cut off.
    #[default]
    #[display(fmt = "global")]
    Global,
    /// One constant per machine, counting only operations eligible on that machine.
    /// Tighter, but a machine can sit idle while waiting for route predecessors that
    /// run elsewhere, so it may cut off feasible schedules.
    #[display(fmt = "per-machine")]
    PerMachine,
}

impl FromStr for BigMPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(BigMPolicy::Global),
            "per-machine" => Ok(BigMPolicy::PerMachine),
            other => Err(format!(
                "unknown big-M policy '{}', expected 'global' or 'per-machine'",
                other
            )),
        }
    }
}

impl BigMPolicy {
    /// The relaxation constant of every machine some operation is eligible on
    pub fn estimate(self, instance: &Instance) -> BTreeMap<MachineIndex, f64> {
        let machines = instance.used_machines();
        match self {
            BigMPolicy::Global => {
                let m = global(instance);
                machines.into_iter().map(|i| (i, m)).collect()
            }
            BigMPolicy::PerMachine => machines
                .into_iter()
                .map(|i| (i, per_machine(instance, i)))
                .collect(),
        }
    }
}

/// `1 + sum over all operations of their longest processing time`
pub fn global(instance: &Instance) -> f64 {
    let total: u64 = instance
        .operations()
        .iter()
        .map(|op| op.max_duration() as u64)
        .sum();
    (1 + total) as f64
}

/// `1 + sum over the operations eligible on `machine` of their longest processing time`
pub fn per_machine(instance: &Instance, machine: MachineIndex) -> f64 {
    let total: u64 = instance
        .operations()
        .iter()
        .filter(|op| op.is_eligible(machine))
        .map(|op| op.max_duration() as u64)
        .sum();
    (1 + total) as f64
}
