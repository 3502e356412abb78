use derive_more::Display;
use float_ord::FloatOrd;
use itertools::Itertools;
use serde::Serialize;

use crate::problem::{Instance, JobIndex, MachineIndex, OperationIndex};

/// An operation placed on a machine at a start time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledOperation {
    pub operation: OperationIndex,
    pub job: JobIndex,
    /// Position within the job's route
    pub position: usize,
    pub machine: MachineIndex,
    pub start: f64,
    pub end: f64,
}

/// A complete schedule of an instance, one entry per operation in operation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub instance: String,
    /// The makespan reported alongside the schedule
    pub makespan: f64,
    pub operations: Vec<ScheduledOperation>,
}

/// The first rule a schedule breaks.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ScheduleViolation {
    #[display(fmt = "expected {} operations, found {}", expected, actual)]
    OperationCount { expected: usize, actual: usize },
    #[display(fmt = "entry {} does not describe operation {}", entry, expected)]
    Mismatch {
        entry: usize,
        expected: OperationIndex,
    },
    #[display(fmt = "operation {} is not eligible on machine {}", operation, machine)]
    NotEligible {
        operation: OperationIndex,
        machine: MachineIndex,
    },
    #[display(fmt = "operation {} does not last its processing time", operation)]
    WrongDuration { operation: OperationIndex },
    #[display(fmt = "operation {} starts before time 0", operation)]
    NegativeStart { operation: OperationIndex },
    #[display(fmt = "operation {} starts before its predecessor {} ends", after, before)]
    Precedence {
        before: OperationIndex,
        after: OperationIndex,
    },
    #[display(fmt = "operations {} and {} overlap on machine {}", first, second, machine)]
    Overlap {
        machine: MachineIndex,
        first: OperationIndex,
        second: OperationIndex,
    },
    #[display(fmt = "operation {} ends after the makespan", operation)]
    Makespan { operation: OperationIndex },
}

impl std::error::Error for ScheduleViolation {}

impl Schedule {
    /// The time at which the last operation ends
    pub fn completion_time(&self) -> f64 {
        self.operations
            .iter()
            .map(|op| FloatOrd(op.end))
            .max()
            .map(|end| end.0)
            .unwrap_or(0.0)
    }

    /// Checks the schedule against `instance`, allowing `tolerance` on every comparison of times.
    pub fn validate(&self, instance: &Instance, tolerance: f64) -> Result<(), ScheduleViolation> {
        use ScheduleViolation::*;

        if self.operations.len() != instance.operations().len() {
            return Err(OperationCount {
                expected: instance.operations().len(),
                actual: self.operations.len(),
            });
        }

        for (entry, (scheduled, (o, op))) in self
            .operations
            .iter()
            .zip(instance.operations().iter_enumerated())
            .enumerate()
        {
            if scheduled.operation != o || scheduled.job != op.job() {
                return Err(Mismatch { entry, expected: o });
            }
            let duration = op.duration_on(scheduled.machine).ok_or(NotEligible {
                operation: o,
                machine: scheduled.machine,
            })?;
            if (scheduled.end - scheduled.start - duration as f64).abs() > tolerance {
                return Err(WrongDuration { operation: o });
            }
            if scheduled.start < -tolerance {
                return Err(NegativeStart { operation: o });
            }
            if scheduled.end > self.makespan + tolerance {
                return Err(Makespan { operation: o });
            }
        }

        for route in instance.routes().iter() {
            for (&a, &b) in route.iter().tuple_windows() {
                let (a, b) = (&self.operations[usize::from(a)], &self.operations[usize::from(b)]);
                if b.start < a.end - tolerance {
                    return Err(Precedence {
                        before: a.operation,
                        after: b.operation,
                    });
                }
            }
        }

        let by_machine = self
            .operations
            .iter()
            .sorted_by_key(|op| (op.machine, FloatOrd(op.start)))
            .group_by(|op| op.machine);
        for (machine, ops) in &by_machine {
            for (first, second) in ops.tuple_windows() {
                if second.start < first.end - tolerance {
                    return Err(Overlap {
                        machine,
                        first: first.operation,
                        second: second.operation,
                    });
                }
            }
        }

        Ok(())
    }
}
