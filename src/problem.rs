use std::collections::BTreeSet;

use derive_more::{Deref, Display, From, Into};
use serde::Serialize;
use typed_index_collections::TiVec;

/// The type used for processing times
pub type ProcessingTime = u32;

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize,
)]
pub struct JobIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize,
)]
pub struct MachineIndex(usize);

#[derive(
    Deref, Debug, Display, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash, Serialize,
)]
pub struct OperationIndex(usize);

/// The eligible machines of a single operation, together with the processing time on each.
pub type Alternatives = Vec<(MachineIndex, ProcessingTime)>;

/// A single operation of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// The job this operation belongs to
    job: JobIndex,
    /// The position of the operation within the job's route
    position: usize,
    /// Eligible machines and processing times, in input order. Never empty, machines are unique.
    alternatives: Alternatives,
}

impl Operation {
    /// The job this operation belongs to
    pub fn job(&self) -> JobIndex {
        self.job
    }

    /// The position of the operation within the job's route
    pub fn position(&self) -> usize {
        self.position
    }

    /// Eligible machines and processing times, in input order
    pub fn alternatives(&self) -> &[(MachineIndex, ProcessingTime)] {
        &self.alternatives
    }

    /// The machines this operation can be processed on
    pub fn machines(&self) -> impl Iterator<Item = MachineIndex> + '_ {
        self.alternatives.iter().map(|&(i, _)| i)
    }

    /// The processing time on `machine`, or `None` if the machine is not eligible.
    pub fn duration_on(&self, machine: MachineIndex) -> Option<ProcessingTime> {
        self.alternatives
            .iter()
            .find(|&&(i, _)| i == machine)
            .map(|&(_, p)| p)
    }

    pub fn is_eligible(&self, machine: MachineIndex) -> bool {
        self.duration_on(machine).is_some()
    }

    /// The shortest processing time over all eligible machines
    pub fn min_duration(&self) -> ProcessingTime {
        self.alternatives.iter().map(|&(_, p)| p).min().unwrap_or(0)
    }

    /// The longest processing time over all eligible machines
    pub fn max_duration(&self) -> ProcessingTime {
        self.alternatives.iter().map(|&(_, p)| p).max().unwrap_or(0)
    }

    /// The eligible machine with the shortest processing time. Ties go to the machine listed first.
    pub fn fastest_machine(&self) -> (MachineIndex, ProcessingTime) {
        self.alternatives
            .iter()
            .copied()
            .min_by_key(|&(_, p)| p)
            .unwrap_or((MachineIndex(0), 0))
    }
}

/// A flexible job-shop instance.
#[derive(Debug, Clone)]
pub struct Instance {
    /// The label of the instance, usually the file name it was read from
    name: String,
    /// The number of machines
    machines: usize,
    /// All operations, job by job and position by position
    operations: TiVec<OperationIndex, Operation>,
    /// The route of each job, as indices into `operations`
    routes: TiVec<JobIndex, Vec<OperationIndex>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ConstructionError {
    /// Job `job` has no operations
    #[display(fmt = "job {} has no operations", job)]
    EmptyJob { job: usize },
    /// An operation has no eligible machine
    #[display(fmt = "operation {} of job {} has no eligible machine", position, job)]
    NoEligibleMachine { job: usize, position: usize },
    /// An operation refers to a machine that does not exist
    #[display(
        fmt = "operation {} of job {} refers to machine {}, but there are only {} machines",
        position,
        job,
        machine,
        machines
    )]
    MachineOutOfRange {
        job: usize,
        position: usize,
        machine: usize,
        machines: usize,
    },
    /// An operation lists the same machine twice
    #[display(
        fmt = "operation {} of job {} lists machine {} more than once",
        position,
        job,
        machine
    )]
    DuplicateMachine {
        job: usize,
        position: usize,
        machine: usize,
    },
}

impl std::error::Error for ConstructionError {}

impl Instance {
    /// Creates a new instance from the routes of each job. `jobs[j][h]` holds the
    /// alternatives of the `h`-th operation of job `j`.
    pub fn new(
        name: impl Into<String>,
        machines: usize,
        jobs: Vec<Vec<Alternatives>>,
    ) -> Result<Instance, ConstructionError> {
        use ConstructionError::*;

        let mut operations = TiVec::new();
        let mut routes = TiVec::with_capacity(jobs.len());

        for (job, route) in jobs.into_iter().enumerate() {
            if route.is_empty() {
                return Err(EmptyJob { job });
            }

            let mut indices = Vec::with_capacity(route.len());
            for (position, alternatives) in route.into_iter().enumerate() {
                if alternatives.is_empty() {
                    return Err(NoEligibleMachine { job, position });
                }

                for (k, &(machine, _)) in alternatives.iter().enumerate() {
                    if *machine >= machines {
                        return Err(MachineOutOfRange {
                            job,
                            position,
                            machine: *machine,
                            machines,
                        });
                    }
                    if alternatives[..k].iter().any(|&(other, _)| other == machine) {
                        return Err(DuplicateMachine {
                            job,
                            position,
                            machine: *machine,
                        });
                    }
                }

                indices.push(operations.push_and_get_key(Operation {
                    job: JobIndex(job),
                    position,
                    alternatives,
                }));
            }

            routes.push(indices);
        }

        Ok(Instance {
            name: name.into(),
            machines,
            operations,
            routes,
        })
    }

    /// The label of the instance
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of jobs
    pub fn jobs(&self) -> usize {
        self.routes.len()
    }

    /// The number of machines
    pub fn machines(&self) -> usize {
        self.machines
    }

    /// All operations, ordered by job and then by position within the job
    pub fn operations(&self) -> &TiVec<OperationIndex, Operation> {
        &self.operations
    }

    pub fn operation(&self, o: OperationIndex) -> &Operation {
        &self.operations[o]
    }

    /// The route of every job
    pub fn routes(&self) -> &TiVec<JobIndex, Vec<OperationIndex>> {
        &self.routes
    }

    /// The operations of job `j`, in processing order
    pub fn route(&self, j: JobIndex) -> &[OperationIndex] {
        &self.routes[j]
    }

    /// The machines at least one operation is eligible on, ascending. Never longer
    /// than the number of alternatives, however many machines are declared.
    pub fn used_machines(&self) -> Vec<MachineIndex> {
        self.operations
            .iter()
            .flat_map(|op| op.machines())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The operations that may be processed on `machine`, in ascending order
    pub fn operations_on(&self, machine: MachineIndex) -> Vec<OperationIndex> {
        self.operations
            .iter_enumerated()
            .filter(|(_, op)| op.is_eligible(machine))
            .map(|(o, _)| o)
            .collect()
    }

    /// Describes the size as `jobs.operations.machines`, where the first job's
    /// operation count stands in for every job.
    pub fn size_descriptor(&self) -> String {
        let ops = self.routes.first().map(Vec::len).unwrap_or(0);
        format!("{}.{}.{}", self.jobs(), ops, self.machines)
    }
}
