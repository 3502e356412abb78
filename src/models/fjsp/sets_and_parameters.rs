use std::collections::BTreeMap;

use itertools::Itertools;
use typed_index_collections::TiVec;

use crate::problem::{Instance, JobIndex, MachineIndex, OperationIndex};

use super::big_m::BigMPolicy;

#[derive(Debug)]
#[allow(non_snake_case)]
pub struct Sets {
    /// Set of operations
    pub O: Vec<OperationIndex>,
    /// Set of machines that some operation is eligible on
    pub I: Vec<MachineIndex>,
    /// Set of jobs
    pub J: Vec<JobIndex>,
    /// Set of eligible machines of each operation, in input order
    pub I_o: TiVec<OperationIndex, Vec<MachineIndex>>,
    /// Set of operations that can be processed on each machine of `I`, ascending
    pub O_i: BTreeMap<MachineIndex, Vec<OperationIndex>>,
    /// The route of each job
    pub R_j: TiVec<JobIndex, Vec<OperationIndex>>,
}

#[allow(non_snake_case)]
impl Sets {
    pub fn new(instance: &Instance) -> Sets {
        let O = (0..instance.operations().len()).map(OperationIndex::from).collect();
        let I = instance.used_machines();
        let J = (0..instance.jobs()).map(JobIndex::from).collect();

        let I_o = instance
            .operations()
            .iter()
            .map(|op| op.machines().collect())
            .collect();

        let mut O_i: BTreeMap<MachineIndex, Vec<OperationIndex>> = BTreeMap::new();
        for (o, op) in instance.operations().iter_enumerated() {
            for i in op.machines() {
                O_i.entry(i).or_default().push(o);
            }
        }

        Sets {
            O,
            I,
            J,
            I_o,
            O_i,
            R_j: instance.routes().clone(),
        }
    }

    /// Every eligible `(machine, operation)` pair, operation by operation
    pub fn assignments(&self) -> Vec<(MachineIndex, OperationIndex)> {
        self.I_o
            .iter_enumerated()
            .flat_map(|(o, machines)| machines.iter().map(move |&i| (i, o)))
            .collect()
    }

    /// Every `(machine, a, b)` with `a < b` and both operations eligible on the machine,
    /// machine by machine
    pub fn machine_pairs(&self) -> Vec<(MachineIndex, OperationIndex, OperationIndex)> {
        self.O_i
            .iter()
            .flat_map(|(&i, ops)| {
                ops.iter()
                    .tuple_combinations()
                    .map(move |(&a, &b)| (i, a, b))
            })
            .collect()
    }
}

#[allow(non_snake_case)]
pub struct Parameters {
    /// Processing time of operation o on machine i, for eligible pairs only
    pub p: BTreeMap<(MachineIndex, OperationIndex), f64>,
    /// Relaxation constant of the disjunctive constraints on each machine of `I`
    pub M: BTreeMap<MachineIndex, f64>,
}

#[allow(non_snake_case)]
impl Parameters {
    pub fn new(instance: &Instance, policy: BigMPolicy) -> Parameters {
        let p = instance
            .operations()
            .iter_enumerated()
            .flat_map(|(o, op)| {
                op.alternatives()
                    .iter()
                    .map(move |&(i, duration)| ((i, o), duration as f64))
            })
            .collect();

        let M = policy.estimate(instance);

        Parameters { p, M }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_instance;

    fn op(o: usize) -> OperationIndex {
        OperationIndex::from(o)
    }

    fn machine(i: usize) -> MachineIndex {
        MachineIndex::from(i)
    }

    #[test]
    fn sets_follow_eligibility() {
        let instance = parse_instance("small", "2 2\n2 2 0 3 1 2 1 0 2\n1 1 1 4\n").unwrap();
        let sets = Sets::new(&instance);

        assert_eq!(sets.O.len(), 3);
        assert_eq!(sets.I_o[op(0)], vec![machine(0), machine(1)]);
        assert_eq!(sets.I, vec![machine(0), machine(1)]);
        assert_eq!(sets.O_i[&machine(0)], vec![op(0), op(1)]);
        assert_eq!(sets.O_i[&machine(1)], vec![op(0), op(2)]);
        assert_eq!(sets.R_j[JobIndex::from(0)], vec![op(0), op(1)]);

        assert_eq!(
            sets.assignments(),
            vec![
                (machine(0), op(0)),
                (machine(1), op(0)),
                (machine(0), op(1)),
                (machine(1), op(2))
            ]
        );
        assert_eq!(
            sets.machine_pairs(),
            vec![(machine(0), op(0), op(1)), (machine(1), op(0), op(2))]
        );
    }

    #[test]
    fn processing_times_exist_only_for_eligible_pairs() {
        let instance = parse_instance("small", "2 2\n2 2 0 3 1 2 1 0 2\n1 1 1 4\n").unwrap();
        let parameters = Parameters::new(&instance, BigMPolicy::Global);

        assert_eq!(parameters.p.len(), 4);
        assert_eq!(parameters.p[&(machine(1), op(0))], 2.0);
        assert_eq!(parameters.p[&(machine(1), op(2))], 4.0);
        assert!(!parameters.p.contains_key(&(machine(1), op(1))));
        assert_eq!(parameters.M[&machine(0)], 10.0);
    }

    #[test]
    fn sets_are_bounded_by_the_machines_in_use() {
        let text = "2 100000000000000\n1 1 12 5\n1 2 12 1 40 2\n";
        let instance = parse_instance("wide", text).unwrap();
        let sets = Sets::new(&instance);
        let parameters = Parameters::new(&instance, BigMPolicy::PerMachine);

        assert_eq!(sets.I, vec![machine(12), machine(40)]);
        assert_eq!(sets.O_i.len(), 2);
        assert_eq!(sets.machine_pairs(), vec![(machine(12), op(0), op(1))]);
        assert_eq!(parameters.M.len(), 2);
        assert_eq!(parameters.M[&machine(40)], 3.0);
    }
}
