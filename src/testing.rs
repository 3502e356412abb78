//! Helpers for tests: instance generators and hand-built solutions.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::index::sample, Rng};
use typed_index_collections::TiVec;

use crate::models::{
    fjsp::Variables,
    milp::{MilpProblem, Values},
};
use crate::problem::{Alternatives, Instance, MachineIndex, OperationIndex};

/// A random instance with `jobs` jobs of 1 to `max_operations` operations each. Every
/// operation has 1 to `machines` distinct eligible machines with durations in 1..=9.
pub fn random_instance(
    rng: &mut StdRng,
    jobs: usize,
    machines: usize,
    max_operations: usize,
) -> Instance {
    let routes = (0..jobs)
        .map(|_| {
            (0..rng.gen_range(1..=max_operations))
                .map(|_| {
                    let k = rng.gen_range(1..=machines);
                    sample(rng, machines, k)
                        .into_iter()
                        .map(|i| (MachineIndex::from(i), rng.gen_range(1..=9)))
                        .collect::<Alternatives>()
                })
                .collect()
        })
        .collect();

    Instance::new("random", machines, routes).unwrap()
}

/// Solution values of the serial schedule that puts every operation on its fastest
/// machine and starts it, in operation order, as early as its machine and route allow.
/// Sequencing variables of pairs that do not share a machine get `free`.
pub fn greedy_values(
    instance: &Instance,
    problem: &MilpProblem,
    variables: &Variables,
    free: f64,
) -> Values {
    let mut values: Values = problem.columns().iter().map(|&(v, _)| (v, 0.0)).collect();
    let mut machine_free: BTreeMap<MachineIndex, f64> = BTreeMap::new();
    let mut placed: TiVec<OperationIndex, (MachineIndex, f64, f64)> = TiVec::new();

    for (o, op) in instance.operations().iter_enumerated() {
        let (i, duration) = op.fastest_machine();
        let route_ready = if op.position() > 0 {
            placed[OperationIndex::from(usize::from(o) - 1)].2
        } else {
            0.0
        };
        let free_at = machine_free.entry(i).or_insert(0.0);
        let start = free_at.max(route_ready);
        let end = start + duration as f64;
        *free_at = end;
        placed.push((i, start, end));

        values.insert(variables.y[&(i, o)], 1.0);
        values.insert(variables.s[o], start);
    }

    for (&(i, a, b), &x) in &variables.x {
        let (on_a, start_a, _) = placed[a];
        let (on_b, start_b, _) = placed[b];
        let value = if on_a == i && on_b == i {
            (start_a <= start_b) as u8 as f64
        } else {
            free
        };
        values.insert(x, value);
    }

    let makespan = placed.iter().map(|&(_, _, end)| end).fold(0.0, f64::max);
    values.insert(variables.c_max, makespan);
    values
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::models::fjsp::{BigMPolicy, FjspSolver};

    #[test]
    fn greedy_values_describe_a_feasible_schedule() {
        let mut rng = StdRng::seed_from_u64(1);
        let instance = random_instance(&mut rng, 3, 2, 3);
        let (problem, variables) = FjspSolver::build(&instance, BigMPolicy::Global);

        let values = greedy_values(&instance, &problem, &variables, 0.0);
        assert_eq!(problem.check(&values, 1e-6), Ok(()));
    }

    #[test]
    fn random_instances_respect_the_bounds() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            let instance = random_instance(&mut rng, 4, 3, 2);
            assert_eq!(instance.jobs(), 4);
            assert!(instance.operations().len() <= 8);
            assert!(instance.used_machines().len() <= 3);
        }
    }
}
