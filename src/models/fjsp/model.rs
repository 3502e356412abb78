use std::collections::BTreeMap;

use float_ord::FloatOrd;
use good_lp::{Expression, Variable};
use log::{debug, info};
use typed_index_collections::TiVec;

use crate::models::milp::{Constr, MilpProblem, SolveOutcome};
use crate::models::utils::{AddVars, ConvertVars};
use crate::problem::{Instance, MachineIndex, OperationIndex};
use crate::solution::{Schedule, ScheduledOperation};

use super::big_m::BigMPolicy;
use super::sets_and_parameters::{Parameters, Sets};

pub struct FjspSolver {}

#[allow(non_snake_case)]
impl FjspSolver {
    /// Builds the problem of `instance`, labelled `FJSP_<name>`.
    pub fn build(instance: &Instance, policy: BigMPolicy) -> (MilpProblem, Variables) {
        info!("Building FJSP model for {}", instance.name());

        let sets = Sets::new(instance);
        let parameters = Parameters::new(instance, policy);

        let mut problem = MilpProblem::new(&format!("FJSP_{}", instance.name()));
        let variables = FjspSolver::formulate(&mut problem, &sets, &parameters);

        let size = problem.size();
        info!(
            "Built {}: {} binaries, {} continuous, {} constraints",
            problem.name(),
            size.binaries,
            size.continuous,
            size.constraints
        );

        (problem, variables)
    }

    /// Adds the variables, constraints and objective of the formulation to an empty problem.
    pub fn formulate(problem: &mut MilpProblem, sets: &Sets, parameters: &Parameters) -> Variables {
        //*****************CREATE VARIABLES*****************//

        // 1 if operation o is processed on machine i
        let y = sets.assignments().binary(problem, "y");
        // Start time of operation o
        let s: TiVec<OperationIndex, Variable> = sets.O.len().cont(problem, "s").into();
        // Makespan
        let c_max = problem.add_continuous("Cmax", 0.0);
        // 1 if a precedes b on machine i, for a < b both eligible on i
        let x = sets.machine_pairs().binary(problem, "x");

        let variables = Variables { y, s, x, c_max };

        //*****************ADD CONSTRAINTS*****************//

        // every operation is processed on exactly one eligible machine
        for o in &sets.O {
            let lhs: Expression = sets.I_o[*o]
                .iter()
                .map(|i| variables.y[&(*i, *o)])
                .sum();
            problem.add_constr(&format!("assign_{o}"), Constr::eq(lhs, 1.0));
        }

        // route order within each job, and the makespan covers the last operation of each job
        for j in &sets.J {
            let route = &sets.R_j[*j];
            for (&a, &b) in route.iter().zip(route.iter().skip(1)) {
                let rhs = variables.processing_time(sets, parameters, a) + variables.s[a];
                problem.add_constr(&format!("prec_{j}_{a}_{b}"), Constr::ge(variables.s[b], rhs));
            }

            if let Some(&last) = route.last() {
                let rhs = variables.processing_time(sets, parameters, last) + variables.s[last];
                problem.add_constr(&format!("mk_{j}"), Constr::ge(variables.c_max, rhs));
            }
        }

        // operations assigned to the same machine do not overlap. The constraints are
        // relaxed by M or more unless both operations are on machine i.
        for (&(i, a, b), &x) in &variables.x {
            let M = parameters.M[&i];
            let y_a = variables.y[&(i, a)];
            let y_b = variables.y[&(i, b)];
            let p_a = variables.processing_time(sets, parameters, a);
            let p_b = variables.processing_time(sets, parameters, b);

            // a before b when x = 1: s_b >= s_a + p_a - M (3 - x - y_a - y_b)
            let rhs = p_a + variables.s[a] + (x + y_a + y_b) * M - 3.0 * M;
            problem.add_constr(&format!("disj1_{i}_{a}_{b}"), Constr::ge(variables.s[b], rhs));
            // b before a when x = 0: s_a >= s_b + p_b - M (2 + x - y_a - y_b)
            let rhs = p_b + variables.s[b] + (y_a + y_b - x) * M - 2.0 * M;
            problem.add_constr(&format!("disj2_{i}_{a}_{b}"), Constr::ge(variables.s[a], rhs));
        }

        problem.minimise(variables.c_max);

        debug!(
            "Formulated {} assignments and {} machine pairs",
            variables.y.len(),
            variables.x.len()
        );

        variables
    }
}

pub struct Variables {
    /// Assignment variables, one per eligible `(machine, operation)` pair
    pub y: BTreeMap<(MachineIndex, OperationIndex), Variable>,
    /// Start times
    pub s: TiVec<OperationIndex, Variable>,
    /// Sequencing variables, one per `(machine, a, b)` with `a < b`
    pub x: BTreeMap<(MachineIndex, OperationIndex, OperationIndex), Variable>,
    /// Makespan
    pub c_max: Variable,
}

impl Variables {
    /// The processing time of `o` on whichever machine it is assigned to
    pub fn processing_time(
        &self,
        sets: &Sets,
        parameters: &Parameters,
        o: OperationIndex,
    ) -> Expression {
        sets.I_o[o]
            .iter()
            .map(|i| parameters.p[&(*i, o)] * self.y[&(*i, o)])
            .sum()
    }

    /// Reads the schedule of the incumbent. `None` if the solve left no incumbent.
    pub fn schedule(&self, instance: &Instance, outcome: &SolveOutcome) -> Option<Schedule> {
        let makespan = self.c_max.convert(outcome)?;
        let y = self.y.convert(outcome);
        let s = self.s.convert(outcome);

        let mut operations = Vec::with_capacity(instance.operations().len());
        for (o, op) in instance.operations().iter_enumerated() {
            // The machine with the largest assignment value, so values just below 1 still count
            let (machine, duration) = op
                .alternatives()
                .iter()
                .copied()
                .max_by_key(|&(i, _)| FloatOrd(y[&(i, o)].unwrap_or(0.0)))
                .unwrap_or_else(|| op.fastest_machine());
            let start = s[o].unwrap_or(0.0);

            operations.push(ScheduledOperation {
                operation: o,
                job: op.job(),
                position: op.position(),
                machine,
                start,
                end: start + duration as f64,
            });
        }

        Some(Schedule {
            instance: instance.name().to_string(),
            makespan,
            operations,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use itertools::Itertools;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::models::highs::HighsBackend;
    use crate::models::milp::{MilpBackend, ModelSize, Sense, SolveParams, Status, Values};
    use crate::parse::parse_instance;
    use crate::problem::JobIndex;
    use crate::testing::{greedy_values, random_instance};

    const SMALL: &str = "2 2\n2 2 0 3 1 2 1 0 2\n1 1 1 4\n";

    fn build(instance: &Instance) -> (MilpProblem, Variables) {
        FjspSolver::build(instance, BigMPolicy::Global)
    }

    fn names_with_prefix<'a>(problem: &'a MilpProblem, prefix: &str) -> Vec<&'a str> {
        problem
            .constraints()
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    fn solve(instance: &Instance) -> (SolveOutcome, Variables) {
        let (mut problem, variables) = build(instance);
        let outcome = HighsBackend.solve(&mut problem, &SolveParams::default()).unwrap();
        (outcome, variables)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    #[test]
    fn small_instance_has_the_expected_size() {
        let instance = parse_instance("small", SMALL).unwrap();
        let (problem, variables) = build(&instance);

        assert_eq!(problem.name(), "FJSP_small");
        assert_eq!(variables.y.len(), 4);
        assert_eq!(variables.x.len(), 2);
        assert_eq!(
            problem.size(),
            ModelSize {
                binaries: 6,
                continuous: 4,
                constraints: 10
            }
        );

        assert_eq!(
            names_with_prefix(&problem, "assign_"),
            vec!["assign_0", "assign_1", "assign_2"]
        );
        assert_eq!(names_with_prefix(&problem, "prec_"), vec!["prec_0_0_1"]);
        assert_eq!(names_with_prefix(&problem, "mk_"), vec!["mk_0", "mk_1"]);
        assert_eq!(
            names_with_prefix(&problem, "disj"),
            vec!["disj1_0_0_1", "disj2_0_0_1", "disj1_1_0_2", "disj2_1_0_2"]
        );
        assert_eq!(problem.var_name(variables.c_max), "Cmax");
        let x = variables.x[&(
            MachineIndex::from(1),
            OperationIndex::from(0),
            OperationIndex::from(2),
        )];
        assert_eq!(problem.var_name(x), "x_1_0_2");
    }

    #[test]
    fn disjunctive_constraint_uses_the_relaxation_constant() {
        let instance = parse_instance("small", SMALL).unwrap();
        let (problem, variables) = build(&instance);

        let m0 = MachineIndex::from(0);
        let (a, b) = (OperationIndex::from(0), OperationIndex::from(1));
        let constr = problem.constraint("disj1_0_0_1").unwrap();

        // s_b - s_a - p_a + M (3 - x - y_a - y_b) >= 0 with M = 10
        assert_eq!(constr.sense, Sense::Greater);
        assert_eq!(constr.rhs(), -30.0);
        assert_eq!(constr.coefficient(variables.s[b]), 1.0);
        assert_eq!(constr.coefficient(variables.s[a]), -1.0);
        assert_eq!(constr.coefficient(variables.x[&(m0, a, b)]), -10.0);
        assert_eq!(constr.coefficient(variables.y[&(m0, a)]), -10.0 - 3.0);
        assert_eq!(constr.coefficient(variables.y[&(m0, b)]), -10.0);
        assert_eq!(constr.coefficient(variables.c_max), 0.0);
    }

    #[test]
    fn counts_follow_the_instance_structure() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let instance = random_instance(&mut rng, 4, 4, 3);
            let (problem, variables) = build(&instance);

            let eligible: usize = instance
                .operations()
                .iter()
                .map(|op| op.alternatives().len())
                .sum();
            let pairs: usize = instance
                .used_machines()
                .into_iter()
                .map(|i| {
                    let n = instance.operations_on(i).len();
                    n * n.saturating_sub(1) / 2
                })
                .sum();
            let ops = instance.operations().len();
            let jobs = instance.jobs();

            assert_eq!(variables.y.len(), eligible);
            assert_eq!(variables.x.len(), pairs);
            assert_eq!(names_with_prefix(&problem, "assign_").len(), ops);
            assert_eq!(names_with_prefix(&problem, "prec_").len(), ops - jobs);
            assert_eq!(names_with_prefix(&problem, "mk_").len(), jobs);
            assert_eq!(
                problem.size(),
                ModelSize {
                    binaries: eligible + pairs,
                    continuous: ops + 1,
                    constraints: ops + (ops - jobs) + jobs + 2 * pairs
                }
            );

            // y only exists for eligible pairs
            for &(i, o) in variables.y.keys() {
                assert!(instance.operation(o).is_eligible(i));
            }
            // x only exists for ordered pairs that share the machine
            for &(i, a, b) in variables.x.keys() {
                assert!(a < b);
                assert!(instance.operation(a).is_eligible(i));
                assert!(instance.operation(b).is_eligible(i));
            }
        }
    }

    #[test]
    fn building_twice_gives_the_same_model() {
        let mut rng = StdRng::seed_from_u64(11);
        let instance = random_instance(&mut rng, 3, 3, 3);

        let lp = |problem: &MilpProblem| {
            let mut out = Vec::new();
            problem.write_lp(&mut out).unwrap();
            String::from_utf8(out).unwrap()
        };

        let (first, _) = build(&instance);
        let (second, _) = build(&instance);
        assert_eq!(first.size(), second.size());
        assert_eq!(lp(&first), lp(&second));
    }

    #[test]
    fn global_relaxation_never_cuts_off_a_feasible_schedule() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..25 {
            let instance = random_instance(&mut rng, 4, 3, 4);
            let (problem, variables) = build(&instance);

            // Sequencing variables of pairs on different machines are free, try both values
            for free in [0.0, 1.0] {
                let values = greedy_values(&instance, &problem, &variables, free);
                assert_eq!(problem.check(&values, 1e-6), Ok(()));
            }
        }
    }

    #[test]
    fn overlapping_operations_on_one_machine_are_infeasible() {
        let instance = parse_instance("small", SMALL).unwrap();
        let (problem, variables) = build(&instance);
        let (m0, m1) = (MachineIndex::from(0), MachineIndex::from(1));
        let ops: Vec<OperationIndex> = (0..3).map(OperationIndex::from).collect();

        for x in [0.0, 1.0] {
            let mut values: Values = problem.columns().iter().map(|&(v, _)| (v, 0.0)).collect();
            // operations 0 and 2 both on machine 1, both starting at 0
            values.insert(variables.y[&(m1, ops[0])], 1.0);
            values.insert(variables.y[&(m0, ops[1])], 1.0);
            values.insert(variables.y[&(m1, ops[2])], 1.0);
            values.insert(variables.s[ops[1]], 2.0);
            values.insert(variables.c_max, 4.0);
            values.insert(variables.x[&(m1, ops[0], ops[2])], x);

            assert!(problem.check(&values, 1e-6).is_err());
        }
    }

    #[test]
    fn small_instance_has_makespan_five() {
        let instance = parse_instance("small", SMALL).unwrap();
        let (outcome, variables) = solve(&instance);

        assert_eq!(outcome.status, Status::Optimal);
        assert_close(outcome.objective.unwrap(), 5.0);

        let schedule = variables.schedule(&instance, &outcome).unwrap();
        assert_close(schedule.makespan, 5.0);
        assert_eq!(schedule.validate(&instance, 1e-6), Ok(()));
        let machines: Vec<usize> = schedule.operations.iter().map(|op| *op.machine).collect();
        assert_eq!(machines, vec![0, 0, 1]);
    }

    #[test]
    fn makespan_never_decreases_with_longer_durations() {
        let instance = parse_instance("small", SMALL).unwrap();
        let longer = parse_instance("longer", "2 2\n2 2 0 3 1 2 1 0 5\n1 1 1 4\n").unwrap();

        assert_close(solve(&instance).0.objective.unwrap(), 5.0);
        assert_close(solve(&longer).0.objective.unwrap(), 7.0);
    }

    #[test]
    fn a_single_operation_finishes_at_its_duration() {
        let instance = parse_instance("one", "1 1\n1 1 0 7\n").unwrap();
        let (outcome, variables) = solve(&instance);

        assert_eq!(outcome.status, Status::Optimal);
        assert!(variables.x.is_empty());
        let schedule = variables.schedule(&instance, &outcome).unwrap();
        assert_close(schedule.makespan, 7.0);
        assert_close(schedule.operations[0].start, 0.0);
    }

    #[test]
    fn single_operation_jobs_only_get_a_makespan_link() {
        let instance = parse_instance("flat", "3 2\n1 1 0 2\n1 1 0 3\n1 2 0 1 1 1\n").unwrap();
        let (problem, variables) = build(&instance);

        assert!(names_with_prefix(&problem, "prec_").is_empty());
        assert_eq!(names_with_prefix(&problem, "mk_").len(), 3);
        // machine 0 hosts all three operations
        let pairs: BTreeSet<_> = variables.x.keys().map(|&(i, a, b)| (*i, *a, *b)).collect();
        assert_eq!(pairs, [(0, 0, 1), (0, 0, 2), (0, 1, 2)].into_iter().collect());
        assert_eq!(
            variables.s.iter().map(|&v| problem.var_name(v)).collect_vec(),
            vec!["s_0", "s_1", "s_2"]
        );
        assert_eq!(instance.route(JobIndex::from(2)).len(), 1);
    }

    #[test]
    fn no_schedule_without_an_incumbent() {
        let instance = parse_instance("small", SMALL).unwrap();
        let (_, variables) = build(&instance);
        assert!(variables.schedule(&instance, &SolveOutcome::not_solved()).is_none());
    }
}
