use crate::{LinExpr, Rel, Sense, SolveStatus, Solver, VarId};
use std::collections::HashMap;
use std::io;

#[derive(Clone, Copy, Debug)]
enum VarKind {
    Binary,
    Continuous,
}

#[derive(Clone, Debug)]
struct ConstraintDef {
    expr: LinExpr,
    rel: Rel,
    rhs: f64,
}

/// Reference `Solver` implementation. `spec.md §6`'s solver plugin is
/// specified only as an interface; this exhaustively enumerates every binary
/// assignment, resolves continuous variables from their defining equality
/// constraints, and keeps the cheapest feasible one. Exponential in the
/// binary variable count — usable for the small problems this workspace's
/// own tests build, never a stand-in for a real MIP solver in production.
#[derive(Debug, Default)]
pub struct BruteForceSolver {
    var_kinds: Vec<VarKind>,
    constraints: Vec<ConstraintDef>,
    objective: Option<(VarId, Sense)>,
    values: HashMap<VarId, f64>,
}

impl BruteForceSolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn binary_vars(&self) -> Vec<VarId> {
        self.var_kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| matches!(k, VarKind::Binary))
            .map(|(i, _)| VarId(i))
            .collect()
    }

    fn continuous_vars(&self) -> Vec<VarId> {
        self.var_kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| matches!(k, VarKind::Continuous))
            .map(|(i, _)| VarId(i))
            .collect()
    }

    fn eval(&self, expr: &LinExpr, values: &HashMap<VarId, f64>) -> Option<f64> {
        let mut total = expr.constant;
        for &(var, coeff) in &expr.terms {
            total += coeff * values.get(&var).copied()?;
        }
        Some(total)
    }

    /// Resolve every continuous variable from its defining `Rel::Eq`
    /// constraint (`var - expr = 0`, the shape every equality this crate's
    /// `solve` emits for `z`/`z_count` takes), given a binary assignment.
    fn resolve_continuous(&self, binary_values: &HashMap<VarId, f64>) -> Option<HashMap<VarId, f64>> {
        let mut values = binary_values.clone();
        let mut remaining = self.continuous_vars();
        let mut progressed = true;
        while !remaining.is_empty() && progressed {
            progressed = false;
            remaining.retain(|&var| {
                for c in &self.constraints {
                    if c.rel != Rel::Eq {
                        continue;
                    }
                    let coeff = match c.expr.terms.iter().find(|(v, _)| *v == var) {
                        Some((_, co)) if *co != 0.0 => *co,
                        _ => continue,
                    };
                    let mut others = 0.0;
                    let mut all_known = true;
                    for &(v, co) in &c.expr.terms {
                        if v == var {
                            continue;
                        }
                        match values.get(&v) {
                            Some(val) => others += co * val,
                            None => {
                                all_known = false;
                                break;
                            }
                        }
                    }
                    if !all_known {
                        continue;
                    }
                    let value = (c.rhs - c.expr.constant - others) / coeff;
                    values.insert(var, value);
                    progressed = true;
                    return false;
                }
                true
            });
        }

        if remaining.is_empty() {
            Some(values)
        } else {
            None
        }
    }

    fn satisfies(&self, values: &HashMap<VarId, f64>) -> bool {
        const EPS: f64 = 1e-6;
        self.constraints.iter().all(|c| match self.eval(&c.expr, values) {
            Some(lhs) => match c.rel {
                Rel::Le => lhs <= c.rhs + EPS,
                Rel::Ge => lhs >= c.rhs - EPS,
                Rel::Eq => (lhs - c.rhs).abs() <= EPS,
            },
            None => false,
        })
    }
}

impl Solver for BruteForceSolver {
    fn new_model(&mut self) {
        self.var_kinds.clear();
        self.constraints.clear();
        self.objective = None;
        self.values.clear();
    }

    fn add_binary_var(&mut self, _name: &str) -> VarId {
        let id = VarId(self.var_kinds.len());
        self.var_kinds.push(VarKind::Binary);
        id
    }

    fn add_continuous_var(&mut self, _lo: f64, _hi: f64, _name: &str) -> VarId {
        let id = VarId(self.var_kinds.len());
        self.var_kinds.push(VarKind::Continuous);
        id
    }

    fn add_constraint(&mut self, expr: LinExpr, rel: Rel, rhs: f64) {
        self.constraints.push(ConstraintDef { expr, rel, rhs });
    }

    fn set_objective(&mut self, var: VarId, sense: Sense) {
        self.objective = Some((var, sense));
    }

    fn optimize(&mut self) -> SolveStatus {
        let binaries = self.binary_vars();
        let Some((obj_var, sense)) = self.objective else {
            return SolveStatus::Infeasible;
        };

        let mut best: Option<(f64, HashMap<VarId, f64>)> = None;
        let combinations = 1u64 << binaries.len();
        for mask in 0..combinations {
            let mut binary_values = HashMap::new();
            for (i, &var) in binaries.iter().enumerate() {
                binary_values.insert(var, if (mask >> i) & 1 == 1 { 1.0 } else { 0.0 });
            }
            let Some(values) = self.resolve_continuous(&binary_values) else {
                continue;
            };
            if !self.satisfies(&values) {
                continue;
            }
            let obj_value = values[&obj_var];
            let better = match (&best, sense) {
                (None, _) => true,
                (Some((b, _)), Sense::Minimize) => obj_value < *b,
                (Some((b, _)), Sense::Maximize) => obj_value > *b,
            };
            if better {
                best = Some((obj_value, values));
            }
        }

        match best {
            Some((_, values)) => {
                self.values = values;
                SolveStatus::Optimal
            }
            None => SolveStatus::Infeasible,
        }
    }

    fn value(&self, var: VarId) -> f64 {
        self.values.get(&var).copied().unwrap_or(0.0)
    }

    fn compute_iis(&self) -> Vec<String> {
        // A real IIS algorithm narrows this to a minimal conflicting subset;
        // this reference solver reports every constraint it holds instead.
        (0..self.constraints.len()).map(|i| format!("constraint_{i}")).collect()
    }

    fn write(&self, path: &str) -> io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::File::create(path)?;
        for (i, c) in self.constraints.iter().enumerate() {
            writeln!(file, "c{i}: {:?} {:?} {}", c.expr, c.rel, c.rhs)?;
        }
        Ok(())
    }
}
