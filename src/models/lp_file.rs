//! Writes problems in CPLEX LP format, for inspection or for solving elsewhere.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use good_lp::{Expression, IntoAffineExpression};

use super::milp::{MilpProblem, SolverError, VarKind};

impl MilpProblem {
    /// Writes the problem in CPLEX LP format. Terms follow the order in which the
    /// variables were created, so the same problem always gives the same text.
    pub fn write_lp<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "\\ Model {}", self.name())?;
        writeln!(w, "Minimize")?;
        write!(w, " obj:")?;
        self.write_expr(w, self.objective())?;
        let constant = self.objective().constant();
        if constant != 0.0 {
            write!(w, " + {}", constant)?;
        }
        writeln!(w)?;

        writeln!(w, "Subject To")?;
        for (name, constr) in self.constraints() {
            write!(w, " {}:", name)?;
            self.write_expr(w, &constr.expr)?;
            writeln!(w, " {} {}", constr.sense, constr.rhs())?;
        }

        let bounded: Vec<_> = self
            .columns()
            .iter()
            .filter_map(|(_, info)| match info.kind {
                VarKind::Continuous { lb, ub } if lb != 0.0 || ub != f64::INFINITY => {
                    Some((info, lb, ub))
                }
                _ => None,
            })
            .collect();
        if !bounded.is_empty() {
            writeln!(w, "Bounds")?;
            for (info, lb, ub) in bounded {
                writeln!(w, " {} <= {} <= {}", bound(lb), info.name, bound(ub))?;
            }
        }

        let binaries: Vec<&str> = self
            .columns()
            .iter()
            .filter(|(_, info)| info.kind == VarKind::Binary)
            .map(|(_, info)| info.name.as_str())
            .collect();
        if !binaries.is_empty() {
            writeln!(w, "Binaries")?;
            for chunk in binaries.chunks(8) {
                writeln!(w, " {}", chunk.join(" "))?;
            }
        }

        writeln!(w, "End")
    }

    /// Writes the problem to `path`, in LP format
    pub fn write(&self, path: &Path) -> Result<(), SolverError> {
        let io = |e: std::io::Error| SolverError::Failure(format!("{}: {}", path.display(), e));
        let mut w = BufWriter::new(File::create(path).map_err(io)?);
        self.write_lp(&mut w).map_err(io)?;
        w.flush().map_err(io)
    }

    fn write_expr<W: Write>(&self, w: &mut W, expr: &Expression) -> std::io::Result<()> {
        let terms = self.terms(expr);
        if terms.is_empty() {
            return write!(w, " 0");
        }

        for (k, &(var, coeff)) in terms.iter().enumerate() {
            // LP readers limit the line length
            if k > 0 && k % 8 == 0 {
                write!(w, "\n  ")?;
            }
            let name = self.var_name(var);
            let sign = if coeff < 0.0 { "-" } else { "+" };
            let magnitude = coeff.abs();
            match (k, magnitude == 1.0) {
                (0, true) if coeff > 0.0 => write!(w, " {}", name)?,
                (0, false) if coeff > 0.0 => write!(w, " {} {}", magnitude, name)?,
                (_, true) => write!(w, " {} {}", sign, name)?,
                (_, false) => write!(w, " {} {} {}", sign, magnitude, name)?,
            }
        }

        Ok(())
    }
}

fn bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}
