use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::backmap::OriginalSolution;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Model has no variables")]
    NoVariables,
    #[error("Variable at position {0} has an empty name")]
    EmptyVariableName(usize),
    #[error("Duplicate variable name: {0}")]
    DuplicateVariable(String),
    #[error("Objective has {found} coefficients but the model has {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {constraint} has {found} coefficients but the model has {expected} variables")]
    ConstraintLength {
        constraint: String,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite coefficient {value} in {location}")]
    NonFiniteCoefficient { location: String, value: f64 },
    #[error("Constraint {constraint} has non-finite right-hand side {rhs}")]
    NonFiniteRhs { constraint: String, rhs: f64 },
    #[error("Variable {variable} has invalid bounds [{lower}, {upper}] for type {var_type}")]
    InvalidBounds {
        variable: String,
        var_type: VariableType,
        lower: f64,
        upper: f64,
    },
}

/// Domain restriction of a variable
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    Continuous,
    Integer,
    Binary,
    /// Free in sign, split into two non-negative parts during canonicalization
    Unrestricted,
}

impl VariableType {
    /// Bounds a variable receives when it is given this type
    pub fn default_bounds(self) -> (f64, f64) {
        match self {
            VariableType::Continuous | VariableType::Integer => (0.0, f64::INFINITY),
            VariableType::Binary => (0.0, 1.0),
            VariableType::Unrestricted => (f64::NEG_INFINITY, f64::INFINITY),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableType::Continuous => "continuous",
            VariableType::Integer => "integer",
            VariableType::Binary => "binary",
            VariableType::Unrestricted => "unrestricted",
        };
        f.write_str(name)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "wire::VariableRepr"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Unique identifier, kept stable through the pipeline
    pub name: String,
    pub var_type: VariableType,
    #[cfg_attr(feature = "serde", serde(serialize_with = "wire::bound"))]
    pub lower: f64,
    #[cfg_attr(feature = "serde", serde(serialize_with = "wire::bound"))]
    pub upper: f64,
    /// Value assigned after a solve step
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub value: Option<f64>,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: VariableType) -> Self {
        let (lower, upper) = var_type.default_bounds();
        Self {
            name: name.into(),
            var_type,
            lower,
            upper,
            value: None,
        }
    }

    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Continuous)
    }

    pub fn unrestricted(name: impl Into<String>) -> Self {
        Self::new(name, VariableType::Unrestricted)
    }

    /// Override the type's default bounds
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Assign a new type, resetting the bounds to that type's defaults
    pub fn set_type(&mut self, var_type: VariableType) {
        let (lower, upper) = var_type.default_bounds();
        self.var_type = var_type;
        self.lower = lower;
        self.upper = upper;
    }

    fn validate(&self) -> Result<(), ModelError> {
        let consistent = match self.var_type {
            VariableType::Binary => self.lower >= 0.0 && self.upper <= 1.0,
            // Splitting into two non-negative parts only preserves a free domain
            VariableType::Unrestricted => self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY,
            _ => true,
        };
        if self.lower.is_nan() || self.upper.is_nan() || self.lower > self.upper || !consistent {
            return Err(ModelError::InvalidBounds {
                variable: self.name.clone(),
                var_type: self.var_type,
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    #[cfg_attr(feature = "serde", serde(rename = "<="))]
    Le,
    /// Greater than or equal (>=)
    #[cfg_attr(feature = "serde", serde(rename = ">="))]
    Ge,
    /// Equal (=)
    #[cfg_attr(feature = "serde", serde(rename = "="))]
    Eq,
}

impl ConstraintOp {
    /// The relation obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl fmt::Display for ConstraintOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ConstraintOp::Le => "<=",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Eq => "=",
        };
        f.write_str(symbol)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// One coefficient per model variable
    pub coefficients: Vec<f64>,
    pub op: ConstraintOp,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) -> Self {
        Self {
            name: name.into(),
            coefficients,
            op,
            rhs,
        }
    }

    /// Check this constraint against the variable count of its model
    pub fn validate(&self, num_variables: usize) -> Result<(), ModelError> {
        if self.coefficients.len() != num_variables {
            return Err(ModelError::ConstraintLength {
                constraint: self.name.clone(),
                expected: num_variables,
                found: self.coefficients.len(),
            });
        }
        if let Some(&value) = self.coefficients.iter().find(|c| !c.is_finite()) {
            return Err(ModelError::NonFiniteCoefficient {
                location: format!("constraint {}", self.name),
                value,
            });
        }
        if !self.rhs.is_finite() {
            return Err(ModelError::NonFiniteRhs {
                constraint: self.name.clone(),
                rhs: self.rhs,
            });
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    Maximize,
    Minimize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    pub sense: Sense,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveStatus {
    #[default]
    Unknown,
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

/// Outcome recorded on a model once a solution has been mapped back to it
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedState {
    pub status: SolveStatus,
    pub optimal_value: f64,
    pub solution: BTreeMap<String, f64>,
}

/// A linear or integer program in user form
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub variables: Vec<Variable>,
    pub objective: Objective,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Vec<Constraint>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub solved: Option<SolvedState>,
}

impl Model {
    /// An empty model; the objective is all zeros until `set_objective`
    pub fn new(sense: Sense) -> Self {
        Self {
            variables: Vec::new(),
            objective: Objective {
                coefficients: Vec::new(),
                sense,
            },
            constraints: Vec::new(),
            solved: None,
        }
    }

    /// Append a variable with a zero objective coefficient
    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.push(variable);
        self.objective.coefficients.push(0.0);
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, sense: Sense) {
        self.objective = Objective { coefficients, sense };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint::new(name, coefficients, op, rhs));
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    /// Check the structural invariants every stage of the pipeline relies on
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.num_variables();
        if n == 0 {
            return Err(ModelError::NoVariables);
        }

        let mut seen = HashSet::with_capacity(n);
        for (i, v) in self.variables.iter().enumerate() {
            if v.name.is_empty() {
                return Err(ModelError::EmptyVariableName(i));
            }
            if !seen.insert(v.name.as_str()) {
                return Err(ModelError::DuplicateVariable(v.name.clone()));
            }
            v.validate()?;
        }

        if self.objective.coefficients.len() != n {
            return Err(ModelError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        if let Some(&value) = self.objective.coefficients.iter().find(|c| !c.is_finite()) {
            return Err(ModelError::NonFiniteCoefficient {
                location: "objective".to_string(),
                value,
            });
        }

        for c in &self.constraints {
            c.validate(n)?;
        }
        Ok(())
    }

    /// Record a solved state and write each variable's current value
    pub fn apply_solution(&mut self, status: SolveStatus, solution: &OriginalSolution) {
        for v in &mut self.variables {
            v.value = solution.values.get(&v.name).copied();
        }
        self.solved = Some(SolvedState {
            status,
            optimal_value: solution.objective_value,
            solution: solution.values.clone(),
        });
    }
}

/// Writes `c1 x1 + c2 x2 ...`, skipping zero terms
fn write_linear(f: &mut fmt::Formatter<'_>, coefficients: &[f64], variables: &[Variable]) -> fmt::Result {
    let mut first = true;
    for (coef, var) in coefficients.iter().zip(variables) {
        if *coef == 0.0 {
            continue;
        }
        if first {
            write!(f, "{} {}", coef, var.name)?;
            first = false;
        } else if *coef < 0.0 {
            write!(f, " - {} {}", -coef, var.name)?;
        } else {
            write!(f, " + {} {}", coef, var.name)?;
        }
    }
    if first {
        f.write_str("0")?;
    }
    Ok(())
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sense = match self.objective.sense {
            Sense::Maximize => "max",
            Sense::Minimize => "min",
        };
        write!(f, "{}: ", sense)?;
        write_linear(f, &self.objective.coefficients, &self.variables)?;
        writeln!(f)?;

        if !self.constraints.is_empty() {
            writeln!(f, "subject to")?;
        }
        for c in &self.constraints {
            write!(f, "  {}: ", c.name)?;
            write_linear(f, &c.coefficients, &self.variables)?;
            writeln!(f, " {} {}", c.op, c.rhs)?;
        }

        for v in &self.variables {
            match v.var_type {
                VariableType::Unrestricted => writeln!(f, "  {} free", v.name)?,
                _ => writeln!(f, "  {} <= {} <= {} ({})", v.lower, v.name, v.upper, v.var_type)?,
            }
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
mod wire {
    use super::{Variable, VariableType};

    /// A bound on the wire: a number, or `"inf"` / `"-inf"` since JSON has no infinity
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Bound {
        Finite(f64),
        Named(String),
    }

    impl Bound {
        fn value(self) -> Result<f64, String> {
            match self {
                Bound::Finite(v) => Ok(v),
                Bound::Named(name) => match name.as_str() {
                    "inf" | "+inf" => Ok(f64::INFINITY),
                    "-inf" => Ok(f64::NEG_INFINITY),
                    _ => Err(format!("invalid bound {:?}, expected a number, \"inf\" or \"-inf\"", name)),
                },
            }
        }
    }

    /// Wire shape of a variable; missing or null bounds take the type's defaults
    #[derive(serde::Deserialize)]
    pub(super) struct VariableRepr {
        name: String,
        var_type: VariableType,
        #[serde(default)]
        lower: Option<Bound>,
        #[serde(default)]
        upper: Option<Bound>,
        #[serde(default)]
        value: Option<f64>,
    }

    impl TryFrom<VariableRepr> for Variable {
        type Error = String;

        fn try_from(repr: VariableRepr) -> Result<Self, Self::Error> {
            let mut variable = Variable::new(repr.name, repr.var_type);
            if let Some(lower) = repr.lower {
                variable.lower = lower.value()?;
            }
            if let Some(upper) = repr.upper {
                variable.upper = upper.value()?;
            }
            variable.value = repr.value;
            Ok(variable)
        }
    }

    /// Infinite bounds are written as `"inf"` / `"-inf"` so the sign survives
    pub(super) fn bound<S: serde::Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else if *value < 0.0 {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_variable_model() -> Model {
        let mut model = Model::new(Sense::Minimize);
        model.add_variable(Variable::continuous("x1"));
        model.add_variable(Variable::continuous("x2"));
        model.set_objective(vec![-2.0, -3.0], Sense::Minimize);
        model.add_constraint("c1", vec![1.0, 1.0], ConstraintOp::Le, 4.0);
        model
    }

    #[test]
    fn test_type_default_bounds() {
        let x = Variable::new("x", VariableType::Binary);
        assert_eq!((x.lower, x.upper), (0.0, 1.0));

        let y = Variable::unrestricted("y");
        assert_eq!(y.lower, f64::NEG_INFINITY);
        assert_eq!(y.upper, f64::INFINITY);

        let mut z = Variable::continuous("z").with_bounds(2.0, 5.0);
        assert_eq!((z.lower, z.upper), (2.0, 5.0));
        z.set_type(VariableType::Integer);
        assert_eq!((z.lower, z.upper), (0.0, f64::INFINITY));
    }

    #[test]
    fn test_valid_model() {
        assert_eq!(two_variable_model().validate(), Ok(()));
    }

    #[test]
    fn test_empty_model_is_invalid() {
        let model = Model::new(Sense::Maximize);
        assert_eq!(model.validate(), Err(ModelError::NoVariables));
    }

    #[test]
    fn test_constraint_length_mismatch() {
        let mut model = two_variable_model();
        model.add_constraint("short", vec![1.0], ConstraintOp::Ge, 1.0);
        assert_eq!(
            model.validate(),
            Err(ModelError::ConstraintLength {
                constraint: "short".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_objective_length_mismatch() {
        let mut model = two_variable_model();
        model.objective.coefficients.push(1.0);
        assert_eq!(
            model.validate(),
            Err(ModelError::ObjectiveLength { expected: 2, found: 3 })
        );
    }

    #[test]
    fn test_duplicate_variable() {
        let mut model = two_variable_model();
        model.add_variable(Variable::continuous("x1"));
        for c in &mut model.constraints {
            c.coefficients.push(0.0);
        }
        assert_eq!(model.validate(), Err(ModelError::DuplicateVariable("x1".to_string())));
    }

    #[test]
    fn test_binary_bounds_must_stay_in_unit_interval() {
        let mut model = two_variable_model();
        model.variables[0] = Variable::new("x1", VariableType::Binary).with_bounds(0.0, 2.0);
        assert!(matches!(model.validate(), Err(ModelError::InvalidBounds { .. })));
    }

    #[test]
    fn test_unrestricted_bounds_must_stay_free() {
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::unrestricted("x").with_bounds(-5.0, 5.0));
        model.add_constraint("cap", vec![1.0], ConstraintOp::Le, 100.0);
        assert_eq!(
            model.validate(),
            Err(ModelError::InvalidBounds {
                variable: "x".to_string(),
                var_type: VariableType::Unrestricted,
                lower: -5.0,
                upper: 5.0,
            })
        );

        model.variables[0].set_type(VariableType::Unrestricted);
        assert_eq!(model.validate(), Ok(()));
    }

    #[test]
    fn test_non_finite_rhs() {
        let mut model = two_variable_model();
        model.constraints[0].rhs = f64::NAN;
        assert!(matches!(model.validate(), Err(ModelError::NonFiniteRhs { .. })));
    }

    #[test]
    fn test_clone_is_deep() {
        let original = two_variable_model();
        let mut copy = original.clone();
        copy.constraints[0].coefficients[0] = 7.0;
        copy.variables[0].name = "renamed".to_string();
        assert_eq!(original.constraints[0].coefficients[0], 1.0);
        assert_eq!(original.variables[0].name, "x1");
    }

    #[test]
    fn test_flipped_relation() {
        assert_eq!(ConstraintOp::Le.flipped(), ConstraintOp::Ge);
        assert_eq!(ConstraintOp::Ge.flipped(), ConstraintOp::Le);
        assert_eq!(ConstraintOp::Eq.flipped(), ConstraintOp::Eq);
    }

    #[test]
    fn test_display() {
        let text = two_variable_model().to_string();
        assert!(text.starts_with("min: -2 x1 - 3 x2\n"), "{}", text);
        assert!(text.contains("  c1: 1 x1 + 1 x2 <= 4\n"), "{}", text);
    }

    #[test]
    fn test_apply_solution() {
        let mut model = two_variable_model();
        let mut values = BTreeMap::new();
        values.insert("x1".to_string(), 4.0);
        values.insert("x2".to_string(), 0.0);
        let solution = OriginalSolution {
            objective_value: -8.0,
            values,
        };

        model.apply_solution(SolveStatus::Optimal, &solution);

        assert_eq!(model.variables[0].value, Some(4.0));
        assert_eq!(model.variables[1].value, Some(0.0));
        let solved = model.solved.as_ref().unwrap();
        assert_eq!(solved.status, SolveStatus::Optimal);
        assert_eq!(solved.optimal_value, -8.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_bounds_default_by_type() {
        let json = r#"{
            "variables": [
                { "name": "x", "var_type": "continuous" },
                { "name": "y", "var_type": "unrestricted" },
                { "name": "z", "var_type": "integer", "lower": 1, "upper": null }
            ],
            "objective": { "coefficients": [1, 2, 3], "sense": "maximize" },
            "constraints": [
                { "name": "c1", "coefficients": [1, 1, 1], "op": "<=", "rhs": 10 }
            ]
        }"#;
        let model: Model = serde_json::from_str(json).unwrap();
        assert_eq!(model.validate(), Ok(()));
        assert_eq!(model.variables[0].upper, f64::INFINITY);
        assert_eq!(model.variables[1].lower, f64::NEG_INFINITY);
        assert_eq!((model.variables[2].lower, model.variables[2].upper), (1.0, f64::INFINITY));
        assert_eq!(model.constraints[0].op, ConstraintOp::Le);

        let written = serde_json::to_string(&model).unwrap();
        let reread: Model = serde_json::from_str(&written).unwrap();
        assert_eq!(reread, model);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_keeps_sign_of_infinite_bounds() {
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::continuous("x").with_bounds(f64::NEG_INFINITY, 3.0));
        model.add_variable(Variable::new("k", VariableType::Integer));

        let written = serde_json::to_string(&model).unwrap();
        assert!(written.contains(r#""lower":"-inf""#), "{}", written);
        assert!(written.contains(r#""upper":"inf""#), "{}", written);

        let reread: Model = serde_json::from_str(&written).unwrap();
        assert_eq!(reread.variables[0].lower, f64::NEG_INFINITY);
        assert_eq!(reread.variables[0].upper, 3.0);
        assert_eq!(reread.variables[1].upper, f64::INFINITY);
        assert_eq!(reread, model);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_rejects_unknown_bound_text() {
        let json = r#"{ "name": "x", "var_type": "continuous", "lower": "minus infinity" }"#;
        assert!(serde_json::from_str::<Variable>(json).is_err());
    }
}
