use std::collections::HashSet;
use std::fmt;

use log::debug;
use thiserror::Error;

use crate::model::{Constraint, ConstraintOp, Model, ModelError, Objective, Sense, Variable, VariableType};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Invalid model: {0}")]
    InvalidModel(#[from] ModelError),
    #[error("Model is not canonical after transformation: {0}")]
    NotCanonical(#[from] CanonicalViolation),
}

/// The canonical-form invariant that failed to hold
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalViolation {
    #[error("objective sense is not maximize")]
    NotMaximize,
    #[error("constraint {0} is not an equality")]
    NotEquality(String),
    #[error("constraint {constraint} has negative right-hand side {rhs}")]
    NegativeRhs { constraint: String, rhs: f64 },
    #[error("variable {0} is still unrestricted")]
    UnrestrictedVariable(String),
    #[error("{0}")]
    Structure(ModelError),
}

/// Naming of the variables introduced during canonicalization.
///
/// Split parts are named `name + suffix`; a name already in the model gets a
/// number appended (`x+1`). Only Unrestricted variables are split, so a
/// Continuous or Integer variable given an explicit negative lower bound keeps
/// it in the canonical model.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub slack_prefix: String,
    pub surplus_prefix: String,
    /// Used for the placeholder basic variables of equality rows
    pub artificial_prefix: String,
    pub positive_suffix: String,
    pub negative_suffix: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            slack_prefix: "s".to_string(),
            surplus_prefix: "e".to_string(),
            artificial_prefix: "a".to_string(),
            positive_suffix: "+".to_string(),
            negative_suffix: "-".to_string(),
        }
    }
}

impl TransformOptions {
    pub fn with_slack_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.slack_prefix = prefix.into();
        self
    }

    pub fn with_surplus_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.surplus_prefix = prefix.into();
        self
    }

    pub fn with_artificial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.artificial_prefix = prefix.into();
        self
    }

    pub fn with_split_suffixes(mut self, positive: impl Into<String>, negative: impl Into<String>) -> Self {
        self.positive_suffix = positive.into();
        self.negative_suffix = negative.into();
        self
    }
}

/// How an original variable is expressed in canonical variables
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableImage {
    /// Same name, same value
    Identity,
    /// `x = positive - negative` with both parts non-negative
    Split { positive: String, negative: String },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMapping {
    pub original: String,
    pub image: VariableImage,
}

impl VariableMapping {
    /// The canonical expression standing in for the original variable, e.g. `x1+ - x1-`
    pub fn expression(&self) -> String {
        match &self.image {
            VariableImage::Identity => self.original.clone(),
            VariableImage::Split { positive, negative } => format!("{} - {}", positive, negative),
        }
    }
}

impl fmt::Display for VariableMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.original, self.expression())
    }
}

/// Bookkeeping needed to translate canonical results back to the original model
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformMetadata {
    /// One entry per original variable, in original order
    pub variable_map: Vec<VariableMapping>,
    /// Slack names in the order their constraints were processed
    pub slack_variables: Vec<String>,
    /// Surplus names in the order their constraints were processed
    pub surplus_variables: Vec<String>,
    pub was_minimized: bool,
}

impl TransformMetadata {
    pub fn image_of(&self, original: &str) -> Option<&VariableImage> {
        self.variable_map
            .iter()
            .find(|m| m.original == original)
            .map(|m| &m.image)
    }

    pub fn num_synthetic(&self) -> usize {
        self.slack_variables.len() + self.surplus_variables.len()
    }
}

/// A canonical model together with the record of how it was derived
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct StandardForm {
    pub model: Model,
    pub metadata: TransformMetadata,
}

/// Rewrites models into canonical form: maximize, equalities with
/// non-negative right-hand sides, non-negative variables.
///
/// The caller's model is only read; every step consumes the previous
/// step's copy and returns a new one.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    options: TransformOptions,
}

impl Transformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TransformOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn transform(&self, model: &Model) -> Result<StandardForm, TransformError> {
        model.validate()?;

        let fresh = Model {
            solved: None,
            ..model.clone()
        };
        let (canonical, was_minimized) = normalize_objective(fresh);
        let (canonical, variable_map) = self.split_unrestricted(canonical);
        let canonical = normalize_rhs(canonical);
        let (canonical, slack_variables, surplus_variables) = self.add_slack_surplus(canonical);

        check_canonical(&canonical)?;

        debug!(
            "canonical form: {} variables ({} original), {} constraints, {} slack, {} surplus",
            canonical.num_variables(),
            model.num_variables(),
            canonical.num_constraints(),
            slack_variables.len(),
            surplus_variables.len()
        );

        Ok(StandardForm {
            model: canonical,
            metadata: TransformMetadata {
                variable_map,
                slack_variables,
                surplus_variables,
                was_minimized,
            },
        })
    }

    fn split_unrestricted(&self, model: Model) -> (Model, Vec<VariableMapping>) {
        let Model {
            variables,
            objective,
            constraints,
            solved,
        } = model;

        let mut new_variables = Vec::with_capacity(variables.len());
        let mut new_objective = Vec::with_capacity(variables.len());
        let mut rows: Vec<Vec<f64>> = vec![Vec::with_capacity(variables.len()); constraints.len()];
        let mut variable_map = Vec::with_capacity(variables.len());
        let mut taken: HashSet<String> = variables.iter().map(|v| v.name.clone()).collect();

        for (j, var) in variables.into_iter().enumerate() {
            let cost = objective.coefficients[j];

            if var.var_type != VariableType::Unrestricted {
                new_objective.push(cost);
                for (row, c) in rows.iter_mut().zip(&constraints) {
                    row.push(c.coefficients[j]);
                }
                variable_map.push(VariableMapping {
                    original: var.name.clone(),
                    image: VariableImage::Identity,
                });
                new_variables.push(var);
                continue;
            }

            let positive = unique_name(format!("{}{}", var.name, self.options.positive_suffix), &mut taken);
            let negative = unique_name(format!("{}{}", var.name, self.options.negative_suffix), &mut taken);

            new_objective.push(cost);
            new_objective.push(-cost);
            for (row, c) in rows.iter_mut().zip(&constraints) {
                row.push(c.coefficients[j]);
                row.push(-c.coefficients[j]);
            }

            new_variables.push(Variable::continuous(positive.clone()));
            new_variables.push(Variable::continuous(negative.clone()));
            variable_map.push(VariableMapping {
                original: var.name,
                image: VariableImage::Split { positive, negative },
            });
        }

        let split = new_variables.len() - variable_map.len();
        if split > 0 {
            debug!("split {} unrestricted variables", split);
        }

        let constraints = constraints
            .into_iter()
            .zip(rows)
            .map(|(c, coefficients)| Constraint { coefficients, ..c })
            .collect();

        let model = Model {
            variables: new_variables,
            objective: Objective {
                coefficients: new_objective,
                sense: objective.sense,
            },
            constraints,
            solved,
        };
        (model, variable_map)
    }

    /// Append one slack (`<=`) or surplus (`>=`) column per inequality row
    /// and turn every row into an equality.
    fn add_slack_surplus(&self, model: Model) -> (Model, Vec<String>, Vec<String>) {
        let Model {
            mut variables,
            mut objective,
            constraints,
            solved,
        } = model;

        let mut taken: HashSet<String> = variables.iter().map(|v| v.name.clone()).collect();
        let mut slack_count = 0;
        let mut surplus_count = 0;
        let mut slack_variables = Vec::new();
        let mut surplus_variables = Vec::new();

        // Column offset and sign of the synthetic variable owned by each row
        let mut owned: Vec<Option<(usize, f64)>> = Vec::with_capacity(constraints.len());
        let first_synthetic = variables.len();

        for c in &constraints {
            let (name, sign) = match c.op {
                ConstraintOp::Le => {
                    let name = fresh_name(&self.options.slack_prefix, &mut slack_count, &mut taken);
                    slack_variables.push(name.clone());
                    (name, 1.0)
                }
                ConstraintOp::Ge => {
                    let name = fresh_name(&self.options.surplus_prefix, &mut surplus_count, &mut taken);
                    surplus_variables.push(name.clone());
                    (name, -1.0)
                }
                // A Phase I method needs an artificial here; only its basis slot is reserved
                ConstraintOp::Eq => {
                    owned.push(None);
                    continue;
                }
            };
            owned.push(Some((variables.len() - first_synthetic, sign)));
            variables.push(Variable::continuous(name));
            objective.coefficients.push(0.0);
        }

        let added = variables.len() - first_synthetic;
        let constraints = constraints
            .into_iter()
            .zip(owned)
            .map(|(mut c, slot)| {
                c.coefficients.resize(first_synthetic + added, 0.0);
                if let Some((offset, sign)) = slot {
                    c.coefficients[first_synthetic + offset] = sign;
                }
                c.op = ConstraintOp::Eq;
                c
            })
            .collect();

        debug!("added {} slack and {} surplus variables", slack_variables.len(), surplus_variables.len());

        let model = Model {
            variables,
            objective,
            constraints,
            solved,
        };
        (model, slack_variables, surplus_variables)
    }
}

/// Turn a minimization into the equivalent maximization
fn normalize_objective(mut model: Model) -> (Model, bool) {
    let was_minimized = model.objective.sense == Sense::Minimize;
    if was_minimized {
        for c in &mut model.objective.coefficients {
            *c = -*c;
        }
        model.objective.sense = Sense::Maximize;
        debug!("negated objective to convert minimize into maximize");
    }
    (model, was_minimized)
}

/// Multiply every row with a negative right-hand side by -1
fn normalize_rhs(mut model: Model) -> Model {
    let mut flipped = 0;
    for c in &mut model.constraints {
        if c.rhs < 0.0 {
            for a in &mut c.coefficients {
                *a = -*a;
            }
            c.rhs = -c.rhs;
            c.op = c.op.flipped();
            flipped += 1;
        }
    }
    if flipped > 0 {
        debug!("flipped {} constraints with negative right-hand side", flipped);
    }
    model
}

/// Next `<prefix><k>` not already used by the model
pub(crate) fn fresh_name(prefix: &str, counter: &mut usize, taken: &mut HashSet<String>) -> String {
    loop {
        *counter += 1;
        let name = format!("{}{}", prefix, counter);
        if taken.insert(name.clone()) {
            return name;
        }
    }
}

/// `candidate` itself, or `candidate` followed by the first free number
fn unique_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let mut counter = 0;
    fresh_name(&candidate, &mut counter, taken)
}

/// Checks sign handling only: variable bounds other than the type defaults
/// (for example a continuous `x >= -3`) are carried through untouched and
/// are not turned into rows or rejected here.
pub(crate) fn check_canonical(model: &Model) -> Result<(), CanonicalViolation> {
    if model.objective.sense != Sense::Maximize {
        return Err(CanonicalViolation::NotMaximize);
    }
    for c in &model.constraints {
        if c.op != ConstraintOp::Eq {
            return Err(CanonicalViolation::NotEquality(c.name.clone()));
        }
        if c.rhs < 0.0 {
            return Err(CanonicalViolation::NegativeRhs {
                constraint: c.name.clone(),
                rhs: c.rhs,
            });
        }
    }
    if let Some(v) = model.variables.iter().find(|v| v.var_type == VariableType::Unrestricted) {
        return Err(CanonicalViolation::UnrestrictedVariable(v.name.clone()));
    }
    model.validate().map_err(CanonicalViolation::Structure)
}
