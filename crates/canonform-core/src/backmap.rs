use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::model::Model;
use crate::transform::{StandardForm, TransformMetadata, VariableImage};

/// Reserved key carrying the objective value in a canonical solution
pub const OBJECTIVE_VALUE_KEY: &str = "ObjectiveValue";

/// Values of canonical variables, keyed by name
pub type CanonicalSolution = HashMap<String, f64>;

/// A solution expressed in the user's original variables and objective sense
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OriginalSolution {
    pub objective_value: f64,
    pub values: BTreeMap<String, f64>,
}

impl OriginalSolution {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Absent entries are variables at zero in a basic solution
fn lookup(solution: &CanonicalSolution, name: &str) -> f64 {
    solution.get(name).copied().unwrap_or(0.0)
}

/// Translates canonical solutions back through a transformation's metadata
#[derive(Debug, Clone, Copy)]
pub struct SolutionBackMapper<'a> {
    metadata: &'a TransformMetadata,
}

impl<'a> SolutionBackMapper<'a> {
    pub fn new(metadata: &'a TransformMetadata) -> Self {
        Self { metadata }
    }

    /// Objective value in the original sense
    pub fn objective_value(&self, solution: &CanonicalSolution) -> f64 {
        let value = lookup(solution, OBJECTIVE_VALUE_KEY);
        if self.metadata.was_minimized { -value } else { value }
    }

    pub fn variable_value(&self, name: &str, solution: &CanonicalSolution) -> f64 {
        match self.metadata.image_of(name) {
            Some(VariableImage::Identity) => lookup(solution, name),
            Some(VariableImage::Split { positive, negative }) => {
                lookup(solution, positive) - lookup(solution, negative)
            }
            None => {
                debug!("variable {} has no mapping, reading it from the solution directly", name);
                lookup(solution, name)
            }
        }
    }

    /// Map `solution` onto exactly the given original variable names
    pub fn map<'n>(
        &self,
        original_variables: impl IntoIterator<Item = &'n str>,
        solution: &CanonicalSolution,
    ) -> OriginalSolution {
        let values = original_variables
            .into_iter()
            .map(|name| (name.to_string(), self.variable_value(name, solution)))
            .collect();

        OriginalSolution {
            objective_value: self.objective_value(solution),
            values,
        }
    }

    pub fn map_model(&self, original: &Model, solution: &CanonicalSolution) -> OriginalSolution {
        self.map(original.variable_names(), solution)
    }
}

impl StandardForm {
    /// Map a solution of this canonical model back onto `original`
    pub fn back_map(&self, original: &Model, solution: &CanonicalSolution) -> OriginalSolution {
        SolutionBackMapper::new(&self.metadata).map_model(original, solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintOp, Sense, SolveStatus, Variable, VariableType};
    use crate::transform::{Transformer, VariableMapping};

    fn solution(entries: &[(&str, f64)]) -> CanonicalSolution {
        entries.iter().map(|&(k, v)| (k.to_string(), v)).collect()
    }

    fn scenario_b_metadata(was_minimized: bool) -> TransformMetadata {
        TransformMetadata {
            variable_map: vec![VariableMapping {
                original: "x1".to_string(),
                image: VariableImage::Split {
                    positive: "x1+".to_string(),
                    negative: "x1-".to_string(),
                },
            }],
            slack_variables: vec!["s1".to_string()],
            surplus_variables: Vec::new(),
            was_minimized,
        }
    }

    #[test]
    fn test_scenario_d_split_recombination() {
        let canonical = solution(&[("x1+", 4.0), ("x1-", 1.0), (OBJECTIVE_VALUE_KEY, 15.0)]);

        let metadata = scenario_b_metadata(false);
        let mapped = SolutionBackMapper::new(&metadata).map(["x1"], &canonical);
        assert_eq!(mapped.value("x1"), Some(3.0));
        assert_eq!(mapped.values.len(), 1);
        assert_eq!(mapped.objective_value, 15.0);

        let metadata = scenario_b_metadata(true);
        let mapped = SolutionBackMapper::new(&metadata).map(["x1"], &canonical);
        assert_eq!(mapped.value("x1"), Some(3.0));
        assert_eq!(mapped.objective_value, -15.0);
    }

    #[test]
    fn test_missing_entries_default_to_zero() {
        let metadata = scenario_b_metadata(false);
        let mapper = SolutionBackMapper::new(&metadata);

        let mapped = mapper.map(["x1"], &solution(&[("x1-", 2.0)]));
        assert_eq!(mapped.value("x1"), Some(-2.0));
        assert_eq!(mapped.objective_value, 0.0);

        let mapped = mapper.map(["x1"], &CanonicalSolution::new());
        assert_eq!(mapped.value("x1"), Some(0.0));
    }

    #[test]
    fn test_unmapped_variable_is_read_directly() {
        let metadata = scenario_b_metadata(false);
        let mapped = SolutionBackMapper::new(&metadata).map(["x1", "w"], &solution(&[("w", 7.0)]));
        assert_eq!(mapped.value("w"), Some(7.0));
        assert_eq!(mapped.value("x1"), Some(0.0));
    }

    #[test]
    fn test_only_original_variables_are_reported() {
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::continuous("x"));
        model.set_objective(vec![1.0], Sense::Maximize);
        model.add_constraint("cap", vec![1.0], ConstraintOp::Le, 2.0);

        let form = Transformer::new().transform(&model).unwrap();
        let mapped = form.back_map(&model, &solution(&[("x", 2.0), ("s1", 0.0)]));
        assert_eq!(mapped.values.keys().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_round_trip_through_transform() {
        // min x - 2y + 3z with y free
        let mut model = Model::new(Sense::Minimize);
        model.add_variable(Variable::continuous("x"));
        model.add_variable(Variable::unrestricted("y"));
        model.add_variable(Variable::new("z", VariableType::Integer));
        model.set_objective(vec![1.0, -2.0, 3.0], Sense::Minimize);
        model.add_constraint("le", vec![1.0, 1.0, 1.0], ConstraintOp::Le, 8.0);
        model.add_constraint("ge", vec![1.0, 0.0, -1.0], ConstraintOp::Ge, -6.0);

        let form = Transformer::new().transform(&model).unwrap();

        let intended = [("x", 1.5), ("y", -2.25), ("z", 4.0)];
        let original_objective: f64 = intended
            .iter()
            .zip(&model.objective.coefficients)
            .map(|((_, v), c)| v * c)
            .sum();

        // Any pair of parts with the right difference must map back the same
        let mut canonical = solution(&[("x", 1.5), ("y+", 0.75), ("y-", 3.0), ("z", 4.0)]);
        let canonical_objective: f64 = form
            .model
            .variables
            .iter()
            .zip(&form.model.objective.coefficients)
            .map(|(v, c)| c * lookup(&canonical, &v.name))
            .sum();
        canonical.insert(OBJECTIVE_VALUE_KEY.to_string(), canonical_objective);

        let mapped = form.back_map(&model, &canonical);
        for (name, value) in intended {
            let got = mapped.value(name).unwrap();
            assert!((got - value).abs() < 1e-9, "{} = {} (expected {})", name, got, value);
        }
        assert!(
            (mapped.objective_value - original_objective).abs() < 1e-9,
            "obj = {} (expected {})",
            mapped.objective_value,
            original_objective
        );
    }

    #[test]
    fn test_apply_back_mapped_solution() {
        let mut model = Model::new(Sense::Maximize);
        model.add_variable(Variable::unrestricted("x1"));
        model.set_objective(vec![5.0], Sense::Maximize);
        model.add_constraint("c1", vec![2.0], ConstraintOp::Le, 10.0);

        let form = Transformer::new().transform(&model).unwrap();
        let mapped = form.back_map(&model, &solution(&[("x1+", 5.0), (OBJECTIVE_VALUE_KEY, 25.0)]));
        model.apply_solution(SolveStatus::Optimal, &mapped);

        assert_eq!(model.variables[0].value, Some(5.0));
        assert_eq!(model.solved.map(|s| s.optimal_value), Some(25.0));
    }
}
