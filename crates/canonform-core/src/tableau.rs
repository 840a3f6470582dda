use std::collections::HashSet;

use thiserror::Error;

use crate::model::Model;
use crate::transform::{self, StandardForm, TransformError, TransformOptions, Transformer};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableauError {
    #[error("No canonical model available: transform or load a model first")]
    NotTransformed,
    #[error("Metadata lists {synthetic} slack/surplus variables but the model has only {variables} variables")]
    MetadataMismatch { synthetic: usize, variables: usize },
    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// Dense initial simplex tableau
///
/// Rows `0..m` are the constraints with the right-hand side in the last
/// column. Row `m` is the objective row holding `-c`, the reduced costs of a
/// maximization at the all-slack basis, with 0 in the right-hand side column.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    pub data: Vec<Vec<f64>>,
    /// Column labels, excluding the right-hand side column
    pub variable_names: Vec<String>,
    /// Row labels, excluding the objective row
    pub constraint_names: Vec<String>,
}

impl Tableau {
    pub fn nr_rows(&self) -> usize {
        self.data.len()
    }

    pub fn nr_columns(&self) -> usize {
        self.variable_names.len() + 1
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.data[row][column]
    }

    pub fn rhs_column(&self) -> usize {
        self.variable_names.len()
    }

    pub fn rhs(&self, row: usize) -> f64 {
        self.data[row][self.rhs_column()]
    }

    pub fn objective_row(&self) -> &[f64] {
        &self.data[self.constraint_names.len()]
    }
}

/// Holds the canonical form of one model and derives the initial tableau
/// and basis from it.
#[derive(Debug, Clone, Default)]
pub struct TableauBuilder {
    transformer: Transformer,
    standard_form: Option<StandardForm>,
}

impl TableauBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: TransformOptions) -> Self {
        Self {
            transformer: Transformer::with_options(options),
            standard_form: None,
        }
    }

    /// Canonicalize `model` and keep the result. On failure nothing is kept.
    pub fn transform(&mut self, model: &Model) -> Result<&StandardForm, TableauError> {
        self.standard_form = None;
        let form = self.transformer.transform(model)?;
        Ok(self.standard_form.insert(form))
    }

    /// Use a standard form produced elsewhere
    pub fn load(&mut self, form: StandardForm) -> Result<(), TableauError> {
        self.standard_form = None;
        transform::check_canonical(&form.model).map_err(TransformError::from)?;
        let synthetic = form.metadata.num_synthetic();
        if synthetic > form.model.num_variables() {
            return Err(TableauError::MetadataMismatch {
                synthetic,
                variables: form.model.num_variables(),
            });
        }
        self.standard_form = Some(form);
        Ok(())
    }

    pub fn standard_form(&self) -> Option<&StandardForm> {
        self.standard_form.as_ref()
    }

    pub fn into_standard_form(self) -> Option<StandardForm> {
        self.standard_form
    }

    fn loaded(&self) -> Result<&StandardForm, TableauError> {
        self.standard_form.as_ref().ok_or(TableauError::NotTransformed)
    }

    pub fn build(&self) -> Result<Tableau, TableauError> {
        let model = &self.loaded()?.model;
        let n = model.num_variables();
        let m = model.num_constraints();

        let mut data = vec![vec![0.0; n + 1]; m + 1];
        for (i, c) in model.constraints.iter().enumerate() {
            data[i][..n].copy_from_slice(&c.coefficients);
            data[i][n] = c.rhs;
        }
        for (j, &coef) in model.objective.coefficients.iter().enumerate() {
            data[m][j] = -coef;
        }

        Ok(Tableau {
            data,
            variable_names: model.variables.iter().map(|v| v.name.clone()).collect(),
            constraint_names: model.constraints.iter().map(|c| c.name.clone()).collect(),
        })
    }

    /// Slack and surplus names in creation order, then one artificial
    /// placeholder per equality row that owns neither.
    pub fn basic_variables(&self) -> Result<Vec<String>, TableauError> {
        let form = self.loaded()?;
        let model = &form.model;
        let synthetic = form.metadata.num_synthetic();

        let mut basic: Vec<String> = model.variables[model.num_variables() - synthetic..]
            .iter()
            .map(|v| v.name.clone())
            .collect();

        let artificial = model.num_constraints().saturating_sub(synthetic);
        let mut taken: HashSet<String> = model.variables.iter().map(|v| v.name.clone()).collect();
        let mut counter = 0;
        for _ in 0..artificial {
            basic.push(transform::fresh_name(
                &self.transformer.options().artificial_prefix,
                &mut counter,
                &mut taken,
            ));
        }
        Ok(basic)
    }

    /// Every variable that is not a slack or surplus, in column order
    pub fn non_basic_variables(&self) -> Result<Vec<String>, TableauError> {
        let form = self.loaded()?;
        let structural = form.model.num_variables() - form.metadata.num_synthetic();
        Ok(form.model.variables[..structural]
            .iter()
            .map(|v| v.name.clone())
            .collect())
    }
}
