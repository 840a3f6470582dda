mod backmap;
mod model;
mod tableau;
mod transform;

pub use backmap::{CanonicalSolution, OBJECTIVE_VALUE_KEY, OriginalSolution, SolutionBackMapper};
pub use model::{
    Constraint, ConstraintOp, Model, ModelError, Objective, Sense, SolveStatus, SolvedState, Variable, VariableType,
};
pub use tableau::{Tableau, TableauBuilder, TableauError};
pub use transform::{
    CanonicalViolation, StandardForm, TransformError, TransformMetadata, TransformOptions, Transformer, VariableImage,
    VariableMapping,
};
