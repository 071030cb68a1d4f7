//! Field and operator registries.
//!
//! Only fields registered here may appear in an expression, and only
//! operators registered here may be used. Each field can narrow the operator
//! set further and constrain the values it accepts.

mod field;
mod operator;

pub use field::{FieldDescriptor, FieldRegistry, Join, JoinHook, OperatorList};
pub use operator::{Operator, OperatorHandler, OperatorRegistry};
