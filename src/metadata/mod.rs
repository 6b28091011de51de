//! Method metadata and the constant pool resolution interface.
//!
//! # Key Components
//!
//! - [`ValueKind`] - Kinds of stack values, fields, array elements and results
//! - [`MethodInfo`] / [`MethodFlags`] - Declared shape of the method being compiled
//! - [`MetadataResolver`] - Lookup interface for constants, fields, methods and types
//! - [`StaticResolver`] - In-memory implementation of the lookup interface

mod kind;
mod method;
mod resolver;

pub use kind::ValueKind;
pub use method::{MethodFlags, MethodInfo};
pub use resolver::{
    ConstantEntry, FieldAccess, FieldFlags, InvokeKind, MetadataResolver, ResolvedField,
    ResolvedMethod, StaticResolver, TypeDesc,
};
