//! Resolution of constant pool references against program metadata.
//!
//! The HIR builder never interprets constant pool indices itself. Every `ldc`, field
//! access, invocation and type operand is handed to a [`MetadataResolver`], which answers
//! with the kind, layout and flags the builder needs. Lookups are synchronous and any
//! failure aborts the build.
//!
//! [`StaticResolver`] is a plain in-memory table implementing the trait. It is what the
//! CLI, the tests and the benchmarks use; a runtime would implement the trait over its
//! own class metadata.

use std::{collections::HashMap, fmt};

use bitflags::bitflags;

use crate::{hir::ConstValue, metadata::ValueKind, Error, Result};

bitflags! {
    /// Attributes of a resolved field that influence translation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldFlags: u16 {
        /// Static field, accessed through its holder
        const STATIC = 0x0008;
        /// Final field; writing one in a constructor requires a barrier before returning
        const FINAL = 0x0010;
        /// Volatile field; loads are never value numbered
        const VOLATILE = 0x0040;
    }
}

/// A type descriptor as found in the constant pool, e.g. `java/lang/String` or `[I`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeDesc(String);

impl TypeDesc {
    /// Creates a descriptor from its internal name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        TypeDesc(name.into())
    }

    /// The internal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `true` for array descriptors.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A constant pool entry as seen by `ldc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstantEntry {
    /// A loadable constant
    Value(ConstValue),
    /// An entry that exists but cannot be pushed (member references, name-and-type, ...)
    Unloadable(String),
}

/// How a field is accessed by the operation being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldAccess {
    /// `getfield`
    GetField,
    /// `putfield`
    PutField,
    /// `getstatic`
    GetStatic,
    /// `putstatic`
    PutStatic,
}

impl FieldAccess {
    /// Returns `true` for `getstatic` and `putstatic`.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(self, FieldAccess::GetStatic | FieldAccess::PutStatic)
    }

    /// Returns `true` for `putfield` and `putstatic`.
    #[must_use]
    pub const fn is_store(self) -> bool {
        matches!(self, FieldAccess::PutField | FieldAccess::PutStatic)
    }

    /// Instruction set mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            FieldAccess::GetField => "getfield",
            FieldAccess::PutField => "putfield",
            FieldAccess::GetStatic => "getstatic",
            FieldAccess::PutStatic => "putstatic",
        }
    }
}

/// Dispatch flavour of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// `invokevirtual`
    Virtual,
    /// `invokespecial`
    Special,
    /// `invokestatic`
    Static,
    /// `invokeinterface`
    Interface,
}

impl InvokeKind {
    /// Returns `true` if a receiver is popped below the arguments.
    #[must_use]
    pub const fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }

    /// Instruction set mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            InvokeKind::Virtual => "invokevirtual",
            InvokeKind::Special => "invokespecial",
            InvokeKind::Static => "invokestatic",
            InvokeKind::Interface => "invokeinterface",
        }
    }
}

/// A field reference resolved to its layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedField {
    /// Declaring type
    pub holder: TypeDesc,
    /// Simple name
    pub name: String,
    /// Declared kind (sub-integer kinds are kept; the builder decays them on load)
    pub kind: ValueKind,
    /// Byte offset within the instance (or static storage)
    pub offset: u32,
    /// Field attributes
    pub flags: FieldFlags,
}

impl ResolvedField {
    /// Returns `true` if the field is `volatile`.
    #[must_use]
    pub fn is_volatile(&self) -> bool {
        self.flags.contains(FieldFlags::VOLATILE)
    }

    /// Returns `true` if the field is `final`.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(FieldFlags::FINAL)
    }
}

impl fmt::Display for ResolvedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}@{}", self.holder, self.name, self.kind, self.offset)
    }
}

/// A method reference resolved to its signature and target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedMethod {
    /// Declaring type
    pub holder: TypeDesc,
    /// Simple name
    pub name: String,
    /// Declared parameter kinds, receiver excluded
    pub params: Vec<ValueKind>,
    /// Declared return kind
    pub return_kind: ValueKind,
}

impl fmt::Display for ResolvedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.holder, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.return_kind)
    }
}

/// Answers constant pool lookups for the HIR builder.
///
/// Implementations must be deterministic for the duration of one build. Errors are
/// propagated unchanged and abort the build.
pub trait MetadataResolver {
    /// Resolves the constant pool entry at `index` for `ldc`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the entry does not exist.
    fn resolve_constant(&self, index: u16) -> Result<ConstantEntry>;

    /// Resolves the field reference at `index` for the given access.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the entry does not exist or its static-ness does not
    /// match `access`.
    fn resolve_field(&self, index: u16, access: FieldAccess) -> Result<ResolvedField>;

    /// Resolves the method reference at `index` for the given invocation kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the entry does not exist.
    fn resolve_method(&self, index: u16, kind: InvokeKind) -> Result<ResolvedMethod>;

    /// Resolves the type reference at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Metadata`] if the entry does not exist.
    fn resolve_type(&self, index: u16) -> Result<TypeDesc>;
}

/// An in-memory constant pool.
///
/// # Examples
///
/// ```rust,ignore
/// use hirforge::metadata::{FieldFlags, StaticResolver, ValueKind};
///
/// let mut pool = StaticResolver::new();
/// pool.add_field(1, "Point", "x", ValueKind::Int, 8, FieldFlags::FINAL);
/// pool.add_type(2, "Point");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    constants: HashMap<u16, ConstantEntry>,
    fields: HashMap<u16, ResolvedField>,
    methods: HashMap<u16, ResolvedMethod>,
    types: HashMap<u16, TypeDesc>,
}

impl StaticResolver {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constant entry.
    pub fn add_constant(&mut self, index: u16, entry: ConstantEntry) -> &mut Self {
        self.constants.insert(index, entry);
        self
    }

    /// Registers a field reference.
    pub fn add_field(
        &mut self,
        index: u16,
        holder: &str,
        name: &str,
        kind: ValueKind,
        offset: u32,
        flags: FieldFlags,
    ) -> &mut Self {
        self.fields.insert(
            index,
            ResolvedField {
                holder: TypeDesc::new(holder),
                name: name.to_string(),
                kind,
                offset,
                flags,
            },
        );
        self
    }

    /// Registers a method reference.
    pub fn add_method(
        &mut self,
        index: u16,
        holder: &str,
        name: &str,
        params: Vec<ValueKind>,
        return_kind: ValueKind,
    ) -> &mut Self {
        self.methods.insert(
            index,
            ResolvedMethod {
                holder: TypeDesc::new(holder),
                name: name.to_string(),
                params,
                return_kind,
            },
        );
        self
    }

    /// Registers a type reference.
    pub fn add_type(&mut self, index: u16, name: &str) -> &mut Self {
        self.types.insert(index, TypeDesc::new(name));
        self
    }
}

impl MetadataResolver for StaticResolver {
    fn resolve_constant(&self, index: u16) -> Result<ConstantEntry> {
        self.constants
            .get(&index)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("no constant pool entry #{index}")))
    }

    fn resolve_field(&self, index: u16, access: FieldAccess) -> Result<ResolvedField> {
        let field = self
            .fields
            .get(&index)
            .ok_or_else(|| Error::Metadata(format!("no field reference #{index}")))?;

        if field.flags.contains(FieldFlags::STATIC) != access.is_static() {
            return Err(Error::Metadata(format!(
                "{} on field {} with mismatched static-ness",
                access.mnemonic(),
                field
            )));
        }

        Ok(field.clone())
    }

    fn resolve_method(&self, index: u16, _kind: InvokeKind) -> Result<ResolvedMethod> {
        self.methods
            .get(&index)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("no method reference #{index}")))
    }

    fn resolve_type(&self, index: u16) -> Result<TypeDesc> {
        self.types
            .get(&index)
            .cloned()
            .ok_or_else(|| Error::Metadata(format!("no type reference #{index}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_resolver_lookups() {
        let mut pool = StaticResolver::new();
        pool.add_constant(1, ConstantEntry::Value(ConstValue::Int(7)))
            .add_field(2, "Point", "x", ValueKind::Int, 12, FieldFlags::FINAL)
            .add_method(3, "Point", "len", vec![], ValueKind::Double)
            .add_type(4, "Point");

        assert_eq!(
            pool.resolve_constant(1).unwrap(),
            ConstantEntry::Value(ConstValue::Int(7))
        );
        let field = pool.resolve_field(2, FieldAccess::PutField).unwrap();
        assert!(field.is_final());
        assert_eq!(field.offset, 12);
        assert_eq!(
            pool.resolve_method(3, InvokeKind::Virtual).unwrap().to_string(),
            "Point.len()double"
        );
        assert_eq!(pool.resolve_type(4).unwrap().name(), "Point");
    }

    #[test]
    fn test_static_resolver_missing_entries() {
        let pool = StaticResolver::new();
        assert!(matches!(pool.resolve_constant(9), Err(Error::Metadata(_))));
        assert!(matches!(pool.resolve_type(9), Err(Error::Metadata(_))));
    }

    #[test]
    fn test_static_mismatch_is_rejected() {
        let mut pool = StaticResolver::new();
        pool.add_field(1, "Counter", "total", ValueKind::Long, 0, FieldFlags::STATIC);
        assert!(pool.resolve_field(1, FieldAccess::GetStatic).is_ok());
        assert!(pool.resolve_field(1, FieldAccess::GetField).is_err());
    }

    #[test]
    fn test_type_desc() {
        assert!(TypeDesc::new("[I").is_array());
        assert!(!TypeDesc::new("java/lang/Object").is_array());
    }
}
