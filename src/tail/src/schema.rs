//! Navigation of the flattened type tree.

use std::fmt::Display;
use std::ops::Range;

use log::warn;

use crate::error::{OrcTailError, Result};
use crate::footer::{TypeKind, TypeNode};

/// Deepest nesting accepted when validating a type tree.
pub const MAX_TYPE_DEPTH: usize = 1024;

/// Borrowed view over a type tree stored as a flat array indexed by column id.
///
/// Column ids follow a pre-order walk: a node's children come right after it,
/// and a whole subtree occupies a contiguous id range.
#[derive(Debug, Clone, Copy)]
pub struct TypeTree<'a> {
    types: &'a [TypeNode],
}

impl<'a> TypeTree<'a> {
    /// Wrap `types`; column 0 is the root.
    pub fn new(types: &'a [TypeNode]) -> Self {
        Self { types }
    }

    /// All nodes, indexed by column id.
    pub fn types(&self) -> &'a [TypeNode] {
        self.types
    }

    /// Root node, normally a struct.
    pub fn root(&self) -> Option<&'a TypeNode> {
        self.types.first()
    }

    /// Field names of the root struct.
    pub fn field_names(&self) -> &'a [String] {
        self.root().map(|root| root.field_names.as_slice()).unwrap_or(&[])
    }

    /// Largest column id referenced as a child, 0 for a tree without children.
    pub fn last_column_id(&self) -> u32 {
        self.types
            .iter()
            .flat_map(|node| node.children.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Check the tree is well formed, starting at the root.
    pub fn validate(&self) -> Result<()> {
        if self.types.is_empty() {
            return Err(OrcTailError::malformed("type tree is empty"));
        }
        let next = self.validate_subtree(0, 0)?;
        if next as usize != self.types.len() {
            return Err(OrcTailError::malformed(format!(
                "type ids {next} to {} are not reachable from the root",
                self.types.len() - 1
            )));
        }
        Ok(())
    }

    /// Validate the subtree at `id`, returning the first id after it.
    fn validate_subtree(&self, id: u32, depth: usize) -> Result<u32> {
        if depth > MAX_TYPE_DEPTH {
            return Err(OrcTailError::malformed(format!(
                "type tree is nested deeper than {MAX_TYPE_DEPTH} levels"
            )));
        }
        let Some(node) = self.types.get(id as usize) else {
            return Err(OrcTailError::malformed(format!(
                "illegal type id {id}, the valid range is 0 to {}",
                self.types.len() - 1
            )));
        };
        let children = node.children.len();
        let arity_ok = match node.kind {
            TypeKind::Struct => children == node.field_names.len(),
            TypeKind::List => children == 1,
            TypeKind::Map => children == 2,
            TypeKind::Union => true,
            _ => children == 0,
        };
        if !arity_ok {
            return Err(OrcTailError::malformed(format!(
                "wrong number of children ({children}) for {:?} type {id}",
                node.kind
            )));
        }
        let mut next = id + 1;
        for &child in &node.children {
            if child != next {
                return Err(OrcTailError::malformed(format!(
                    "unexpected child type id {child} when {next} was expected"
                )));
            }
            next = self.validate_subtree(child, depth + 1)?;
        }
        Ok(next)
    }

    /// Column ids occupied by the root field `name`, or `None` when there is no such field.
    ///
    /// A primitive field maps to one id, a compound field to the ids of its
    /// whole subtree: from its own id up to the next sibling (or the end of
    /// the tree for the last field).
    pub fn column_range_for_field(&self, name: &str) -> Option<Range<u32>> {
        let root = self.root()?;
        let index = root.field_names.iter().position(|field| field == name)?;
        let start = *root.children.get(index)?;
        let end = match root.children.get(index + 1) {
            Some(&next) => next,
            None => self.last_column_id() + 1,
        };
        Some(start..end.max(start + 1))
    }

    /// Like [`TypeTree::column_range_for_field`], failing with [`OrcTailError::FieldNotFound`].
    pub fn resolve_field(&self, name: &str) -> Result<Range<u32>> {
        self.column_range_for_field(name)
            .ok_or_else(|| OrcTailError::FieldNotFound {
                name: name.to_string(),
                available: self.field_names().to_vec(),
            })
    }

    /// Column ids of all the named fields, skipping names that do not resolve.
    pub fn column_ids_for_fields<S: AsRef<str>>(&self, names: &[S]) -> Vec<u32> {
        let mut ids = Vec::new();
        for name in names {
            match self.resolve_field(name.as_ref()) {
                Ok(range) => ids.extend(range),
                Err(e) => warn!("{e}"),
            }
        }
        ids
    }

    fn fmt_node(&self, id: u32, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(node) = self.types.get(id as usize) else {
            return write!(f, "<invalid:{id}>");
        };
        let children = |f: &mut std::fmt::Formatter<'_>| -> std::fmt::Result {
            for (i, &child) in node.children.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                self.fmt_node(child, f)?;
            }
            Ok(())
        };
        match node.kind {
            TypeKind::Struct => {
                write!(f, "struct<")?;
                for (i, (name, &child)) in node.field_names.iter().zip(&node.children).enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:", quote_field_name(name))?;
                    self.fmt_node(child, f)?;
                }
                write!(f, ">")
            }
            TypeKind::List => {
                write!(f, "array<")?;
                children(f)?;
                write!(f, ">")
            }
            TypeKind::Map => {
                write!(f, "map<")?;
                children(f)?;
                write!(f, ">")
            }
            TypeKind::Union => {
                write!(f, "uniontype<")?;
                children(f)?;
                write!(f, ">")
            }
            TypeKind::Decimal => write!(
                f,
                "decimal({},{})",
                node.precision.unwrap_or(38),
                node.scale.unwrap_or(10)
            ),
            TypeKind::Char => write!(f, "char({})", node.maximum_length.unwrap_or(255)),
            TypeKind::Varchar => write!(f, "varchar({})", node.maximum_length.unwrap_or(65535)),
            primitive => write!(f, "{}", primitive_name(primitive)),
        }
    }
}

fn primitive_name(kind: TypeKind) -> &'static str {
    match kind {
        TypeKind::Boolean => "boolean",
        TypeKind::Byte => "tinyint",
        TypeKind::Short => "smallint",
        TypeKind::Int => "int",
        TypeKind::Long => "bigint",
        TypeKind::Float => "float",
        TypeKind::Double => "double",
        TypeKind::String => "string",
        TypeKind::Binary => "binary",
        TypeKind::Timestamp => "timestamp",
        TypeKind::TimestampInstant => "timestamp with local time zone",
        TypeKind::Date => "date",
        _ => "unknown",
    }
}

fn quote_field_name(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Renders the ORC type description, e.g. `struct<a:int,b:array<string>>`.
impl Display for TypeTree<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.types.is_empty() {
            return write!(f, "struct<>");
        }
        self.fmt_node(0, f)
    }
}
