use stratadb_query::{FilterConstraint, Scope, Value};
use xxhash_rust::xxh3::Xxh3;

///
/// Structural fingerprints
///
/// Formula memoization is keyed by stable structural hashes rather than
/// object identity: schema names, reference names, index primary keys and
/// constraint structure all feed the digest, so two structurally identical
/// constraint fragments evaluated under different schema contexts never
/// share a cached result.
///

/// Fold a tagged list of 64-bit parts into one digest.
#[must_use]
pub fn hash_parts(tag: u8, parts: &[u64]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&[tag]);
    for part in parts {
        hasher.update(&part.to_le_bytes());
    }
    hasher.digest()
}

/// Digest a string operand.
#[must_use]
pub fn hash_str(value: &str) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(value.as_bytes());
    hasher.digest()
}

fn write_value(hasher: &mut Xxh3, value: &Value) {
    hasher.update(&[value.tag()]);
    match value {
        Value::Bool(v) => hasher.update(&[u8::from(*v)]),
        Value::Int(v) => hasher.update(&v.to_le_bytes()),
        Value::String(v) => {
            hasher.update(&(v.len() as u64).to_le_bytes());
            hasher.update(v.as_bytes());
        }
    }
}

fn write_constraint(hasher: &mut Xxh3, constraint: &FilterConstraint) {
    match constraint {
        FilterConstraint::And(children) => {
            hasher.update(&[0x01, children.len() as u8]);
            for child in children {
                write_constraint(hasher, child);
            }
        }
        FilterConstraint::Or(children) => {
            hasher.update(&[0x02, children.len() as u8]);
            for child in children {
                write_constraint(hasher, child);
            }
        }
        FilterConstraint::Not(child) => {
            hasher.update(&[0x03]);
            write_constraint(hasher, child);
        }
        FilterConstraint::AttributeEquals { name, value } => {
            hasher.update(&[0x04]);
            hasher.update(name.as_bytes());
            write_value(hasher, value);
        }
        FilterConstraint::AttributeInSet { name, values } => {
            hasher.update(&[0x05]);
            hasher.update(name.as_bytes());
            for value in values {
                write_value(hasher, value);
            }
        }
        FilterConstraint::AttributeIs { name, present } => {
            hasher.update(&[0x06, u8::from(*present)]);
            hasher.update(name.as_bytes());
        }
        FilterConstraint::EntityPrimaryKeyInSet(keys) => {
            hasher.update(&[0x07]);
            for key in keys {
                hasher.update(&key.to_le_bytes());
            }
        }
        FilterConstraint::ReferenceHaving {
            reference_name,
            children,
        } => {
            hasher.update(&[0x08]);
            hasher.update(reference_name.as_bytes());
            for child in children {
                write_constraint(hasher, child);
            }
        }
        FilterConstraint::EntityHaving(child) => {
            hasher.update(&[0x09]);
            write_constraint(hasher, child);
        }
        FilterConstraint::ScopeIn(scopes) => {
            hasher.update(&[0x0a]);
            for scope in scopes {
                hasher.update(&[scope_tag(*scope)]);
            }
        }
    }
}

/// Structural hash of a filter constraint sub-tree.
#[must_use]
pub fn constraint_fingerprint(constraint: &FilterConstraint) -> u64 {
    let mut hasher = Xxh3::new();
    write_constraint(&mut hasher, constraint);
    hasher.digest()
}

/// Structural hash of a conjunction of constraints.
#[must_use]
pub fn constraints_fingerprint(constraints: &[FilterConstraint]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.update(&(constraints.len() as u64).to_le_bytes());
    for constraint in constraints {
        write_constraint(&mut hasher, constraint);
    }
    hasher.digest()
}

#[must_use]
pub(crate) const fn scope_tag(scope: Scope) -> u8 {
    match scope {
        Scope::Live => 0x01,
        Scope::Archived => 0x02,
    }
}
