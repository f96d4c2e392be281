//! [`BindingsBag`] — an ordered, per-section store of bound values.

use crate::value::Value;

/// The fixed section order used everywhere a flattened binding list is
/// produced (§3.5, §5 "Ordering guarantees"). Declaration order here *is*
/// the iteration order `flatten()` uses.
pub const SECTIONS: [Section; 9] = [
    Section::Select,
    Section::From,
    Section::Join,
    Section::Where,
    Section::GroupBy,
    Section::Having,
    Section::Order,
    Section::Union,
    Section::UnionOrder,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl Section {
    fn index(self) -> usize {
        SECTIONS.iter().position(|s| *s == self).unwrap()
    }
}

/// A map from section name to an ordered list of bound [`Value`]s.
///
/// Iteration is fixed as [`SECTIONS`] so `flatten()` is deterministic
/// regardless of insertion order across sections (insertion order *within*
/// a section is always preserved).
#[derive(Debug, Clone, Default)]
pub struct BindingsBag {
    sections: [Vec<Value>; 9],
}

impl BindingsBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `values` to `section`, in order.
    pub fn add_binding(&mut self, values: impl IntoIterator<Item = Value>, section: Section) {
        self.sections[section.index()].extend(values);
    }

    pub fn add_one(&mut self, value: Value, section: Section) {
        self.sections[section.index()].push(value);
    }

    /// Extends each section of `self` with the matching section of `other`,
    /// in the order `other`'s values were inserted — used when merging a
    /// subquery's bag into the enclosing one.
    pub fn merge_bindings(&mut self, other: &BindingsBag) {
        for section in SECTIONS {
            let idx = section.index();
            self.sections[idx].extend(other.sections[idx].iter().cloned());
        }
    }

    pub fn section(&self, section: Section) -> &[Value] {
        &self.sections[section.index()]
    }

    /// Produces the deterministic flat binding array: §3.5's fixed order,
    /// skipping `Value::Raw` entries, which never produce a placeholder.
    pub fn flatten(&self) -> Vec<Value> {
        let mut out = Vec::new();
        for section in SECTIONS {
            for v in &self.sections[section.index()] {
                if !v.is_raw() {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.is_empty())
    }

    pub fn clear(&mut self) {
        for s in &mut self.sections {
            s.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_follows_fixed_order() {
        let mut bag = BindingsBag::new();
        bag.add_one(Value::Int(1), Section::Where);
        bag.add_one(Value::Int(2), Section::Select);
        bag.add_one(Value::Int(3), Section::Having);
        let flat = bag.flatten();
        assert_eq!(flat, vec![Value::Int(2), Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn raw_values_never_flatten() {
        let mut bag = BindingsBag::new();
        bag.add_one(Value::raw("NOW()"), Section::Where);
        bag.add_one(Value::Int(1), Section::Where);
        assert_eq!(bag.flatten(), vec![Value::Int(1)]);
    }

    #[test]
    fn merge_preserves_section_and_order() {
        let mut outer = BindingsBag::new();
        outer.add_one(Value::Int(1), Section::Where);
        let mut inner = BindingsBag::new();
        inner.add_one(Value::Int(2), Section::Where);
        inner.add_one(Value::Int(3), Section::Select);
        outer.merge_bindings(&inner);
        assert_eq!(outer.section(Section::Where), &[Value::Int(1), Value::Int(2)]);
        assert_eq!(outer.section(Section::Select), &[Value::Int(3)]);
    }
}
