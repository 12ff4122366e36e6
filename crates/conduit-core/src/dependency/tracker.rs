use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::dependency::error::DependencyError;
use crate::dependency::DependencyPoint;
use crate::kernel::error::Result;

/// Index of the named points of one role within one instance.
///
/// A point is in exactly one of complete or incomplete, and additionally in
/// required-incomplete iff it is required and incomplete. Snapshots come back
/// in declaration order.
pub struct DependencyTracker<P> {
    role: &'static str,
    order: Vec<String>,
    points: HashMap<String, P>,
    complete: HashSet<String>,
    incomplete: HashSet<String>,
    required_incomplete: HashSet<String>,
}

impl<P: DependencyPoint> DependencyTracker<P> {
    /// Create an empty tracker. `role` only appears in errors and logs.
    pub fn new(role: &'static str) -> Self {
        Self {
            role,
            order: Vec::new(),
            points: HashMap::new(),
            complete: HashSet::new(),
            incomplete: HashSet::new(),
            required_incomplete: HashSet::new(),
        }
    }

    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Start tracking a point that is not yet complete.
    pub fn track(&mut self, point: P) -> Result<()> {
        let name = point.name().to_string();
        if self.points.contains_key(&name) {
            return Err(DependencyError::DuplicatePoint {
                role: self.role,
                name,
            }
            .into());
        }
        if point.is_complete() {
            return Err(DependencyError::AlreadyComplete {
                role: self.role,
                name,
            }
            .into());
        }
        if point.is_required() {
            self.required_incomplete.insert(name.clone());
        }
        self.incomplete.insert(name.clone());
        self.order.push(name.clone());
        self.points.insert(name, point);
        Ok(())
    }

    fn point_or_err(&self, name: &str) -> Result<&P> {
        self.points.get(name).ok_or_else(|| {
            DependencyError::UnknownPoint {
                role: self.role,
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Re-evaluate a point; returns true when it just moved into complete.
    pub fn progress(&mut self, name: &str) -> Result<bool> {
        let point = self.point_or_err(name)?;
        if !point.is_complete() || self.complete.contains(name) {
            return Ok(false);
        }
        self.incomplete.remove(name);
        self.required_incomplete.remove(name);
        self.complete.insert(name.to_string());
        Ok(true)
    }

    /// Re-evaluate a point; returns true when it just left complete.
    pub fn setback(&mut self, name: &str) -> Result<bool> {
        let point = self.point_or_err(name)?;
        if point.is_complete() || !self.complete.contains(name) {
            return Ok(false);
        }
        let required = point.is_required();
        self.complete.remove(name);
        self.incomplete.insert(name.to_string());
        if required {
            self.required_incomplete.insert(name.to_string());
        }
        Ok(true)
    }

    /// Bring the sets in line with the point's current completeness, in
    /// whichever direction it moved. Returns true when membership changed.
    pub fn reevaluate(&mut self, name: &str) -> Result<bool> {
        if self.point_or_err(name)?.is_complete() {
            self.progress(name)
        } else {
            self.setback(name)
        }
    }

    pub fn is_required_complete(&self) -> bool {
        self.required_incomplete.is_empty()
    }

    pub fn is_complete(&self, name: &str) -> bool {
        self.complete.contains(name)
    }

    fn ordered(&self, set: &HashSet<String>) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| set.contains(*name))
            .cloned()
            .collect()
    }

    pub fn complete(&self) -> Vec<String> {
        self.ordered(&self.complete)
    }

    pub fn incomplete(&self) -> Vec<String> {
        self.ordered(&self.incomplete)
    }

    pub fn required_incomplete(&self) -> Vec<String> {
        self.ordered(&self.required_incomplete)
    }

    /// Snapshot of the complete set, for prerequisite checks
    pub fn complete_set(&self) -> HashSet<String> {
        self.complete.clone()
    }

    pub fn get(&self, name: &str) -> Option<&P> {
        self.points.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut P> {
        self.points.get_mut(name)
    }

    /// Point names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Points in declaration order
    pub fn points(&self) -> impl Iterator<Item = &P> + '_ {
        self.order.iter().filter_map(|name| self.points.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// Manual Debug implementation, points may hold closures
impl<P> fmt::Debug for DependencyTracker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyTracker")
            .field("role", &self.role)
            .field("points", &self.order)
            .field("complete", &self.complete.len())
            .field("required_incomplete", &self.required_incomplete.len())
            .finish()
    }
}
