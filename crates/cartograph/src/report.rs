//! Collect-all problem reports produced by the validators.

use std::fmt;

use serde::Serialize;

use cartograph_core::{EntityId, EntityKind};

/// The kind of structural problem found in a recipe or world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProblemCode {
    DuplicateId,
    StartPlotMissing,
    StartPlotUnknown,
    GateEndpointMissing,
    GateEndpointUnknown,
    GateDirectionMissing,
    GateKeyMissing,
    GateDirectionDuplicate,
    OwnerMissing,
    OwnerNotFound,
    UnreachablePlot,
    UnanchoredPlot,
    OwnerChainNonLand,
    DanglingOwner,
    OwnershipCycle,
    FixtureUnreachable,
    BuildException,
}

impl ProblemCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProblemCode::DuplicateId => "E_DUPLICATE_ID",
            ProblemCode::StartPlotMissing => "E_START_PLOT_MISSING",
            ProblemCode::StartPlotUnknown => "E_START_PLOT_UNKNOWN",
            ProblemCode::GateEndpointMissing => "E_GATE_ENDPOINT_MISSING",
            ProblemCode::GateEndpointUnknown => "E_GATE_ENDPOINT_UNKNOWN",
            ProblemCode::GateDirectionMissing => "E_GATE_DIRECTION_MISSING",
            ProblemCode::GateKeyMissing => "E_GATE_KEY_MISSING",
            ProblemCode::GateDirectionDuplicate => "E_GATE_DIRECTION_DUPLICATE",
            ProblemCode::OwnerMissing => "E_OWNER_MISSING",
            ProblemCode::OwnerNotFound => "E_OWNER_NOT_FOUND",
            ProblemCode::UnreachablePlot => "E_UNREACHABLE_PLOT",
            ProblemCode::UnanchoredPlot => "E_UNANCHORED_PLOT",
            ProblemCode::OwnerChainNonLand => "E_OWNER_CHAIN_NON_LAND",
            ProblemCode::DanglingOwner => "E_DANGLING_OWNER",
            ProblemCode::OwnershipCycle => "E_OWNERSHIP_CYCLE",
            ProblemCode::FixtureUnreachable => "E_FIXTURE_UNREACHABLE",
            ProblemCode::BuildException => "E_BUILD_EXCEPTION",
        }
    }
}

impl fmt::Display for ProblemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    code: ProblemCode,
    message: String,
    category: EntityKind,
    entity_id: Option<EntityId>,
}

impl Problem {
    pub fn new(code: ProblemCode, category: EntityKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            category,
            entity_id: None,
        }
    }

    /// Attach the id of the entity the problem is about.
    pub fn with_entity(mut self, id: EntityId) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn code(&self) -> ProblemCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> EntityKind {
        self.category
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.entity_id
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if let Some(id) = self.entity_id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// An ordered list of problems. Any problem blocks a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    problems: Vec<Problem>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    /// Append every problem of `other`, keeping order.
    pub fn extend(&mut self, other: Report) {
        self.problems.extend(other.problems);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn contains_code(&self, code: ProblemCode) -> bool {
        self.problems.iter().any(|problem| problem.code == code)
    }

    /// Number of problems carrying `code`.
    pub fn count_code(&self, code: ProblemCode) -> usize {
        self.problems
            .iter()
            .filter(|problem| problem.code == code)
            .count()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for problem in &self.problems {
            writeln!(f, "{problem}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

impl IntoIterator for Report {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}
