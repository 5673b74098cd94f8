// stage.rs - Stage bitmask and the per-cycle schedule
//
// Every pass of a cycle runs exactly one density stage and one velocity
// stage. The schedule is built once from the iteration counts in `config`
// and indexed by step.

use std::fmt;

use crate::config::{INPUT_ITERATIONS, PROJECT_RELAX_ITERATIONS, VELOCITY_DIFFUSE_ITERATIONS};

/// Set of stages active in one pass
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StageSet(u8);

impl StageSet {
    pub const EMPTY: StageSet = StageSet(0);
    pub const D_DIFFUSE: StageSet = StageSet(1);
    pub const D_ADVECT: StageSet = StageSet(2);
    pub const V_DIFFUSE: StageSet = StageSet(4);
    pub const V_PROJECT_GRADIENT: StageSet = StageSet(8);
    pub const V_PROJECT_RELAX: StageSet = StageSet(16);
    pub const V_PROJECT_APPLY: StageSet = StageSet(32);
    pub const V_ADVECT: StageSet = StageSet(64);
    pub const INPUTS: StageSet = StageSet(128);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: StageSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Density branch selected by this set, if any
    pub fn density(self) -> Option<DensityStage> {
        if self.contains(Self::INPUTS) {
            Some(DensityStage::Inputs)
        } else if self.contains(Self::D_DIFFUSE) {
            Some(DensityStage::Diffuse)
        } else if self.contains(Self::D_ADVECT) {
            Some(DensityStage::Advect)
        } else {
            None
        }
    }

    /// Velocity branch selected by this set, if any
    pub fn velocity(self) -> Option<VelocityStage> {
        if self.contains(Self::INPUTS) {
            Some(VelocityStage::Inputs)
        } else if self.contains(Self::V_DIFFUSE) {
            Some(VelocityStage::Diffuse)
        } else if self.contains(Self::V_PROJECT_GRADIENT) {
            Some(VelocityStage::ProjectGradient)
        } else if self.contains(Self::V_PROJECT_RELAX) {
            Some(VelocityStage::ProjectRelax)
        } else if self.contains(Self::V_PROJECT_APPLY) {
            Some(VelocityStage::ProjectApply)
        } else if self.contains(Self::V_ADVECT) {
            Some(VelocityStage::Advect)
        } else {
            None
        }
    }
}

impl std::ops::BitOr for StageSet {
    type Output = StageSet;
    fn bitor(self, rhs: StageSet) -> StageSet {
        StageSet(self.0 | rhs.0)
    }
}

impl fmt::Debug for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageSet({:#010b}: {:?} / {:?})", self.0, self.density(), self.velocity())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityStage {
    Inputs,
    Diffuse,
    Advect,
}

impl DensityStage {
    pub fn bit(self) -> StageSet {
        match self {
            DensityStage::Inputs => StageSet::INPUTS,
            DensityStage::Diffuse => StageSet::D_DIFFUSE,
            DensityStage::Advect => StageSet::D_ADVECT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VelocityStage {
    Inputs,
    Diffuse,
    ProjectGradient,
    ProjectRelax,
    ProjectApply,
    Advect,
}

impl VelocityStage {
    pub fn bit(self) -> StageSet {
        match self {
            VelocityStage::Inputs => StageSet::INPUTS,
            VelocityStage::Diffuse => StageSet::V_DIFFUSE,
            VelocityStage::ProjectGradient => StageSet::V_PROJECT_GRADIENT,
            VelocityStage::ProjectRelax => StageSet::V_PROJECT_RELAX,
            VelocityStage::ProjectApply => StageSet::V_PROJECT_APPLY,
            VelocityStage::Advect => StageSet::V_ADVECT,
        }
    }
}

/// Iteration counts a schedule is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCounts {
    pub inputs: usize,
    pub velocity_diffuse: usize,
    pub project_relax: usize,
}

impl Default for StageCounts {
    fn default() -> Self {
        Self {
            inputs: INPUT_ITERATIONS,
            velocity_diffuse: VELOCITY_DIFFUSE_ITERATIONS,
            project_relax: PROJECT_RELAX_ITERATIONS,
        }
    }
}

/// Stage set for every step of a cycle; step `i` (1-based) is `steps[i-1]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    steps: Vec<StageSet>,
}

impl Schedule {
    /// Velocity: inputs, diffuse, project, advect, project.
    /// Density: inputs, diffuse on every remaining step but the last, advect.
    pub fn build(counts: StageCounts) -> Self {
        let mut velocity = Vec::new();
        let project = |v: &mut Vec<VelocityStage>| {
            v.push(VelocityStage::ProjectGradient);
            v.extend(std::iter::repeat_n(VelocityStage::ProjectRelax, counts.project_relax));
            v.push(VelocityStage::ProjectApply);
        };
        velocity.extend(std::iter::repeat_n(VelocityStage::Inputs, counts.inputs));
        velocity.extend(std::iter::repeat_n(VelocityStage::Diffuse, counts.velocity_diffuse));
        project(&mut velocity);
        velocity.push(VelocityStage::Advect);
        project(&mut velocity);

        let total = velocity.len();
        let density = std::iter::repeat_n(DensityStage::Inputs, counts.inputs)
            .chain(std::iter::repeat_n(DensityStage::Diffuse, total - counts.inputs - 1))
            .chain(std::iter::once(DensityStage::Advect));

        let steps = velocity
            .into_iter()
            .zip(density)
            .map(|(v, d)| v.bit() | d.bit())
            .collect();
        Self { steps }
    }

    /// Number of passes (K) in a full cycle
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Stage set for 1-based `step`; `None` outside 1..=K
    pub fn stages(&self, step: usize) -> Option<StageSet> {
        self.steps.get(step.checked_sub(1)?).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = StageSet> + '_ {
        self.steps.iter().copied()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::build(StageCounts::default())
    }
}
