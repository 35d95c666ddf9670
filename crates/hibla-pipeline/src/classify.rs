//! Weave quality grading from thread counts and declared materials.
//!
//! Grades come from a fixed table keyed by the (warp, weft) material
//! pair. Pairs outside the table grade as
//! [`Undetermined`](Grade::Undetermined); classification never fails.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Axis, Count};

/// Thread materials a swatch can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// Piña Liniwan.
    #[serde(rename = "Piña Liniwan")]
    PinaLiniwan,
    /// Piña Washed.
    #[serde(rename = "Piña Washed")]
    PinaWashed,
    /// Silk.
    #[serde(rename = "Silk")]
    Silk,
}

impl Material {
    /// Every material, in menu order.
    pub const ALL: [Self; 3] = [Self::PinaLiniwan, Self::PinaWashed, Self::Silk];

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PinaLiniwan => "Piña Liniwan",
            Self::PinaWashed => "Piña Washed",
            Self::Silk => "Silk",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The caller's declaration of what the swatch is made of and how it
/// was photographed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialSelection {
    /// Warp material.
    pub warp: Material,
    /// Weft material.
    pub weft: Material,
    /// Direction the weft threads run in the photograph.
    pub weft_orientation: Axis,
}

impl MaterialSelection {
    /// `(warp, weft)` thread counts for this orientation.
    #[must_use]
    pub const fn warp_weft(&self, count: Count) -> (u32, u32) {
        match self.weft_orientation {
            Axis::Horizontal => (count.vertical, count.horizontal),
            Axis::Vertical => (count.horizontal, count.vertical),
        }
    }
}

/// Overall quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// Meets the premium density for its material pair.
    Premium,
    /// Meets the standard but not premium density.
    Regular,
    /// Warp or weft density is below standard.
    BelowStandard,
    /// The material pair has no grading rule.
    Undetermined,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Premium => "Premium",
            Self::Regular => "Regular",
            Self::BelowStandard => "Below Standard",
            Self::Undetermined => "Undetermined",
        })
    }
}

/// Per-axis grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubGrade {
    /// Density at or above the standard.
    QualityStandard,
    /// Density below the standard.
    BelowStandard,
}

impl fmt::Display for SubGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::QualityStandard => "Quality Standard",
            Self::BelowStandard => "Below Standard",
        })
    }
}

/// Density thresholds for one material pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeRule {
    /// Warp material.
    pub warp: Material,
    /// Weft material.
    pub weft: Material,
    /// Minimum warp count for Premium.
    pub premium_warp: u32,
    /// Minimum weft count for Premium.
    pub premium_weft: u32,
    /// Warp counts below this are below standard.
    pub standard_warp: u32,
    /// Weft counts below this are below standard.
    pub standard_weft: u32,
}

/// The grading table.
pub const GRADE_RULES: [GradeRule; 3] = [
    GradeRule {
        warp: Material::PinaLiniwan,
        weft: Material::PinaLiniwan,
        premium_warp: 40,
        premium_weft: 101,
        standard_warp: 40,
        standard_weft: 80,
    },
    GradeRule {
        warp: Material::PinaLiniwan,
        weft: Material::PinaWashed,
        premium_warp: 40,
        premium_weft: 76,
        standard_warp: 40,
        standard_weft: 65,
    },
    GradeRule {
        warp: Material::Silk,
        weft: Material::PinaWashed,
        premium_warp: 40,
        premium_weft: 76,
        standard_warp: 40,
        standard_weft: 65,
    },
];

/// Look up the rule for a material pair.
#[must_use]
pub fn rule_for(warp: Material, weft: Material) -> Option<&'static GradeRule> {
    GRADE_RULES
        .iter()
        .find(|rule| rule.warp == warp && rule.weft == weft)
}

/// Outcome of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Overall grade.
    pub grade: Grade,
    /// Warp sub-grade.
    pub warp: SubGrade,
    /// Weft sub-grade.
    pub weft: SubGrade,
    /// Warp thread count used for grading.
    pub warp_count: u32,
    /// Weft thread count used for grading.
    pub weft_count: u32,
    /// `"Orientation: Weft is horizontal."`
    pub orientation_spec: String,
    /// `"Warp - Silk: Quality Standard"`
    pub warp_spec: String,
    /// `"Weft - Piña Washed: Below Standard"`
    pub weft_spec: String,
}

/// Grade a swatch.
///
/// Either sub-grade being below standard forces the overall grade to
/// [`Grade::BelowStandard`], whatever the premium check says.
#[must_use]
pub fn classify(count: Count, selection: &MaterialSelection) -> Classification {
    let (warp_count, weft_count) = selection.warp_weft(count);

    let (grade, warp, weft) = match rule_for(selection.warp, selection.weft) {
        Some(rule) => {
            let warp = sub_grade(warp_count, rule.standard_warp);
            let weft = sub_grade(weft_count, rule.standard_weft);
            let grade = if warp == SubGrade::BelowStandard || weft == SubGrade::BelowStandard {
                Grade::BelowStandard
            } else if warp_count >= rule.premium_warp && weft_count >= rule.premium_weft {
                Grade::Premium
            } else {
                Grade::Regular
            };
            (grade, warp, weft)
        }
        None => (
            Grade::Undetermined,
            SubGrade::QualityStandard,
            SubGrade::QualityStandard,
        ),
    };

    Classification {
        grade,
        warp,
        weft,
        warp_count,
        weft_count,
        orientation_spec: format!("Orientation: Weft is {}.", selection.weft_orientation),
        warp_spec: format!("Warp - {}: {warp}", selection.warp),
        weft_spec: format!("Weft - {}: {weft}", selection.weft),
    }
}

const fn sub_grade(count: u32, standard: u32) -> SubGrade {
    if count < standard {
        SubGrade::BelowStandard
    } else {
        SubGrade::QualityStandard
    }
}
