use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of action features produced by [`ActionEncoder`].
pub const ACTION_DIM: usize = 3;

/// Largest valid allocation for any single field.
pub const MAX_ALLOCATION: u32 = 10;

/// Fixed-order action features.
pub type ActionFeatures = [f64; ACTION_DIM];

/// Resource allocation across the three response arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisasterAction {
    /// Search-and-rescue units.
    pub rescue_allocation: u32,
    /// Medical units.
    pub medical_deployment: u32,
    /// Logistics units.
    pub logistics_routing: u32,
}

impl DisasterAction {
    /// Creates an action. Fields are taken as given; see [`DisasterAction::is_within_bounds`].
    #[must_use]
    pub const fn new(rescue_allocation: u32, medical_deployment: u32, logistics_routing: u32) -> Self {
        Self {
            rescue_allocation,
            medical_deployment,
            logistics_routing,
        }
    }

    /// Builds an action whose `focus` category field is `focused` and whose other two
    /// fields are `first` and `second` in rescue, medical, logistics order.
    #[must_use]
    pub const fn focused(focus: ActionCategory, focused: u32, first: u32, second: u32) -> Self {
        match focus {
            ActionCategory::Rescue => Self::new(focused, first, second),
            ActionCategory::Medical => Self::new(first, focused, second),
            ActionCategory::Logistics => Self::new(first, second, focused),
        }
    }

    /// Sum of the three fields.
    #[must_use]
    pub const fn total_resources(&self) -> u32 {
        self.rescue_allocation + self.medical_deployment + self.logistics_routing
    }

    /// Whether every field lies in `0..=10`.
    #[must_use]
    pub const fn is_within_bounds(&self) -> bool {
        self.rescue_allocation <= MAX_ALLOCATION
            && self.medical_deployment <= MAX_ALLOCATION
            && self.logistics_routing <= MAX_ALLOCATION
    }

    /// Allocation for a category.
    #[must_use]
    pub const fn allocation(&self, category: ActionCategory) -> u32 {
        match category {
            ActionCategory::Rescue => self.rescue_allocation,
            ActionCategory::Medical => self.medical_deployment,
            ActionCategory::Logistics => self.logistics_routing,
        }
    }

    /// Shorthand for [`ActionEncoder::encode`].
    #[must_use]
    pub fn to_vector(&self) -> ActionFeatures {
        ActionEncoder::encode(self)
    }
}

impl fmt::Display for DisasterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Action(rescue={}, medical={}, logistics={})",
            self.rescue_allocation, self.medical_deployment, self.logistics_routing
        )
    }
}

/// Normalizes allocations by [`MAX_ALLOCATION`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionEncoder;

impl ActionEncoder {
    /// Divides each field by 10. Out-of-range allocations are not clamped and encode above `1.0`.
    #[must_use]
    pub fn encode(action: &DisasterAction) -> ActionFeatures {
        let scale = f64::from(MAX_ALLOCATION);
        [
            f64::from(action.rescue_allocation) / scale,
            f64::from(action.medical_deployment) / scale,
            f64::from(action.logistics_routing) / scale,
        ]
    }
}

/// Specialisation of a learned action; selects the weight vector that scores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    /// Search and rescue.
    Rescue,
    /// Medical response.
    Medical,
    /// Supply logistics.
    Logistics,
}

impl ActionCategory {
    /// Number of categories.
    pub const COUNT: usize = 3;

    /// Every category, in evaluation order.
    pub const ALL: [Self; Self::COUNT] = [Self::Rescue, Self::Medical, Self::Logistics];

    /// Position in [`ActionCategory::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Rescue => 0,
            Self::Medical => 1,
            Self::Logistics => 2,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rescue => "rescue",
            Self::Medical => "medical",
            Self::Logistics => "logistics",
        }
    }

    /// Strict parse.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Parses a label, falling back to [`ActionCategory::Rescue`].
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        Self::parse(label).unwrap_or(Self::Rescue)
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Action types ranked by the priority optimizer and the heuristic planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityActionType {
    /// Search and rescue.
    Rescue,
    /// Medical response.
    Medical,
    /// Supply logistics.
    Logistics,
    /// Emergency communications.
    Communication,
}

impl PriorityActionType {
    /// Number of action types.
    pub const COUNT: usize = 4;

    /// Every action type, in scoring order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Rescue,
        Self::Medical,
        Self::Logistics,
        Self::Communication,
    ];

    /// Position in [`PriorityActionType::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Rescue => 0,
            Self::Medical => 1,
            Self::Logistics => 2,
            Self::Communication => 3,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rescue => "rescue",
            Self::Medical => "medical",
            Self::Logistics => "logistics",
            Self::Communication => "communication",
        }
    }

    /// Parses a label, falling back to [`PriorityActionType::Rescue`].
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(Self::Rescue)
    }
}

impl From<ActionCategory> for PriorityActionType {
    fn from(category: ActionCategory) -> Self {
        match category {
            ActionCategory::Rescue => Self::Rescue,
            ActionCategory::Medical => Self::Medical,
            ActionCategory::Logistics => Self::Logistics,
        }
    }
}

impl fmt::Display for PriorityActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
