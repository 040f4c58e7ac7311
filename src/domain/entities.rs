//! Domain entities: learning path nodes and user progress records

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Difficulty of a problem node.
///
/// Ordered `Easy < Medium < Hard`. The order is a property of the *average*
/// allocated experience per group, not of every single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(DomainError::UnknownVariant {
                kind: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

/// Tier of a treasure node. Strictly ordered `Early < Mid < Late < Final`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreasureTier {
    Early,
    Mid,
    Late,
    Final,
}

impl TreasureTier {
    pub const ALL: [TreasureTier; 4] = [
        TreasureTier::Early,
        TreasureTier::Mid,
        TreasureTier::Late,
        TreasureTier::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TreasureTier::Early => "early",
            TreasureTier::Mid => "mid",
            TreasureTier::Late => "late",
            TreasureTier::Final => "final",
        }
    }

    /// Resolve the tier of the `index`-th (0-based) treasure out of `total`
    /// treasures along the path, by quartile of its 1-based position.
    ///
    /// Positions up to 25% are early, up to 50% mid, up to 75% late and the
    /// rest final. A `total` of zero yields `Early`.
    pub fn for_path_position(index: usize, total: usize) -> Self {
        if total == 0 {
            return TreasureTier::Early;
        }
        // (index + 1) / total compared against quarters, in integers
        let scaled = (index + 1) * 4;
        if scaled <= total {
            TreasureTier::Early
        } else if scaled <= total * 2 {
            TreasureTier::Mid
        } else if scaled <= total * 3 {
            TreasureTier::Late
        } else {
            TreasureTier::Final
        }
    }
}

impl fmt::Display for TreasureTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreasureTier {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "early" => Ok(Self::Early),
            "mid" => Ok(Self::Mid),
            "late" => Ok(Self::Late),
            "final" => Ok(Self::Final),
            other => Err(DomainError::UnknownVariant {
                kind: "treasure tier",
                value: other.to_string(),
            }),
        }
    }
}

/// A problem on the learning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemNode {
    pub id: String,
    pub difficulty: Difficulty,
    /// Importance tags; order is irrelevant.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub title: String,
}

impl ProblemNode {
    pub fn new(id: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            id: id.into(),
            difficulty,
            tags: BTreeSet::new(),
            title: String::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// A milestone reward on the learning path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasureNode {
    pub id: String,
    pub tier: TreasureTier,
    /// Ordinal along the path, informational only.
    #[serde(default)]
    pub position: u32,
}

impl TreasureNode {
    pub fn new(id: impl Into<String>, tier: TreasureTier, position: u32) -> Self {
        Self {
            id: id.into(),
            tier,
            position,
        }
    }
}

/// A node of the learning path. Ids are unique across both variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Problem(ProblemNode),
    Treasure(TreasureNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Problem(p) => &p.id,
            Node::Treasure(t) => &t.id,
        }
    }

    pub fn as_problem(&self) -> Option<&ProblemNode> {
        match self {
            Node::Problem(p) => Some(p),
            Node::Treasure(_) => None,
        }
    }

    pub fn as_treasure(&self) -> Option<&TreasureNode> {
        match self {
            Node::Treasure(t) => Some(t),
            Node::Problem(_) => None,
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self, Node::Problem(_))
    }

    pub fn is_treasure(&self) -> bool {
        matches!(self, Node::Treasure(_))
    }
}

impl From<ProblemNode> for Node {
    fn from(node: ProblemNode) -> Self {
        Node::Problem(node)
    }
}

impl From<TreasureNode> for Node {
    fn from(node: TreasureNode) -> Self {
        Node::Treasure(node)
    }
}

/// Persisted progress of one user, as consumed and produced by migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub user_id: String,
    /// Cumulative experience, expected to be `>= 0`.
    #[serde(alias = "currentExperience")]
    pub experience: i64,
    #[serde(default)]
    pub completed_nodes: Vec<String>,
}

impl UserRecord {
    pub fn new(user_id: impl Into<String>, experience: i64) -> Self {
        Self {
            user_id: user_id.into(),
            experience,
            completed_nodes: Vec::new(),
        }
    }

    pub fn with_completed<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completed_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }
}
