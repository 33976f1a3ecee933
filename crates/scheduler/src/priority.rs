use serde::{Deserialize, Serialize};

/// Bonus added to the dispatch score of a task whose row is on screen.
pub const VISIBILITY_BONUS: u32 = 100;

/// Shared priority tiers used for dispatch ordering and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
	/// Content blocking the first meaningful paint.
	Critical,
	/// Content the user is about to look at.
	High,
	/// Default tier for on-demand content.
	Medium,
	/// Content that can wait for idle capacity.
	Low,
	/// Speculative work with no deadline.
	Background,
}

impl PriorityTier {
	/// Fixed relative weight of this tier.
	pub const fn weight(self) -> u32 {
		match self {
			Self::Critical => 1000,
			Self::High => 500,
			Self::Medium => 100,
			Self::Low => 50,
			Self::Background => 1,
		}
	}

	/// Tier used at selection time for a task with this base tier.
	///
	/// Visible low-tier work is promoted to medium. The stored tier is never
	/// rewritten, so hiding the row again restores the base tier.
	pub const fn effective(self, visible: bool) -> Self {
		match (self, visible) {
			(Self::Low, true) => Self::Medium,
			(tier, _) => tier,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Critical => "critical",
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
			Self::Background => "background",
		}
	}
}

impl std::fmt::Display for PriorityTier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Score used to order ready tasks. Higher dispatches first.
pub const fn dispatch_score(tier: PriorityTier, visible: bool) -> u32 {
	let bonus = if visible { VISIBILITY_BONUS } else { 0 };
	tier.effective(visible).weight() + bonus
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case(PriorityTier::High, false, 500)]
	#[case(PriorityTier::Medium, false, 100)]
	#[case(PriorityTier::Low, false, 50)]
	#[case(PriorityTier::Low, true, 200)]
	#[case(PriorityTier::Critical, true, 1100)]
	#[case(PriorityTier::Background, false, 1)]
	fn scores(#[case] tier: PriorityTier, #[case] visible: bool, #[case] expected: u32) {
		assert_eq!(dispatch_score(tier, visible), expected);
	}

	#[test]
	fn visibility_promotion_is_limited_to_low() {
		assert_eq!(PriorityTier::Low.effective(true), PriorityTier::Medium);
		assert_eq!(PriorityTier::Medium.effective(false), PriorityTier::Medium);
		assert_eq!(PriorityTier::Background.effective(true), PriorityTier::Background);
		assert_eq!(PriorityTier::High.effective(true), PriorityTier::High);
	}

	#[test]
	fn priority_ordering_survives_visibility_bonus() {
		assert!(dispatch_score(PriorityTier::High, false) > dispatch_score(PriorityTier::Low, true));
		assert!(dispatch_score(PriorityTier::Low, true) > dispatch_score(PriorityTier::Medium, false));
	}
}
