use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAX_LEVEL: u32 = 99;
/// Currency granted for each level gained.
pub const COINS_PER_LEVEL: u64 = 1;

/// Total XP required to reach `level`:
/// `floor(sum_{i=1}^{level-1} floor(i + 300 * 2^(i / 7)) / 4)`.
pub fn xp_for_level(level: u32) -> u64 {
    let mut points = 0u64;
    for i in 1..level.min(MAX_LEVEL + 1) {
        points += level_points(i);
    }
    points / 4
}

/// Greatest level whose threshold `xp` has reached.
pub fn level_for_xp(xp: u64) -> u32 {
    let mut points = 0u64;
    let mut level = 1;
    while level < MAX_LEVEL {
        points += level_points(level);
        if xp < points / 4 {
            break;
        }
        level += 1;
    }
    level
}

fn level_points(i: u32) -> u64 {
    let value = f64::from(i) + 300.0 * 2f64.powf(f64::from(i) / 7.0);
    value.floor() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    Attack,
    Strength,
    Defence,
    Ranged,
    Prayer,
    Magic,
    Runecraft,
    Construction,
    Dungeoneering,
    Hitpoints,
    Agility,
    Herblore,
    Thieving,
    Crafting,
    Fletching,
    Slayer,
    Hunter,
    Mining,
    Smithing,
    Fishing,
    Cooking,
    Firemaking,
    Woodcutting,
    Farming,
}

impl SkillId {
    pub const ALL: [SkillId; 24] = [
        SkillId::Attack,
        SkillId::Strength,
        SkillId::Defence,
        SkillId::Ranged,
        SkillId::Prayer,
        SkillId::Magic,
        SkillId::Runecraft,
        SkillId::Construction,
        SkillId::Dungeoneering,
        SkillId::Hitpoints,
        SkillId::Agility,
        SkillId::Herblore,
        SkillId::Thieving,
        SkillId::Crafting,
        SkillId::Fletching,
        SkillId::Slayer,
        SkillId::Hunter,
        SkillId::Mining,
        SkillId::Smithing,
        SkillId::Fishing,
        SkillId::Cooking,
        SkillId::Firemaking,
        SkillId::Woodcutting,
        SkillId::Farming,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SkillId::Attack => "Attack",
            SkillId::Strength => "Strength",
            SkillId::Defence => "Defence",
            SkillId::Ranged => "Ranged",
            SkillId::Prayer => "Prayer",
            SkillId::Magic => "Magic",
            SkillId::Runecraft => "Runecraft",
            SkillId::Construction => "Construction",
            SkillId::Dungeoneering => "Dungeoneering",
            SkillId::Hitpoints => "Hitpoints",
            SkillId::Agility => "Agility",
            SkillId::Herblore => "Herblore",
            SkillId::Thieving => "Thieving",
            SkillId::Crafting => "Crafting",
            SkillId::Fletching => "Fletching",
            SkillId::Slayer => "Slayer",
            SkillId::Hunter => "Hunter",
            SkillId::Mining => "Mining",
            SkillId::Smithing => "Smithing",
            SkillId::Fishing => "Fishing",
            SkillId::Cooking => "Cooking",
            SkillId::Firemaking => "Firemaking",
            SkillId::Woodcutting => "Woodcutting",
            SkillId::Farming => "Farming",
        }
    }
}

/// XP is the only source of truth; `level` is a display cache refreshed on
/// every gain and recomputed on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub level: u32,
    pub xp: u64,
}

impl Default for Skill {
    fn default() -> Self {
        Self { level: 1, xp: 0 }
    }
}

impl Skill {
    pub fn from_xp(xp: u64) -> Self {
        Self {
            level: level_for_xp(xp),
            xp,
        }
    }

    pub fn xp_to_next_level(&self) -> Option<u64> {
        (self.level < MAX_LEVEL).then(|| xp_for_level(self.level + 1).saturating_sub(self.xp))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpGain {
    pub skill: SkillId,
    pub amount: u64,
    pub levels_gained: u32,
    pub new_level: u32,
}

impl XpGain {
    pub fn coins_awarded(&self) -> u64 {
        u64::from(self.levels_gained) * COINS_PER_LEVEL
    }
}

/// Every skill of the roster, always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Skills {
    skills: BTreeMap<SkillId, Skill>,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            skills: SkillId::ALL
                .into_iter()
                .map(|id| (id, Skill::default()))
                .collect(),
        }
    }
}

impl Skills {
    pub fn get(&self, id: SkillId) -> Skill {
        self.skills.get(&id).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkillId, Skill)> + '_ {
        self.skills.iter().map(|(id, skill)| (*id, *skill))
    }

    pub fn total_level(&self) -> u32 {
        self.skills.values().map(|skill| skill.level).sum()
    }

    /// Sets a skill from stored XP, deriving its level.
    pub fn set_xp(&mut self, id: SkillId, xp: u64) {
        self.skills.insert(id, Skill::from_xp(xp));
    }

    pub fn add_xp(&mut self, id: SkillId, amount: u64) -> XpGain {
        let skill = self.skills.entry(id).or_default();
        skill.xp = skill.xp.saturating_add(amount);
        let mut levels_gained = 0;
        while skill.level < MAX_LEVEL && skill.xp >= xp_for_level(skill.level + 1) {
            skill.level += 1;
            levels_gained += 1;
        }
        XpGain {
            skill: id,
            amount,
            levels_gained,
            new_level: skill.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_matches_known_thresholds() {
        assert_eq!(xp_for_level(1), 0);
        assert_eq!(xp_for_level(2), 83);
        assert_eq!(xp_for_level(3), 174);
        assert_eq!(xp_for_level(10), 1_154);
        assert_eq!(xp_for_level(99), 13_034_431);
    }

    #[test]
    fn curve_is_strictly_increasing() {
        for level in 1..MAX_LEVEL {
            assert!(xp_for_level(level + 1) > xp_for_level(level));
        }
    }

    #[test]
    fn level_for_xp_inverts_the_curve() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(82), 1);
        assert_eq!(level_for_xp(83), 2);
        assert_eq!(level_for_xp(u64::MAX), MAX_LEVEL);
        for level in 1..=MAX_LEVEL {
            assert_eq!(level_for_xp(xp_for_level(level)), level);
        }
    }

    #[test]
    fn exact_threshold_grants_one_level_and_keeps_xp() {
        let mut skills = Skills::default();
        let gain = skills.add_xp(SkillId::Woodcutting, xp_for_level(2));
        assert_eq!(gain.levels_gained, 1);
        assert_eq!(gain.coins_awarded(), 1);
        let skill = skills.get(SkillId::Woodcutting);
        assert_eq!(skill.level, 2);
        assert_eq!(skill.xp, 83);
    }

    #[test]
    fn large_gain_climbs_several_levels_at_once() {
        let mut skills = Skills::default();
        let gain = skills.add_xp(SkillId::Fishing, xp_for_level(5));
        assert_eq!(gain.levels_gained, 4);
        assert_eq!(gain.new_level, 5);
        assert_eq!(skills.get(SkillId::Fishing).xp_to_next_level(), Some(xp_for_level(6) - xp_for_level(5)));
    }

    #[test]
    fn default_roster_has_every_skill_at_level_one() {
        let skills = Skills::default();
        assert_eq!(skills.iter().count(), 24);
        assert_eq!(skills.total_level(), 24);
        assert_eq!(SkillId::ALL[0].name(), "Attack");
        assert_eq!(SkillId::ALL[23].name(), "Farming");
    }
}
