//! Damage and healing arithmetic.
//!
//! Damage is applied before healing, and temporary hit points absorb damage
//! before current hit points do. Applying both in one call gives a "net"
//! adjustment, so the order is fixed.

use crate::entity::{Combatant, EntityId};

/// What happened to one combatant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    pub target_id: EntityId,
    /// Damage soaked by temporary hit points.
    pub temp_absorbed: i32,
    /// Current hit points lost to damage.
    pub hp_lost: i32,
    /// Current hit points regained from healing.
    pub hp_healed: i32,
    pub dropped_to_zero: bool,
    pub revived: bool,
}

/// Apply `damage` then `heal` to a single combatant.
///
/// Negative amounts are treated as 0. A non-zero heal caps the result at
/// maximum hit points.
pub fn apply(combatant: &mut Combatant, damage: i32, heal: i32) -> DamageOutcome {
    let damage = damage.max(0);
    let heal = heal.max(0);
    let was_out = combatant.is_out;

    let temp_absorbed = combatant.temporary_hit_points.min(damage).max(0);
    combatant.temporary_hit_points -= temp_absorbed;
    let overflow = damage - temp_absorbed;

    let before = combatant.hit_points;
    combatant.hit_points = (combatant.hit_points - overflow).max(0);
    let hp_lost = before - combatant.hit_points;
    let after_damage = combatant.hit_points;

    if heal > 0 {
        combatant.hit_points = combatant
            .hit_points
            .saturating_add(heal)
            .min(combatant.max_hit_points);
    }
    let hp_healed = (combatant.hit_points - after_damage).max(0);

    combatant.refresh_out();
    DamageOutcome {
        target_id: combatant.id,
        temp_absorbed,
        hp_lost,
        hp_healed,
        dropped_to_zero: !was_out && combatant.is_out,
        revived: was_out && !combatant.is_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::entity::NewCombatant;

    fn fighter(hp: i32, max: i32, temp: i32) -> Combatant {
        NewCombatant::named("Fighter")
            .with_hp(max)
            .with_current_hp(hp)
            .with_temp_hp(temp)
            .build("Fighter".to_string(), &TrackerConfig::default())
    }

    #[test]
    fn test_temp_absorbs_first() {
        let mut c = fighter(10, 10, 5);
        let outcome = apply(&mut c, 8, 0);
        assert_eq!(c.temporary_hit_points, 0);
        assert_eq!(c.hit_points, 7);
        assert_eq!(outcome.temp_absorbed, 5);
        assert_eq!(outcome.hp_lost, 3);
    }

    #[test]
    fn test_damage_smaller_than_temp() {
        let mut c = fighter(10, 10, 5);
        apply(&mut c, 3, 0);
        assert_eq!(c.temporary_hit_points, 2);
        assert_eq!(c.hit_points, 10);
    }

    #[test]
    fn test_overkill_floors_at_zero() {
        let mut c = fighter(10, 10, 0);
        let outcome = apply(&mut c, 15, 0);
        assert_eq!(c.hit_points, 0);
        assert_eq!(c.temporary_hit_points, 0);
        assert!(c.is_out);
        assert!(outcome.dropped_to_zero);
        assert_eq!(outcome.hp_lost, 10);
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut c = fighter(4, 10, 0);
        let outcome = apply(&mut c, 0, 20);
        assert_eq!(c.hit_points, 10);
        assert_eq!(outcome.hp_healed, 6);
    }

    #[test]
    fn test_damage_then_heal_in_one_call() {
        // 6 damage through 2 temp leaves 6, healing 3 gives 9.
        let mut c = fighter(10, 10, 2);
        apply(&mut c, 6, 3);
        assert_eq!(c.temporary_hit_points, 0);
        assert_eq!(c.hit_points, 9);
    }

    #[test]
    fn test_heal_revives() {
        let mut c = fighter(0, 10, 0);
        assert!(c.is_out);
        let outcome = apply(&mut c, 0, 1);
        assert!(!c.is_out);
        assert!(outcome.revived);
    }

    #[test]
    fn test_heal_caps_hp_already_above_max() {
        let mut c = fighter(12, 10, 0);
        apply(&mut c, 0, 5);
        assert_eq!(c.hit_points, 10);

        let mut c = fighter(12, 10, 0);
        apply(&mut c, 1, 0);
        assert_eq!(c.hit_points, 11);
    }

    #[test]
    fn test_damage_formula_grid() {
        for t in 0..6 {
            for h in 0..6 {
                for d in 0..12 {
                    let mut c = fighter(h, 10, t);
                    apply(&mut c, d, 0);
                    assert_eq!(c.temporary_hit_points, (t - d).max(0));
                    assert_eq!(c.hit_points, (h - (d - t).max(0)).max(0));
                    assert_eq!(c.is_out, c.hit_points <= 0);
                }
            }
        }
    }
}
