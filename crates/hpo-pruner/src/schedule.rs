//! Hyperband bracket/rung arithmetic, as free functions so the schedule
//! math is testable independent of the `Pruner` trait plumbing.

/// One Hyperband bracket: `s` identifies it, `n_s` is how many trials start
/// in it, `r_s` is its starting resource level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BracketSpec {
    pub s: u32,
    pub n_s: usize,
    pub r_s: f64,
}

/// The full bracket/slot schedule for one "generation" of trials: brackets
/// ordered `s_max, s_max-1, ..., 0` per the design, with a flattened
/// slot-to-bracket lookup so `assign_bracket(trial_index)` is `O(1)`.
#[derive(Debug, Clone)]
pub struct HyperbandSchedule {
    pub brackets: Vec<BracketSpec>,
    slot_bracket: Vec<usize>,
}

impl HyperbandSchedule {
    /// Build the schedule for a reduction factor `eta`, minimum resource
    /// `r_min`, and maximum resource `R`. `eta <= 1.0` degenerates to a
    /// single bracket that never prunes (boundary behavior: `reduction_factor=1`
    /// makes Hyperband plain parallel random search).
    pub fn build(reduction_factor: f64, min_resource: f64, max_resource: f64) -> Self {
        if reduction_factor <= 1.0 || min_resource <= 0.0 || max_resource < min_resource {
            let brackets = vec![BracketSpec {
                s: 0,
                n_s: usize::MAX,
                r_s: max_resource.max(min_resource),
            }];
            return Self {
                brackets,
                slot_bracket: vec![0],
            };
        }

        let eta = reduction_factor;
        let s_max = (max_resource / min_resource).log(eta).floor().max(0.0) as i64;

        let mut brackets = Vec::new();
        for s in (0..=s_max).rev() {
            let n_s = (((s_max + 1) as f64) * eta.powi(s as i32) / (s as f64 + 1.0)).ceil().max(1.0) as usize;
            let r_s = max_resource * eta.powi(-(s as i32));
            brackets.push(BracketSpec { s: s as u32, n_s, r_s });
        }

        let mut slot_bracket = Vec::new();
        for (idx, bracket) in brackets.iter().enumerate() {
            slot_bracket.extend(std::iter::repeat(idx).take(bracket.n_s));
        }

        Self { brackets, slot_bracket }
    }

    /// Deterministic round-robin assignment of a trial index into one of the
    /// brackets, cycling through one generation's worth of slots.
    pub fn assign(&self, trial_index: usize) -> u32 {
        if self.slot_bracket.is_empty() {
            return 0;
        }
        let slot = trial_index % self.slot_bracket.len();
        self.brackets[self.slot_bracket[slot]].s
    }

    pub fn bracket(&self, bracket_id: u32) -> Option<&BracketSpec> {
        self.brackets.iter().find(|b| b.s == bracket_id)
    }

    /// The highest rung index a trial in this bracket will report: bracket
    /// `s` runs rungs `0..=s`.
    pub fn max_rung(&self, bracket_id: u32) -> u32 {
        bracket_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_has_decreasing_resources_by_bracket() {
        // eta=3, r_min=1, R=81 -> s_max = 4.
        let schedule = HyperbandSchedule::build(3.0, 1.0, 81.0);
        assert_eq!(schedule.brackets.first().unwrap().s, 4);
        assert_eq!(schedule.brackets.last().unwrap().s, 0);
        for window in schedule.brackets.windows(2) {
            assert!(window[0].r_s <= window[1].r_s);
        }
    }

    #[test]
    fn reduction_factor_one_degenerates_to_single_bracket() {
        let schedule = HyperbandSchedule::build(1.0, 1.0, 81.0);
        assert_eq!(schedule.brackets.len(), 1);
        assert_eq!(schedule.assign(0), 0);
        assert_eq!(schedule.assign(999), 0);
    }

    #[test]
    fn assignment_cycles_through_one_generation() {
        let schedule = HyperbandSchedule::build(3.0, 1.0, 81.0);
        let total: usize = schedule.brackets.iter().map(|b| b.n_s).sum();
        let first_gen: Vec<u32> = (0..total).map(|i| schedule.assign(i)).collect();
        let second_gen: Vec<u32> = (total..2 * total).map(|i| schedule.assign(i)).collect();
        assert_eq!(first_gen, second_gen);
    }
}
