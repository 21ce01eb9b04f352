//! Groups history by active-dimension set so a dynamic (conditional) search
//! space never confuses "dimension absent" with "dimension at zero" when
//! fitting densities.

use hpo_types::Trial;

fn active_keys(trial: &Trial) -> Vec<String> {
    let mut keys: Vec<String> = trial.parameters.keys().cloned().collect();
    keys.sort();
    keys
}

/// Partition `history` into groups of trials that share an identical set of
/// sampled dimension names.
pub fn group_by_active_dimensions(history: &[Trial]) -> Vec<Vec<&Trial>> {
    let mut groups: std::collections::BTreeMap<Vec<String>, Vec<&Trial>> = Default::default();
    for trial in history {
        groups.entry(active_keys(trial)).or_default().push(trial);
    }
    groups.into_values().collect()
}

/// The subset of `history` whose active-dimension set matches `active`
/// exactly (order-independent).
pub fn matching_group<'a>(history: &'a [Trial], active: &[String]) -> Vec<&'a Trial> {
    let mut wanted = active.to_vec();
    wanted.sort();
    history.iter().filter(|t| active_keys(t) == wanted).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::{ParamMap, ParameterValue};
    use uuid::Uuid;

    fn trial_with(params: &[(&str, f64)]) -> Trial {
        let mut map = ParamMap::new();
        for (k, v) in params {
            map.insert(k.to_string(), ParameterValue::Float(*v));
        }
        Trial::new_pending(Uuid::new_v4(), 0, map)
    }

    #[test]
    fn groups_by_exact_dimension_set() {
        let history = vec![
            trial_with(&[("x", 1.0)]),
            trial_with(&[("x", 2.0), ("y", 3.0)]),
            trial_with(&[("x", 4.0)]),
        ];
        let groups = group_by_active_dimensions(&history);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn matching_group_ignores_order() {
        let history = vec![trial_with(&[("y", 1.0), ("x", 2.0)])];
        let matches = matching_group(&history, &["x".to_string(), "y".to_string()]);
        assert_eq!(matches.len(), 1);
    }
}
