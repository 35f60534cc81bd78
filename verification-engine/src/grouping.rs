//! State grouping
//!
//! Inputs and outputs are partitioned by a projection: states whose
//! projections are equal describe the same logical position. Groups come out
//! in key order, so every verifier sees them in the same sequence.

use std::collections::BTreeMap;

/// States sharing one grouping key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGroup<'a, S, K> {
    /// Consumed states
    pub inputs: Vec<&'a S>,
    /// Created states
    pub outputs: Vec<&'a S>,
    /// Shared projection
    pub key: K,
}

impl<'a, S, K> StateGroup<'a, S, K> {
    /// The only input, if there is exactly one
    pub fn single_input(&self) -> Option<&'a S> {
        match self.inputs.as_slice() {
            [input] => Some(*input),
            _ => None,
        }
    }

    /// The only output, if there is exactly one
    pub fn single_output(&self) -> Option<&'a S> {
        match self.outputs.as_slice() {
            [output] => Some(*output),
            _ => None,
        }
    }
}

/// Partition `inputs` and `outputs` by `key`
pub fn group_states<'a, S, K, F>(
    inputs: &[&'a S],
    outputs: &[&'a S],
    key: F,
) -> Vec<StateGroup<'a, S, K>>
where
    K: Ord,
    F: Fn(&S) -> K,
{
    let mut groups: BTreeMap<K, (Vec<&'a S>, Vec<&'a S>)> = BTreeMap::new();
    for input in inputs {
        groups.entry(key(*input)).or_default().0.push(*input);
    }
    for output in outputs {
        groups.entry(key(*output)).or_default().1.push(*output);
    }

    groups
        .into_iter()
        .map(|(key, (inputs, outputs))| StateGroup {
            inputs,
            outputs,
            key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position {
        instrument: &'static str,
        owner: u8,
    }

    #[test]
    fn test_grouping_ignores_projected_out_fields() {
        let a = Position { instrument: "bond", owner: 1 };
        let b = Position { instrument: "bond", owner: 2 };
        let c = Position { instrument: "note", owner: 1 };

        let groups = group_states(&[&a, &c], &[&b], |p| p.instrument);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "bond");
        assert_eq!(groups[0].single_input(), Some(&a));
        assert_eq!(groups[0].single_output(), Some(&b));
        assert_eq!(groups[1].key, "note");
        assert!(groups[1].outputs.is_empty());
        assert_eq!(groups[1].single_output(), None);
    }

    #[test]
    fn test_no_states_no_groups() {
        let groups = group_states::<Position, _, _>(&[], &[], |p| p.owner);
        assert!(groups.is_empty());
    }
}
