use crate::{config::EditorConfig, rhythm::MAX_BEATS_PER_GROUP};

/// Applies edits to a division list while keeping it valid.
///
/// A valid list is never empty, starts with at least one beat, holds no
/// group larger than [`MAX_BEATS_PER_GROUP`] and ends in the `0` sentinel
/// unless it already has `max_groups` entries. An interior `0` ends the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubdivisionEditor {
    max_groups: Option<usize>,
}

impl Default for SubdivisionEditor {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl SubdivisionEditor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            max_groups: config.max_groups.map(|max| max.max(1)),
        }
    }

    pub fn unbounded() -> Self {
        Self { max_groups: None }
    }

    pub fn max_groups(&self) -> Option<usize> {
        self.max_groups
    }

    /// Writes `value` into group `index` and returns the resulting list.
    ///
    /// Out of range indices leave the list unchanged. Values are clamped to
    /// `1..=16` for the first group and `0..=16` for the rest.
    pub fn set_group(&self, divisions: &[u32], index: usize, value: i64) -> Vec<u32> {
        if index >= divisions.len() {
            return divisions.to_vec();
        }

        let floor = if index == 0 { 1 } else { 0 };
        let value = value.clamp(floor, i64::from(MAX_BEATS_PER_GROUP)) as u32;

        let mut next = divisions.to_vec();
        next[index] = value;

        if value == 0 {
            next.truncate(index + 1);
        }

        if index == next.len() - 1 && value != 0 && self.has_room(next.len()) {
            next.push(0);
        }

        next
    }

    /// Moves group `index` by `delta` beats.
    pub fn adjust_group(&self, divisions: &[u32], index: usize, delta: i64) -> Vec<u32> {
        match divisions.get(index) {
            Some(&current) => self.set_group(divisions, index, i64::from(current) + delta),
            None => divisions.to_vec(),
        }
    }

    /// Coerces an arbitrary list into a valid one. Valid lists come back
    /// unchanged.
    pub fn sanitize(&self, divisions: &[u32]) -> Vec<u32> {
        let Some((&first, rest)) = divisions.split_first() else {
            return crate::rhythm::DEFAULT_DIVISIONS.to_vec();
        };

        let mut next = vec![first.clamp(1, MAX_BEATS_PER_GROUP)];
        for &beats in rest {
            next.push(beats.min(MAX_BEATS_PER_GROUP));
            if beats == 0 {
                break;
            }
        }

        if let Some(max) = self.max_groups {
            next.truncate(max);
        }

        if next.last() != Some(&0) && self.has_room(next.len()) {
            next.push(0);
        }

        next
    }

    /// Whether `divisions` already satisfies every list invariant.
    pub fn is_valid(&self, divisions: &[u32]) -> bool {
        self.sanitize(divisions) == divisions
    }

    fn has_room(&self, len: usize) -> bool {
        self.max_groups.map_or(true, |max| len < max)
    }
}

/// Reduces a continuous drag to discrete `+1` / `-1` steps.
///
/// Offsets accumulate from the start of the drag. Each time the total moves
/// more than `threshold` away from the position of the previous step, one step
/// is emitted and that position becomes the new baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragStepper {
    threshold: f32,
    current: f32,
    last: f32,
}

impl DragStepper {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.abs(),
            current: 0.0,
            last: 0.0,
        }
    }

    pub fn for_tempo(config: &EditorConfig) -> Self {
        Self::new(config.tempo_drag_threshold)
    }

    pub fn for_groups(config: &EditorConfig) -> Self {
        Self::new(config.group_drag_threshold)
    }

    pub fn start(&mut self) {
        self.current = 0.0;
        self.last = 0.0;
    }

    /// Feeds the offset moved since the previous call.
    pub fn drag(&mut self, delta: f32) -> Option<i64> {
        self.current += delta;

        if (self.current - self.last).abs() > self.threshold {
            let step = if self.current < self.last { -1 } else { 1 };
            self.last = self.current;
            Some(step)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> SubdivisionEditor {
        SubdivisionEditor::default()
    }

    fn assert_invariants(editor: &SubdivisionEditor, divisions: &[u32]) {
        assert!(!divisions.is_empty(), "{divisions:?} is empty");
        assert!(divisions[0] >= 1, "{divisions:?} starts with 0");
        assert!(divisions.iter().all(|&beats| beats <= MAX_BEATS_PER_GROUP));
        let full = editor.max_groups().is_some_and(|max| divisions.len() == max);
        assert!(
            divisions.last() == Some(&0) || full,
            "{divisions:?} is missing its sentinel"
        );
        let interior = &divisions[1..divisions.len() - 1];
        assert!(!interior.contains(&0), "{divisions:?} kept groups after a 0");
        if let Some(max) = editor.max_groups() {
            assert!(divisions.len() <= max);
        }
    }

    #[test]
    fn first_group_grows_and_keeps_sentinel() {
        assert_eq!(editor().set_group(&[1, 0], 0, 4), vec![4, 0]);
    }

    #[test]
    fn builds_and_truncates_a_meter() {
        let editor = editor();
        let mut divisions = vec![1, 0];
        for _ in 0..3 {
            divisions = editor.adjust_group(&divisions, 0, 1);
        }
        assert_eq!(divisions, vec![4, 0]);

        divisions = editor.adjust_group(&divisions, 1, 1);
        divisions = editor.adjust_group(&divisions, 1, 1);
        assert_eq!(divisions, vec![4, 2, 0]);

        for _ in 0..3 {
            divisions = editor.adjust_group(&divisions, 2, 1);
        }
        assert_eq!(divisions, vec![4, 2, 3, 0]);

        divisions = editor.set_group(&divisions, 1, 0);
        assert_eq!(divisions, vec![4, 0]);
    }

    #[test]
    fn clamps_values() {
        let editor = editor();
        assert_eq!(editor.set_group(&[3, 0], 0, -5), vec![1, 0]);
        assert_eq!(editor.set_group(&[3, 0], 0, 99), vec![16, 0]);
        assert_eq!(editor.set_group(&[3, 2, 0], 1, -1), vec![3, 0]);
    }

    #[test]
    fn out_of_range_index_is_a_no_op() {
        assert_eq!(editor().set_group(&[4, 2, 0], 3, 5), vec![4, 2, 0]);
        assert_eq!(editor().adjust_group(&[4, 2, 0], 7, 1), vec![4, 2, 0]);
    }

    #[test]
    fn does_not_mutate_the_input() {
        let divisions: Vec<u32> = vec![4, 2, 0];
        let _ = editor().set_group(&divisions, 1, 0);
        assert_eq!(divisions, vec![4, 2, 0]);
    }

    #[test]
    fn stops_adding_sentinels_at_the_cap() {
        let editor = editor();
        assert_eq!(editor.set_group(&[4, 2, 3, 0], 3, 1), vec![4, 2, 3, 1]);
        assert_eq!(editor.set_group(&[4, 2, 3, 1], 3, 0), vec![4, 2, 3, 0]);

        let unbounded = SubdivisionEditor::unbounded();
        assert_eq!(unbounded.set_group(&[4, 2, 3, 0], 3, 1), vec![4, 2, 3, 1, 0]);
    }

    #[test]
    fn every_edit_preserves_invariants() {
        let editors = [editor(), SubdivisionEditor::unbounded()];
        let starts: [&[u32]; 5] = [&[1, 0], &[4, 0], &[4, 2, 0], &[4, 2, 3, 0], &[16, 16, 16, 16]];
        let values = [-20, -1, 0, 1, 2, 7, 16, 17, 100];

        for editor in &editors {
            for start in starts {
                let start = editor.sanitize(start);
                for index in 0..start.len() + 1 {
                    for value in values {
                        let next = editor.set_group(&start, index, value);
                        assert_invariants(editor, &next);
                        let next = editor.adjust_group(&start, index, value);
                        assert_invariants(editor, &next);
                    }
                }
            }
        }
    }

    #[test]
    fn sanitize_repairs_stored_lists() {
        let editor = editor();
        assert_eq!(editor.sanitize(&[]), vec![1, 0]);
        assert_eq!(editor.sanitize(&[0]), vec![1, 0]);
        assert_eq!(editor.sanitize(&[4, 2, 3]), vec![4, 2, 3, 0]);
        assert_eq!(editor.sanitize(&[4, 0, 3, 0]), vec![4, 0]);
        assert_eq!(editor.sanitize(&[40, 2, 0]), vec![16, 2, 0]);
        assert_eq!(editor.sanitize(&[1, 2, 3, 4, 5, 0]), vec![1, 2, 3, 4]);
    }

    #[test]
    fn sanitize_keeps_valid_lists() {
        let editor = editor();
        let cases: [&[u32]; 4] = [&[1, 0], &[4, 2, 3, 0], &[4, 2, 3, 1], &[16, 0]];
        for valid in cases {
            assert!(editor.is_valid(valid), "{valid:?}");
        }
        assert!(!editor.is_valid(&[4, 2]));
    }

    #[test]
    fn drag_emits_one_step_per_threshold() {
        let mut drag = DragStepper::new(10.0);
        drag.start();

        let steps: Vec<i64> = [4.0, 4.0, 4.0, 4.0, 4.0, 4.0]
            .into_iter()
            .filter_map(|dx| drag.drag(dx))
            .collect();
        // Steps at 12 and 24; the baseline follows the offset, not zero.
        assert_eq!(steps, vec![1, 1]);

        assert_eq!(drag.drag(-5.0), None);
        assert_eq!(drag.drag(-6.0), Some(-1));
    }

    #[test]
    fn drag_restart_resets_baseline() {
        let mut drag = DragStepper::for_groups(&EditorConfig::default());
        drag.start();
        assert_eq!(drag.drag(30.0), None);
        drag.start();
        assert_eq!(drag.drag(30.0), None);
        assert_eq!(drag.drag(6.0), Some(1));
    }
}
