//! Labeled sample collections with deterministic shuffle and split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Ordered `(sample, label)` pairs plus the number of output classes
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSet<T> {
    samples: Vec<(T, usize)>,
    num_classes: usize,
}

impl<T> LabeledSet<T> {
    /// Concatenate per-class groups; a group's index becomes its label.
    ///
    /// Empty groups contribute nothing but still occupy their label id.
    pub fn from_groups(groups: Vec<Vec<T>>) -> Self {
        let num_classes = groups.len();
        let samples = groups
            .into_iter()
            .enumerate()
            .flat_map(|(label, group)| group.into_iter().map(move |sample| (sample, label)))
            .collect();
        Self {
            samples,
            num_classes,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn samples(&self) -> &[(T, usize)] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &(T, usize)> {
        self.samples.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = usize> + '_ {
        self.samples.iter().map(|(_, label)| *label)
    }

    /// Number of samples per label
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes];
        for label in self.labels() {
            counts[label] += 1;
        }
        counts
    }

    /// Shuffle with a fixed seed; same seed and input order give the same result
    pub fn shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.samples.shuffle(&mut rng);
        self
    }

    /// Split into `(train, validation)`.
    ///
    /// The first `floor(len * (1 - validation_ratio))` samples train, the rest
    /// validate. Both halves keep their relative order.
    pub fn split(mut self, validation_ratio: f64) -> (Self, Self) {
        let num_classes = self.num_classes;
        let pivot = split_point(self.samples.len(), validation_ratio);
        let validation = self.samples.split_off(pivot);
        (
            self,
            Self {
                samples: validation,
                num_classes,
            },
        )
    }

    /// Keep the first `n` samples
    pub fn take(mut self, n: usize) -> Self {
        self.samples.truncate(n);
        self
    }

    /// Replace every sample by zero or more derived samples with the same label
    pub fn try_flat_map<U, E, F>(self, mut f: F) -> Result<LabeledSet<U>, E>
    where
        F: FnMut(&T) -> Result<Vec<U>, E>,
    {
        let mut samples = Vec::with_capacity(self.samples.len());
        for (sample, label) in &self.samples {
            samples.extend(f(sample)?.into_iter().map(|derived| (derived, *label)));
        }
        Ok(LabeledSet {
            samples,
            num_classes: self.num_classes,
        })
    }
}

/// Number of training samples for a given total and validation ratio
pub fn split_point(total: usize, validation_ratio: f64) -> usize {
    let pivot = (total as f64 * (1.0 - validation_ratio)).floor() as usize;
    pivot.min(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(counts: &[usize]) -> LabeledSet<usize> {
        let mut next = 0;
        LabeledSet::from_groups(
            counts
                .iter()
                .map(|&n| {
                    let group = (next..next + n).collect::<Vec<_>>();
                    next += n;
                    group
                })
                .collect(),
        )
    }

    #[test]
    fn test_split_sizes_add_up() {
        for total in [0usize, 1, 7, 40, 101] {
            let set = numbered(&[total]);
            let (train, valid) = set.split(0.1);
            assert_eq!(train.len() + valid.len(), total);
        }
    }

    #[test]
    fn test_forty_samples_split_36_4() {
        let set = numbered(&[10, 20, 10]).shuffle(1_231_239);
        assert_eq!(set.len(), 40);
        let (train, valid) = set.split(0.1);
        assert_eq!(train.len(), 36);
        assert_eq!(valid.len(), 4);
    }

    #[test]
    fn test_shuffle_is_reproducible() {
        let a = numbered(&[10, 20, 10]).shuffle(42).split(0.25);
        let b = numbered(&[10, 20, 10]).shuffle(42).split(0.25);
        assert_eq!(a, b);

        let c = numbered(&[10, 20, 10]).shuffle(43);
        assert_ne!(numbered(&[10, 20, 10]).shuffle(42), c);
    }

    #[test]
    fn test_split_halves_keep_class_count() {
        let (train, valid) = numbered(&[3, 0, 5]).split(0.5);
        assert_eq!(train.num_classes(), 3);
        assert_eq!(valid.num_classes(), 3);
        assert_eq!(train.class_counts(), vec![3, 0, 1]);
        assert_eq!(valid.class_counts(), vec![0, 0, 4]);
    }

    #[test]
    fn test_split_is_disjoint() {
        let (train, valid) = numbered(&[30, 30]).shuffle(7).split(0.2);
        let train_ids: Vec<_> = train.iter().map(|(s, _)| *s).collect();
        assert!(valid.iter().all(|(s, _)| !train_ids.contains(s)));
    }

    #[test]
    fn test_empty_group_keeps_label_slot() {
        let set = numbered(&[0, 5]);
        assert_eq!(set.len(), 5);
        assert_eq!(set.num_classes(), 2);
        assert_eq!(set.class_counts(), vec![0, 5]);
        assert!(set.labels().all(|l| l == 1));
    }

    #[test]
    fn test_try_flat_map_expands_with_labels() {
        let set = numbered(&[1, 2]);
        let expanded: LabeledSet<usize> = set
            .try_flat_map(|&s| Ok::<_, ()>(vec![s; s + 1]))
            .unwrap();
        // sample 0 -> 1 copy, sample 1 -> 2 copies, sample 2 -> 3 copies
        assert_eq!(expanded.len(), 6);
        assert_eq!(expanded.class_counts(), vec![1, 5]);
    }

    #[test]
    fn test_split_point_bounds() {
        assert_eq!(split_point(10, 0.0), 10);
        assert_eq!(split_point(10, 1.0), 0);
        assert_eq!(split_point(40, 0.1), 36);
    }
}
