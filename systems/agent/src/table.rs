use beatshot_core::{GameModeIdentity, QTableRecord};

/// Square action-value table with per-entry update counts.
///
/// Rows are states and columns are actions, both expressed as coarse indices.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct QTable {
    size: usize,
    values: Vec<f32>,
    training_samples: Vec<u32>,
    total_training_samples: u64,
}

impl QTable {
    pub(crate) fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
            training_samples: vec![0; size * size],
            total_training_samples: 0,
        }
    }

    /// Restores a persisted table, or `None` when its shape differs.
    pub(crate) fn from_record(record: &QTableRecord, size: usize) -> Option<Self> {
        if !record.matches_shape(size, size) {
            return None;
        }
        let values = record
            .values
            .iter()
            .map(|value| if value.is_nan() { 0.0 } else { *value })
            .collect();
        let training_samples = if record.training_samples.len() == size * size {
            record.training_samples.clone()
        } else {
            vec![0; size * size]
        };
        Some(Self {
            size,
            values,
            training_samples,
            total_training_samples: record.total_training_samples,
        })
    }

    pub(crate) fn to_record(&self, identity: &GameModeIdentity) -> QTableRecord {
        QTableRecord {
            identity: identity.clone(),
            rows: self.size,
            columns: self.size,
            values: self.values.clone(),
            training_samples: self.training_samples.clone(),
            total_training_samples: self.total_training_samples,
        }
    }

    pub(crate) const fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn value(&self, state: usize, action: usize) -> Option<f32> {
        if state >= self.size || action >= self.size {
            return None;
        }
        self.values.get(state * self.size + action).copied()
    }

    pub(crate) fn samples(&self, state: usize, action: usize) -> Option<u32> {
        if state >= self.size || action >= self.size {
            return None;
        }
        self.training_samples.get(state * self.size + action).copied()
    }

    pub(crate) const fn total_training_samples(&self) -> u64 {
        self.total_training_samples
    }

    /// Applies one temporal-difference step and returns the new value.
    ///
    /// All indices must be smaller than `size`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update(
        &mut self,
        state: usize,
        action: usize,
        next_state: usize,
        next_action: usize,
        reward: f32,
        alpha: f32,
        gamma: f32,
    ) -> f32 {
        let entry = state * self.size + action;
        let predict = self.values[entry];
        let target = reward + gamma * self.values[next_state * self.size + next_action];
        let updated = predict + alpha * (target - predict);

        self.values[entry] = updated;
        self.training_samples[entry] = self.training_samples[entry].saturating_add(1);
        self.total_training_samples = self.total_training_samples.saturating_add(1);
        updated
    }

    /// Actions of `state` that share the row maximum, in ascending order.
    pub(crate) fn greedy_actions(&self, state: usize) -> Vec<usize> {
        let row = &self.values[state * self.size..(state + 1) * self.size];
        let best = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.iter()
            .enumerate()
            .filter(|(_, value)| **value == best)
            .map(|(action, _)| action)
            .collect()
    }

    /// Maximum value of every action column.
    pub(crate) fn column_maxes(&self) -> Vec<f32> {
        (0..self.size)
            .map(|action| {
                (0..self.size)
                    .map(|state| self.values[state * self.size + action])
                    .fold(f32::NEG_INFINITY, f32::max)
            })
            .collect()
    }

    /// Mean value of every action column.
    pub(crate) fn column_means(&self) -> Vec<f32> {
        (0..self.size)
            .map(|action| {
                let sum: f32 = (0..self.size)
                    .map(|state| self.values[state * self.size + action])
                    .sum();
                sum / self.size as f32
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::QTable;
    use beatshot_core::GameModeIdentity;

    #[test]
    fn update_moves_value_towards_target() {
        let mut table = QTable::zeros(4);
        let updated = table.update(0, 0, 0, 0, 10.0, 0.5, 0.9);
        assert_eq!(updated, 5.0);
        assert_eq!(table.value(0, 0), Some(5.0));
        assert_eq!(table.samples(0, 0), Some(1));
        assert_eq!(table.total_training_samples(), 1);
        assert_eq!(table.value(4, 0), None);
    }

    #[test]
    fn column_statistics_reduce_over_states() {
        let mut table = QTable::zeros(2);
        table.values = vec![1.0, -2.0, 3.0, 4.0];
        assert_eq!(table.column_maxes(), vec![3.0, 4.0]);
        assert_eq!(table.column_means(), vec![2.0, 1.0]);
        assert_eq!(table.greedy_actions(0), vec![0]);

        table.values = vec![2.0, 2.0, 0.0, 0.0];
        assert_eq!(table.greedy_actions(0), vec![0, 1]);
        assert_eq!(table.greedy_actions(1), vec![0, 1]);
    }

    #[test]
    fn records_restore_only_matching_shapes() {
        let identity = GameModeIdentity::new("BeatTrack", "");
        let mut table = QTable::zeros(2);
        let _ = table.update(1, 0, 1, 1, 1.0, 1.0, 0.5);

        let mut record = table.to_record(&identity);
        assert_eq!(QTable::from_record(&record, 2), Some(table.clone()));
        assert_eq!(QTable::from_record(&record, 3), None);

        record.values[3] = f32::NAN;
        record.training_samples.clear();
        let restored = QTable::from_record(&record, 2).expect("shape matches");
        assert_eq!(restored.value(1, 1), Some(0.0));
        assert_eq!(restored.samples(1, 0), Some(0));
        assert_eq!(restored.total_training_samples(), 1);
    }
}
