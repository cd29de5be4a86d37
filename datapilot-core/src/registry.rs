use tracing::{debug, info};

use crate::domain::Dataset;
use crate::error::PilotError;

/// Known datasets plus the one questions are asked against.
///
/// The active dataset is tracked by id and resolved on every read, so a
/// removal can never leave it pointing at a missing entry.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: Vec<Dataset>,
    active: Option<String>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn out_of_range(&self, index: usize) -> PilotError {
        PilotError::OutOfRange {
            index,
            len: self.datasets.len(),
        }
    }

    fn upsert(&mut self, dataset: Dataset) -> usize {
        match self.datasets.iter().position(|d| d.id == dataset.id) {
            Some(index) => {
                debug!("Replacing existing dataset entry {}", dataset.id);
                self.datasets[index] = dataset;
                index
            }
            None => {
                self.datasets.push(dataset);
                self.datasets.len() - 1
            }
        }
    }

    /// Adds the dataset (replacing one with the same id) and makes it active.
    pub fn register(&mut self, dataset: Dataset) -> &Dataset {
        info!(
            "Registering dataset {} ({})",
            dataset.id, dataset.display_name
        );
        let index = self.upsert(dataset);
        let dataset = &self.datasets[index];
        self.active = Some(dataset.id.clone());
        dataset
    }

    /// Adds the dataset without changing which one is active.
    pub fn insert(&mut self, dataset: Dataset) {
        info!("Adding dataset {} without selecting it", dataset.id);
        self.upsert(dataset);
    }

    /// Replaces the whole list and selects its last entry.
    pub fn hydrate(&mut self, datasets: Vec<Dataset>) {
        self.datasets.clear();
        for dataset in datasets {
            if self.datasets.iter().any(|d| d.id == dataset.id) {
                debug!("Skipping duplicate dataset {} in listing", dataset.id);
                continue;
            }
            self.datasets.push(dataset);
        }
        self.active = self.datasets.last().map(|d| d.id.clone());
        info!("Loaded {} datasets", self.datasets.len());
    }

    pub fn select(&mut self, index: usize) -> Result<&Dataset, PilotError> {
        let dataset = self
            .datasets
            .get(index)
            .ok_or_else(|| self.out_of_range(index))?;
        self.active = Some(dataset.id.clone());
        Ok(dataset)
    }

    /// Removes the entry locally. If it was active, the first remaining
    /// entry becomes active (or none when the list is empty).
    pub fn remove(&mut self, index: usize) -> Result<Dataset, PilotError> {
        if index >= self.datasets.len() {
            return Err(self.out_of_range(index));
        }
        let removed = self.datasets.remove(index);
        if self.active.as_deref() == Some(removed.id.as_str()) {
            self.active = self.datasets.first().map(|d| d.id.clone());
        }
        info!(
            "Removed dataset {} ({} remaining)",
            removed.id,
            self.datasets.len()
        );
        Ok(removed)
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&Dataset> {
        let id = self.active.as_deref()?;
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn active_index(&self) -> Option<usize> {
        let id = self.active.as_deref()?;
        self.datasets.iter().position(|d| d.id == id)
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn get(&self, index: usize) -> Option<&Dataset> {
        self.datasets.get(index)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(id: &str) -> Dataset {
        Dataset {
            id: id.to_string(),
            display_name: format!("{}.csv", id),
            storage_name: format!("dataset_{}", id),
            schema: vec![],
            row_count: 0,
        }
    }

    #[test]
    fn register_appends_and_activates() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));
        registry.register(dataset("b"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active().map(|d| d.id.as_str()), Some("b"));
    }

    #[test]
    fn register_keeps_ids_unique() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));
        registry.register(dataset("b"));

        let mut renamed = dataset("a");
        renamed.display_name = "renamed.csv".into();
        registry.register(renamed);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_index(), Some(0));
        assert_eq!(registry.datasets()[0].display_name, "renamed.csv");
    }

    #[test]
    fn insert_leaves_active_alone() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));
        registry.insert(dataset("b"));

        assert_eq!(registry.active().map(|d| d.id.as_str()), Some("a"));
    }

    #[test]
    fn select_out_of_range_fails() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));

        assert_eq!(
            registry.select(4).unwrap_err(),
            PilotError::OutOfRange { index: 4, len: 1 }
        );
    }

    #[test]
    fn removing_active_falls_back_to_first() {
        let mut registry = DatasetRegistry::new();
        registry.hydrate(vec![dataset("a"), dataset("b"), dataset("c")]);
        assert_eq!(registry.active_index(), Some(2));

        registry.remove(2).unwrap();

        assert_eq!(registry.active().map(|d| d.id.as_str()), Some("a"));
    }

    #[test]
    fn removing_last_dataset_clears_active() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));

        registry.remove(0).unwrap();

        assert!(registry.active().is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_other_dataset_keeps_active() {
        let mut registry = DatasetRegistry::new();
        registry.hydrate(vec![dataset("a"), dataset("b"), dataset("c")]);
        registry.select(1).unwrap();

        registry.remove(0).unwrap();

        assert_eq!(registry.active().map(|d| d.id.as_str()), Some("b"));
        assert_eq!(registry.active_index(), Some(0));
    }

    #[test]
    fn remove_out_of_range_fails() {
        let mut registry = DatasetRegistry::new();
        assert!(matches!(
            registry.remove(0),
            Err(PilotError::OutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn hydrate_drops_duplicate_ids() {
        let mut registry = DatasetRegistry::new();
        registry.hydrate(vec![dataset("a"), dataset("a"), dataset("b")]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active().map(|d| d.id.as_str()), Some("b"));
    }

    #[test]
    fn clear_active_keeps_list() {
        let mut registry = DatasetRegistry::new();
        registry.register(dataset("a"));

        registry.clear_active();

        assert!(registry.active().is_none());
        assert_eq!(registry.len(), 1);
    }
}
