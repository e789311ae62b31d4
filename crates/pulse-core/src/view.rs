//! Store subscribers that project state into the page.
//!
//! The rendering itself belongs to whatever implements [`ResultsView`] or
//! [`CountView`]. A binding built without a view (the current page has no
//! results list, say) skips updates silently.

use std::collections::BTreeMap;

use pulse_types::ResultTally;

use crate::store::{StateKey, StateValue, Subscriber, SubscriberError};

/// A list of answer rows, one per answer label.
pub trait ResultsView: Send {
    /// Set the count of an existing row, or append a new row.
    fn upsert_answer(&mut self, answer: &str, count: u64);

    /// Remove the row for an answer.
    fn remove_answer(&mut self, answer: &str);

    /// Labels of the rows currently shown.
    fn answers(&self) -> Vec<String>;
}

/// A single participant-count label.
pub trait CountView: Send {
    /// Replace the displayed count.
    fn set_count(&mut self, count: u64);
}

/// Keeps a [`ResultsView`] in sync with the `results` key.
#[derive(Debug)]
pub struct ResultsBinding<V> {
    view: Option<V>,
}

impl<V: ResultsView> ResultsBinding<V> {
    /// Bind to `view`, or to nothing if the page has no results list.
    pub const fn new(view: Option<V>) -> Self {
        Self { view }
    }

    /// Make the view show exactly the answers in `results`.
    pub fn render(&mut self, results: &ResultTally) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        for (answer, count) in results {
            view.upsert_answer(answer, *count);
        }
        for stale in view.answers() {
            if !results.contains_key(&stale) {
                view.remove_answer(&stale);
            }
        }
    }

    /// The bound view.
    pub const fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }
}

impl<V: ResultsView> Subscriber for ResultsBinding<V> {
    fn notify(&mut self, _key: StateKey, value: &StateValue) -> Result<(), SubscriberError> {
        if let StateValue::Results(results) = value {
            self.render(results);
        }
        Ok(())
    }
}

/// Keeps a [`CountView`] in sync with the `userCount` key.
#[derive(Debug)]
pub struct CountBinding<V> {
    view: Option<V>,
}

impl<V: CountView> CountBinding<V> {
    /// Bind to `view`, or to nothing if the page shows no count.
    pub const fn new(view: Option<V>) -> Self {
        Self { view }
    }

    /// The bound view.
    pub const fn view(&self) -> Option<&V> {
        self.view.as_ref()
    }
}

impl<V: CountView> Subscriber for CountBinding<V> {
    fn notify(&mut self, _key: StateKey, value: &StateValue) -> Result<(), SubscriberError> {
        if let (StateValue::UserCount(count), Some(view)) = (value, self.view.as_mut()) {
            view.set_count(*count);
        }
        Ok(())
    }
}

/// Bar width per answer as a percentage of the largest count.
///
/// All widths are zero when every count is zero.
#[allow(clippy::cast_precision_loss)]
pub fn bar_widths(results: &ResultTally) -> BTreeMap<String, f64> {
    let max = results.values().copied().max().unwrap_or(0);
    results
        .iter()
        .map(|(answer, count)| {
            let width = if max == 0 {
                0.0
            } else {
                *count as f64 / max as f64 * 100.0
            };
            (answer.clone(), width)
        })
        .collect()
}

/// Plain in-memory rows, for headless clients and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryResultsView {
    rows: Vec<(String, u64)>,
}

impl MemoryResultsView {
    /// Rows in display order.
    pub fn rows(&self) -> &[(String, u64)] {
        &self.rows
    }
}

impl ResultsView for MemoryResultsView {
    fn upsert_answer(&mut self, answer: &str, count: u64) {
        if let Some(row) = self.rows.iter_mut().find(|(label, _)| label == answer) {
            row.1 = count;
        } else {
            self.rows.push((answer.to_owned(), count));
        }
    }

    fn remove_answer(&mut self, answer: &str) {
        self.rows.retain(|(label, _)| label != answer);
    }

    fn answers(&self) -> Vec<String> {
        self.rows.iter().map(|(label, _)| label.clone()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::store::StateStore;

    fn tally(entries: &[(&str, u64)]) -> ResultTally {
        entries
            .iter()
            .map(|(answer, count)| ((*answer).to_owned(), *count))
            .collect()
    }

    #[test]
    fn render_updates_appends_and_removes() {
        let mut binding = ResultsBinding::new(Some(MemoryResultsView::default()));
        binding.render(&tally(&[("Cats", 3), ("Dogs", 5)]));
        binding.render(&tally(&[("Dogs", 6), ("Fish", 1)]));

        let rows = binding.view().unwrap().rows();
        assert_eq!(
            rows,
            &[(String::from("Dogs"), 6), (String::from("Fish"), 1)]
        );
    }

    #[test]
    fn missing_view_is_skipped() {
        let mut binding: ResultsBinding<MemoryResultsView> = ResultsBinding::new(None);
        binding.render(&tally(&[("Cats", 3)]));
        assert!(binding.view().is_none());
    }

    #[test]
    fn count_binding_ignores_other_keys() {
        #[derive(Debug, Default)]
        struct Label(Vec<u64>);
        impl CountView for Label {
            fn set_count(&mut self, count: u64) {
                self.0.push(count);
            }
        }

        let mut binding = CountBinding::new(Some(Label::default()));
        binding
            .notify(StateKey::Results, &StateValue::Results(tally(&[("A", 1)])))
            .unwrap();
        binding
            .notify(StateKey::UserCount, &StateValue::UserCount(7))
            .unwrap();
        assert_eq!(binding.view().unwrap().0, vec![7]);
    }

    #[test]
    fn bindings_work_as_store_subscribers() {
        let mut store = StateStore::new();
        store.subscribe(ResultsBinding::new(Some(MemoryResultsView::default())));
        store.set_state(StateValue::Results(tally(&[("Yes", 2)])));
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn bar_widths_are_relative_to_max() {
        let widths = bar_widths(&tally(&[("A", 5), ("B", 10), ("C", 0)]));
        assert_eq!(widths.get("A").copied(), Some(50.0));
        assert_eq!(widths.get("B").copied(), Some(100.0));
        assert_eq!(widths.get("C").copied(), Some(0.0));
        assert!(bar_widths(&tally(&[("A", 0)])).values().all(|w| *w == 0.0));
    }
}
